//! # Declarative Bit Layouts
//!
//! Every instruction leaf is described by a [`Layout`]: a list of format
//! constraints ([`FormatInfo`]) and operand fields ([`FieldInfo`]). The codec
//! derives encoding, extraction and matching from this data alone.
//!
//! ## Coverage rule
//!
//! Single-valued `Exact` constraints fix bits. Together with the fields they
//! must cover all 32 bits of the word exactly once. Multi-valued `Exact`
//! constraints and `Different` constraints are restrictions: they narrow the
//! values of bits that are already covered (for example `fmt ∈ {S, D}` over the
//! `fmt` field) and do not count toward coverage.

use thiserror::Error;

// ============================================================================
// Bit Range Helpers
// ============================================================================

/// Mask covering bits `start..=end`
///
/// The range must already be valid (`start <= end <= 31`).
#[inline]
pub const fn bit_mask(start: u8, end: u8) -> u32 {
    let width = (end - start + 1) as u32;
    if width >= 32 {
        u32::MAX
    } else {
        ((1u32 << width) - 1) << start
    }
}

/// Largest unsigned value that fits in `width` bits
#[inline]
pub const fn width_max(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

#[inline]
const fn valid_range(start: u8, end: u8) -> bool {
    start <= end && end <= 31
}

// ============================================================================
// Format Constraints
// ============================================================================

/// How a [`FormatInfo`] compares the extracted bits against its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// The bits must equal one of the values
    Exact,
    /// The bits must differ from every value
    Different,
}

/// Constraint over bits `start..=end` of an encoded word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub start: u8,
    pub end: u8,
    pub kind: ConstraintKind,
    pub values: &'static [u32],
}

impl FormatInfo {
    pub const fn exact(start: u8, end: u8, values: &'static [u32]) -> Self {
        Self {
            start,
            end,
            kind: ConstraintKind::Exact,
            values,
        }
    }

    pub const fn different(start: u8, end: u8, values: &'static [u32]) -> Self {
        Self {
            start,
            end,
            kind: ConstraintKind::Different,
            values,
        }
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        (self.end - self.start + 1) as u32
    }

    #[inline]
    pub const fn mask(&self) -> u32 {
        bit_mask(self.start, self.end)
    }

    /// A fixed constraint pins its bits to a single constant
    #[inline]
    pub const fn is_fixed(&self) -> bool {
        matches!(self.kind, ConstraintKind::Exact) && self.values.len() == 1
    }

    /// Bits `start..=end` of `word`, shifted down
    #[inline]
    pub const fn extract(&self, word: u32) -> u32 {
        (word >> self.start) & width_max(self.width())
    }

    pub fn accepts(&self, word: u32) -> bool {
        let bits = self.extract(word);
        let listed = self.values.contains(&bits);
        match self.kind {
            ConstraintKind::Exact => listed,
            ConstraintKind::Different => !listed,
        }
    }
}

// ============================================================================
// Operand Fields
// ============================================================================

/// Operand slots an instruction can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Rs,
    Rt,
    Rd,
    Shamt,
    Imm,
    Target,
    Code,
    Fmt,
    Ft,
    Fs,
    Fd,
    Cc,
    Cond,
}

/// Number of distinct [`Field`] slots
pub const FIELD_COUNT: usize = 13;

impl Field {
    #[inline]
    pub const fn slot(self) -> usize {
        self as usize
    }
}

/// Operand field mapped onto bits `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub start: u8,
    pub end: u8,
    /// Width in bits of the host integer that stores the operand
    pub storage_bits: u8,
    pub name: Field,
    /// Sign-extend on extraction
    pub signed: bool,
}

impl FieldInfo {
    pub const fn unsigned(name: Field, start: u8, end: u8, storage_bits: u8) -> Self {
        Self {
            start,
            end,
            storage_bits,
            name,
            signed: false,
        }
    }

    pub const fn signed(name: Field, start: u8, end: u8, storage_bits: u8) -> Self {
        Self {
            start,
            end,
            storage_bits,
            name,
            signed: true,
        }
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        (self.end - self.start + 1) as u32
    }

    #[inline]
    pub const fn mask(&self) -> u32 {
        bit_mask(self.start, self.end)
    }

    /// Extract the operand, sign-extending signed fields
    #[inline]
    pub const fn extract(&self, word: u32) -> i64 {
        let raw = (word >> self.start) & width_max(self.width());
        if self.signed {
            let shift = 64 - self.width();
            ((raw as i64) << shift) >> shift
        } else {
            raw as i64
        }
    }

    /// Place an operand into its bit range, truncating to the field width
    #[inline]
    pub const fn place(&self, value: i64) -> u32 {
        ((value as u32) & width_max(self.width())) << self.start
    }

    /// Whether `value` is representable in this field
    pub const fn fits(&self, value: i64) -> bool {
        let width = self.width();
        if self.signed {
            let min = -(1i64 << (width - 1));
            let max = (1i64 << (width - 1)) - 1;
            value >= min && value <= max
        } else {
            value >= 0 && value <= width_max(width) as i64
        }
    }
}

// ============================================================================
// Layouts
// ============================================================================

/// Structural defects a layout can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("bit range {start}..={end} is not within a 32-bit word")]
    InvalidRange { start: u8, end: u8 },

    #[error("constraint on bits {start}..={end} lists no values")]
    EmptyValues { start: u8, end: u8 },

    #[error("value {value:#x} does not fit bits {start}..={end}")]
    ValueTooWide { start: u8, end: u8, value: u32 },

    #[error("field {field:?} is {width} bits wide but stored in {storage} bits")]
    StorageTooNarrow { field: Field, width: u32, storage: u8 },

    #[error("bits {mask:#010x} are declared more than once")]
    Overlap { mask: u32 },

    #[error("bits {mask:#010x} are not declared")]
    Gap { mask: u32 },
}

/// Field and format declarations of one instruction leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub formats: &'static [FormatInfo],
    pub fields: &'static [FieldInfo],
}

impl Layout {
    /// Bits pinned by fixed constraints
    pub const fn fixed_mask(&self) -> u32 {
        let mut mask = 0;
        let mut i = 0;
        while i < self.formats.len() {
            let format = &self.formats[i];
            if format.is_fixed() {
                mask |= format.mask();
            }
            i += 1;
        }
        mask
    }

    /// Values of the bits pinned by fixed constraints
    pub const fn fixed_value(&self) -> u32 {
        let mut value = 0;
        let mut i = 0;
        while i < self.formats.len() {
            let format = &self.formats[i];
            if format.is_fixed() {
                value |= format.values[0] << format.start;
            }
            i += 1;
        }
        value
    }

    /// Whether the layout carries restrictions beyond its fixed bits
    pub const fn has_restrictions(&self) -> bool {
        let mut i = 0;
        while i < self.formats.len() {
            if !self.formats[i].is_fixed() {
                return true;
            }
            i += 1;
        }
        false
    }

    pub fn field(&self, name: Field) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check ranges, storage widths, overlaps and full 32-bit coverage.
    pub const fn validate(&self) -> Result<(), LayoutError> {
        let mut covered = 0u32;

        let mut i = 0;
        while i < self.formats.len() {
            let format = &self.formats[i];
            if !valid_range(format.start, format.end) {
                return Err(LayoutError::InvalidRange {
                    start: format.start,
                    end: format.end,
                });
            }
            if format.values.is_empty() {
                return Err(LayoutError::EmptyValues {
                    start: format.start,
                    end: format.end,
                });
            }
            let max = width_max(format.width());
            let mut j = 0;
            while j < format.values.len() {
                if format.values[j] > max {
                    return Err(LayoutError::ValueTooWide {
                        start: format.start,
                        end: format.end,
                        value: format.values[j],
                    });
                }
                j += 1;
            }
            if format.is_fixed() {
                let mask = format.mask();
                if covered & mask != 0 {
                    return Err(LayoutError::Overlap {
                        mask: covered & mask,
                    });
                }
                covered |= mask;
            }
            i += 1;
        }

        let mut i = 0;
        while i < self.fields.len() {
            let field = &self.fields[i];
            if !valid_range(field.start, field.end) {
                return Err(LayoutError::InvalidRange {
                    start: field.start,
                    end: field.end,
                });
            }
            if (field.storage_bits as u32) < field.width() {
                return Err(LayoutError::StorageTooNarrow {
                    field: field.name,
                    width: field.width(),
                    storage: field.storage_bits,
                });
            }
            let mask = field.mask();
            if covered & mask != 0 {
                return Err(LayoutError::Overlap {
                    mask: covered & mask,
                });
            }
            covered |= mask;
            i += 1;
        }

        if covered != u32::MAX {
            return Err(LayoutError::Gap { mask: !covered });
        }
        Ok(())
    }

    /// Whether `word` satisfies every constraint of this layout
    pub fn matches(&self, word: u32) -> bool {
        word & self.fixed_mask() == self.fixed_value()
            && self.formats.iter().all(|format| format.accepts(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPCODE: FormatInfo = FormatInfo::exact(26, 31, &[0x08]);
    const RS: FieldInfo = FieldInfo::unsigned(Field::Rs, 21, 25, 8);
    const RT: FieldInfo = FieldInfo::unsigned(Field::Rt, 16, 20, 8);
    const IMM: FieldInfo = FieldInfo::signed(Field::Imm, 0, 15, 16);

    #[test]
    fn test_bit_mask() {
        assert_eq!(bit_mask(0, 5), 0x3F);
        assert_eq!(bit_mask(26, 31), 0xFC00_0000);
        assert_eq!(bit_mask(0, 31), u32::MAX);
    }

    #[test]
    fn test_complete_layout_validates() {
        let layout = Layout {
            formats: &[OPCODE],
            fields: &[RS, RT, IMM],
        };
        assert_eq!(layout.validate(), Ok(()));
        assert_eq!(layout.fixed_mask(), 0xFC00_0000);
        assert_eq!(layout.fixed_value(), 0x2000_0000);
    }

    #[test]
    fn test_gap_detected() {
        let layout = Layout {
            formats: &[OPCODE],
            fields: &[RS, IMM],
        };
        assert_eq!(layout.validate(), Err(LayoutError::Gap { mask: 0x001F_0000 }));
    }

    #[test]
    fn test_overlap_detected() {
        const WIDE_RT: FieldInfo = FieldInfo::unsigned(Field::Rt, 14, 20, 8);
        let layout = Layout {
            formats: &[OPCODE],
            fields: &[RS, WIDE_RT, IMM],
        };
        assert_eq!(layout.validate(), Err(LayoutError::Overlap { mask: 0x0000_C000 }));
    }

    #[test]
    fn test_storage_width_checked() {
        const NARROW: FieldInfo = FieldInfo::signed(Field::Imm, 0, 15, 8);
        let layout = Layout {
            formats: &[OPCODE],
            fields: &[RS, RT, NARROW],
        };
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::StorageTooNarrow { field: Field::Imm, .. })
        ));
    }

    #[test]
    fn test_restrictions_do_not_count_as_coverage() {
        const FMT: FormatInfo = FormatInfo::exact(21, 25, &[16, 17]);
        let layout = Layout {
            formats: &[OPCODE, FMT],
            fields: &[RT, IMM],
        };
        assert_eq!(layout.validate(), Err(LayoutError::Gap { mask: 0x03E0_0000 }));
    }

    #[test]
    fn test_value_too_wide() {
        const BAD: FormatInfo = FormatInfo::exact(26, 31, &[0x40]);
        let layout = Layout {
            formats: &[BAD],
            fields: &[RS, RT, IMM],
        };
        assert!(matches!(layout.validate(), Err(LayoutError::ValueTooWide { .. })));
    }

    #[test]
    fn test_signed_extract() {
        assert_eq!(IMM.extract(0x0000_FFFF), -1);
        assert_eq!(IMM.extract(0x0000_7FFF), 0x7FFF);
        assert_eq!(RS.extract(0x03E0_0000), 31);
    }

    #[test]
    fn test_fits() {
        assert!(IMM.fits(-32768));
        assert!(!IMM.fits(32768));
        assert!(RS.fits(31));
        assert!(!RS.fits(32));
        assert!(!RS.fits(-1));
    }

    #[test]
    fn test_different_constraint() {
        const NOT_ZERO: FormatInfo = FormatInfo::different(0, 31, &[0]);
        assert!(!NOT_ZERO.accepts(0));
        assert!(NOT_ZERO.accepts(0x40));
    }
}
