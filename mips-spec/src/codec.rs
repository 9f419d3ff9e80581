//! Generic layout-driven codec
//!
//! One encode routine and one extract routine serve every instruction leaf;
//! the per-leaf knowledge lives entirely in its [`Layout`].

use crate::layout::{Field, Layout, FIELD_COUNT};

/// Operand values keyed by [`Field`]
///
/// Slots not declared by a layout are ignored on encode and left at zero on
/// extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldValues([i64; FIELD_COUNT]);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, field: Field) -> i64 {
        self.0[field.slot()]
    }

    #[inline]
    pub fn set(&mut self, field: Field, value: i64) {
        self.0[field.slot()] = value;
    }

    /// Builder form of [`FieldValues::set`]
    #[inline]
    pub fn with(mut self, field: Field, value: i64) -> Self {
        self.set(field, value);
        self
    }
}

/// Encode: fixed constants first, then each field masked and shifted in.
pub fn encode(layout: &Layout, values: &FieldValues) -> u32 {
    layout
        .fields
        .iter()
        .fold(layout.fixed_value(), |word, field| {
            word | field.place(values.get(field.name))
        })
}

/// Extract every declared field of `layout` from `word`.
///
/// The caller is responsible for checking [`Layout::matches`] first.
pub fn extract(layout: &Layout, word: u32) -> FieldValues {
    let mut values = FieldValues::new();
    for field in layout.fields {
        values.set(field.name, field.extract(word));
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FieldInfo, FormatInfo};

    const ADDI: Layout = Layout {
        formats: &[FormatInfo::exact(26, 31, &[0x08])],
        fields: &[
            FieldInfo::unsigned(Field::Rs, 21, 25, 8),
            FieldInfo::unsigned(Field::Rt, 16, 20, 8),
            FieldInfo::signed(Field::Imm, 0, 15, 16),
        ],
    };

    #[test]
    fn test_encode_addi() {
        let values = FieldValues::new()
            .with(Field::Rs, 0)
            .with(Field::Rt, 8)
            .with(Field::Imm, 0xF);
        assert_eq!(encode(&ADDI, &values), 0x2008_000F);
    }

    #[test]
    fn test_negative_immediate_is_masked() {
        let values = FieldValues::new().with(Field::Rt, 1).with(Field::Imm, -1);
        assert_eq!(encode(&ADDI, &values), 0x2001_FFFF);
    }

    #[test]
    fn test_extract_sign_extends() {
        let values = extract(&ADDI, 0x2001_FFFF);
        assert_eq!(values.get(Field::Rt), 1);
        assert_eq!(values.get(Field::Imm), -1);
        assert_eq!(values.get(Field::Rd), 0);
    }

    #[test]
    fn test_undeclared_fields_ignored() {
        let values = FieldValues::new().with(Field::Rd, 31).with(Field::Rt, 2);
        assert_eq!(encode(&ADDI, &values), 0x2002_0000);
    }
}
