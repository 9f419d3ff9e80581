//! # Instruction Leaves and Their Layouts
//!
//! One row per instruction leaf: mnemonic, word shape, format constraints and
//! operand fields. The table is plain `const` data; a compile-time assertion
//! at the bottom of this file validates every layout, so a leaf whose
//! declarations leave a gap or overlap fails the build.
//!
//! ```text
//! R-type: [opcode:6][rs:5][rt:5][rd:5][shamt:5][funct:6]
//! I-type: [opcode:6][rs:5][rt:5][imm:16]
//! J-type: [opcode:6][target:26]
//! F-type: [0x11:6][fmt:5][ft:5][fs:5][fd:5][funct:6]
//! ```

use crate::error::SpecError;
use crate::layout::{Field, FieldInfo, FormatInfo, Layout};
use serde::{Deserialize, Serialize};

// ============================================================================
// Operand Fields
// ============================================================================

const RS: FieldInfo = FieldInfo::unsigned(Field::Rs, 21, 25, 8);
const RT: FieldInfo = FieldInfo::unsigned(Field::Rt, 16, 20, 8);
const RD: FieldInfo = FieldInfo::unsigned(Field::Rd, 11, 15, 8);
const SHAMT: FieldInfo = FieldInfo::unsigned(Field::Shamt, 6, 10, 8);
const IMM: FieldInfo = FieldInfo::signed(Field::Imm, 0, 15, 16);
const UIMM: FieldInfo = FieldInfo::unsigned(Field::Imm, 0, 15, 16);
const TARGET: FieldInfo = FieldInfo::unsigned(Field::Target, 0, 25, 32);
const CODE20: FieldInfo = FieldInfo::unsigned(Field::Code, 6, 25, 32);
const CODE10: FieldInfo = FieldInfo::unsigned(Field::Code, 6, 15, 16);
const FMT: FieldInfo = FieldInfo::unsigned(Field::Fmt, 21, 25, 8);
const FT: FieldInfo = FieldInfo::unsigned(Field::Ft, 16, 20, 8);
const FS: FieldInfo = FieldInfo::unsigned(Field::Fs, 11, 15, 8);
const FD: FieldInfo = FieldInfo::unsigned(Field::Fd, 6, 10, 8);
const CC_COMPARE: FieldInfo = FieldInfo::unsigned(Field::Cc, 8, 10, 8);
const CC_BRANCH: FieldInfo = FieldInfo::unsigned(Field::Cc, 18, 20, 8);
const COND: FieldInfo = FieldInfo::unsigned(Field::Cond, 0, 3, 8);

// ============================================================================
// Shared Constraints
// ============================================================================

/// fmt codes of the COP1 `fmt` field
pub const FMT_S: u32 = 16;
pub const FMT_D: u32 = 17;
pub const FMT_W: u32 = 20;
pub const FMT_L: u32 = 21;

const SPECIAL: FormatInfo = FormatInfo::exact(26, 31, &[0x00]);
const REGIMM: FormatInfo = FormatInfo::exact(26, 31, &[0x01]);
const COP1: FormatInfo = FormatInfo::exact(26, 31, &[0x11]);

const RS_ZERO: FormatInfo = FormatInfo::exact(21, 25, &[0]);
const RT_ZERO: FormatInfo = FormatInfo::exact(16, 20, &[0]);
const SHAMT_ZERO: FormatInfo = FormatInfo::exact(6, 10, &[0]);
/// rt, rd and shamt all zero (`jr`, `mthi`, `mtlo`)
const RT_RD_SHAMT_ZERO: FormatInfo = FormatInfo::exact(6, 20, &[0]);
/// rs and rt both zero (`mfhi`, `mflo`)
const RS_RT_ZERO: FormatInfo = FormatInfo::exact(16, 25, &[0]);
/// rd and shamt both zero (`mult`, `div`, ...)
const RD_SHAMT_ZERO: FormatInfo = FormatInfo::exact(6, 15, &[0]);

const FMT_SD: FormatInfo = FormatInfo::exact(21, 25, &[FMT_S, FMT_D]);

/// Word shape of an instruction leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    R,
    I,
    J,
    F,
}

macro_rules! instruction_kinds {
    ($(
        $kind:ident => $mnemonic:literal, $shape:ident,
            formats [$($format:expr),* $(,)?],
            fields [$($field:expr),* $(,)?];
    )*) => {
        /// Tag of every instruction leaf
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum InstructionKind {
            $($kind,)*
        }

        impl InstructionKind {
            /// Every leaf, in decode priority order
            pub const ALL: &'static [InstructionKind] = &[$(InstructionKind::$kind,)*];

            pub const COUNT: usize = Self::ALL.len();

            /// Declared format constraints and operand fields
            pub const fn layout(self) -> &'static Layout {
                match self {
                    $(InstructionKind::$kind => {
                        const LAYOUT: Layout = Layout {
                            formats: &[$($format),*],
                            fields: &[$($field),*],
                        };
                        &LAYOUT
                    })*
                }
            }

            /// Base mnemonic; floating point leaves spell their format as `fmt`
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(InstructionKind::$kind => $mnemonic,)*
                }
            }

            pub const fn shape(self) -> Shape {
                match self {
                    $(InstructionKind::$kind => Shape::$shape,)*
                }
            }
        }
    };
}

instruction_kinds! {
    // ========== SPECIAL (opcode 0x00) ==========
    Nop => "nop", R, formats [FormatInfo::exact(0, 31, &[0])], fields [];
    Sll => "sll", R,
        formats [SPECIAL, RS_ZERO, FormatInfo::exact(0, 5, &[0x00]), FormatInfo::different(0, 31, &[0])],
        fields [RT, RD, SHAMT];
    Srl => "srl", R, formats [SPECIAL, RS_ZERO, FormatInfo::exact(0, 5, &[0x02])], fields [RT, RD, SHAMT];
    Sra => "sra", R, formats [SPECIAL, RS_ZERO, FormatInfo::exact(0, 5, &[0x03])], fields [RT, RD, SHAMT];
    Sllv => "sllv", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x04])], fields [RS, RT, RD];
    Srlv => "srlv", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x06])], fields [RS, RT, RD];
    Srav => "srav", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x07])], fields [RS, RT, RD];
    Jr => "jr", R, formats [SPECIAL, RT_RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x08])], fields [RS];
    Jalr => "jalr", R,
        formats [SPECIAL, RT_ZERO, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x09])],
        fields [RS, RD];
    Syscall => "syscall", R, formats [SPECIAL, FormatInfo::exact(0, 5, &[0x0C])], fields [CODE20];
    Break => "break", R, formats [SPECIAL, FormatInfo::exact(0, 5, &[0x0D])], fields [CODE20];
    Mfhi => "mfhi", R, formats [SPECIAL, RS_RT_ZERO, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x10])], fields [RD];
    Mthi => "mthi", R, formats [SPECIAL, RT_RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x11])], fields [RS];
    Mflo => "mflo", R, formats [SPECIAL, RS_RT_ZERO, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x12])], fields [RD];
    Mtlo => "mtlo", R, formats [SPECIAL, RT_RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x13])], fields [RS];
    Mult => "mult", R, formats [SPECIAL, RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x18])], fields [RS, RT];
    Multu => "multu", R, formats [SPECIAL, RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x19])], fields [RS, RT];
    Div => "div", R, formats [SPECIAL, RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x1A])], fields [RS, RT];
    Divu => "divu", R, formats [SPECIAL, RD_SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x1B])], fields [RS, RT];
    Add => "add", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x20])], fields [RS, RT, RD];
    Addu => "addu", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x21])], fields [RS, RT, RD];
    Sub => "sub", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x22])], fields [RS, RT, RD];
    Subu => "subu", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x23])], fields [RS, RT, RD];
    And => "and", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x24])], fields [RS, RT, RD];
    Or => "or", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x25])], fields [RS, RT, RD];
    Xor => "xor", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x26])], fields [RS, RT, RD];
    Nor => "nor", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x27])], fields [RS, RT, RD];
    Slt => "slt", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x2A])], fields [RS, RT, RD];
    Sltu => "sltu", R, formats [SPECIAL, SHAMT_ZERO, FormatInfo::exact(0, 5, &[0x2B])], fields [RS, RT, RD];
    Teq => "teq", R, formats [SPECIAL, FormatInfo::exact(0, 5, &[0x34])], fields [RS, RT, CODE10];

    // ========== REGIMM (opcode 0x01) ==========
    Bltz => "bltz", I, formats [REGIMM, FormatInfo::exact(16, 20, &[0x00])], fields [RS, IMM];
    Bgez => "bgez", I, formats [REGIMM, FormatInfo::exact(16, 20, &[0x01])], fields [RS, IMM];
    Teqi => "teqi", I, formats [REGIMM, FormatInfo::exact(16, 20, &[0x0C])], fields [RS, IMM];

    // ========== Jumps ==========
    J => "j", J, formats [FormatInfo::exact(26, 31, &[0x02])], fields [TARGET];
    Jal => "jal", J, formats [FormatInfo::exact(26, 31, &[0x03])], fields [TARGET];

    // ========== Branches ==========
    Beq => "beq", I, formats [FormatInfo::exact(26, 31, &[0x04])], fields [RS, RT, IMM];
    Bne => "bne", I, formats [FormatInfo::exact(26, 31, &[0x05])], fields [RS, RT, IMM];
    Blez => "blez", I, formats [FormatInfo::exact(26, 31, &[0x06]), RT_ZERO], fields [RS, IMM];
    Bgtz => "bgtz", I, formats [FormatInfo::exact(26, 31, &[0x07]), RT_ZERO], fields [RS, IMM];

    // ========== Immediate arithmetic and logic ==========
    Addi => "addi", I, formats [FormatInfo::exact(26, 31, &[0x08])], fields [RS, RT, IMM];
    Addiu => "addiu", I, formats [FormatInfo::exact(26, 31, &[0x09])], fields [RS, RT, IMM];
    Slti => "slti", I, formats [FormatInfo::exact(26, 31, &[0x0A])], fields [RS, RT, IMM];
    Sltiu => "sltiu", I, formats [FormatInfo::exact(26, 31, &[0x0B])], fields [RS, RT, IMM];
    Andi => "andi", I, formats [FormatInfo::exact(26, 31, &[0x0C])], fields [RS, RT, UIMM];
    Ori => "ori", I, formats [FormatInfo::exact(26, 31, &[0x0D])], fields [RS, RT, UIMM];
    Xori => "xori", I, formats [FormatInfo::exact(26, 31, &[0x0E])], fields [RS, RT, UIMM];
    Lui => "lui", I, formats [FormatInfo::exact(26, 31, &[0x0F]), RS_ZERO], fields [RT, UIMM];

    // ========== Loads and stores ==========
    Lb => "lb", I, formats [FormatInfo::exact(26, 31, &[0x20])], fields [RS, RT, IMM];
    Lh => "lh", I, formats [FormatInfo::exact(26, 31, &[0x21])], fields [RS, RT, IMM];
    Lw => "lw", I, formats [FormatInfo::exact(26, 31, &[0x23])], fields [RS, RT, IMM];
    Lbu => "lbu", I, formats [FormatInfo::exact(26, 31, &[0x24])], fields [RS, RT, IMM];
    Lhu => "lhu", I, formats [FormatInfo::exact(26, 31, &[0x25])], fields [RS, RT, IMM];
    Sb => "sb", I, formats [FormatInfo::exact(26, 31, &[0x28])], fields [RS, RT, IMM];
    Sh => "sh", I, formats [FormatInfo::exact(26, 31, &[0x29])], fields [RS, RT, IMM];
    Sw => "sw", I, formats [FormatInfo::exact(26, 31, &[0x2B])], fields [RS, RT, IMM];
    Lwc1 => "lwc1", I, formats [FormatInfo::exact(26, 31, &[0x31])], fields [RS, FT, IMM];
    Swc1 => "swc1", I, formats [FormatInfo::exact(26, 31, &[0x39])], fields [RS, FT, IMM];

    // ========== COP1 (opcode 0x11) ==========
    Mfc1 => "mfc1", F,
        formats [COP1, FormatInfo::exact(21, 25, &[0x00]), FormatInfo::exact(0, 10, &[0])],
        fields [RT, FS];
    Mtc1 => "mtc1", F,
        formats [COP1, FormatInfo::exact(21, 25, &[0x04]), FormatInfo::exact(0, 10, &[0])],
        fields [RT, FS];
    Bc1f => "bc1f", F,
        formats [COP1, FormatInfo::exact(21, 25, &[0x08]), FormatInfo::exact(16, 17, &[0b00])],
        fields [CC_BRANCH, IMM];
    Bc1t => "bc1t", F,
        formats [COP1, FormatInfo::exact(21, 25, &[0x08]), FormatInfo::exact(16, 17, &[0b01])],
        fields [CC_BRANCH, IMM];
    FAdd => "add.fmt", F, formats [COP1, FMT_SD, FormatInfo::exact(0, 5, &[0x00])], fields [FMT, FT, FS, FD];
    FSub => "sub.fmt", F, formats [COP1, FMT_SD, FormatInfo::exact(0, 5, &[0x01])], fields [FMT, FT, FS, FD];
    FMul => "mul.fmt", F, formats [COP1, FMT_SD, FormatInfo::exact(0, 5, &[0x02])], fields [FMT, FT, FS, FD];
    FDiv => "div.fmt", F, formats [COP1, FMT_SD, FormatInfo::exact(0, 5, &[0x03])], fields [FMT, FT, FS, FD];
    FSqrt => "sqrt.fmt", F, formats [COP1, FMT_SD, RT_ZERO, FormatInfo::exact(0, 5, &[0x04])], fields [FMT, FS, FD];
    FAbs => "abs.fmt", F, formats [COP1, FMT_SD, RT_ZERO, FormatInfo::exact(0, 5, &[0x05])], fields [FMT, FS, FD];
    FMov => "mov.fmt", F, formats [COP1, FMT_SD, RT_ZERO, FormatInfo::exact(0, 5, &[0x06])], fields [FMT, FS, FD];
    FNeg => "neg.fmt", F, formats [COP1, FMT_SD, RT_ZERO, FormatInfo::exact(0, 5, &[0x07])], fields [FMT, FS, FD];
    CvtS => "cvt.s.fmt", F,
        formats [COP1, FormatInfo::exact(21, 25, &[FMT_D, FMT_W]), RT_ZERO, FormatInfo::exact(0, 5, &[0x20])],
        fields [FMT, FS, FD];
    CvtD => "cvt.d.fmt", F,
        formats [COP1, FormatInfo::exact(21, 25, &[FMT_S, FMT_W]), RT_ZERO, FormatInfo::exact(0, 5, &[0x21])],
        fields [FMT, FS, FD];
    CvtW => "cvt.w.fmt", F,
        formats [COP1, FormatInfo::exact(21, 25, &[FMT_S, FMT_D]), RT_ZERO, FormatInfo::exact(0, 5, &[0x24])],
        fields [FMT, FS, FD];
    FCompare => "c.cond.fmt", F,
        formats [COP1, FMT_SD, FormatInfo::exact(6, 7, &[0]), FormatInfo::exact(4, 5, &[0b11])],
        fields [FMT, FT, FS, CC_COMPARE, COND];
}

// Every layout must cover the word exactly once.
const _: () = {
    let mut i = 0;
    while i < InstructionKind::ALL.len() {
        if InstructionKind::ALL[i].layout().validate().is_err() {
            panic!("instruction layout leaves a gap or declares overlapping bits");
        }
        i += 1;
    }
};

impl InstructionKind {
    /// Position of this kind in [`InstructionKind::ALL`]
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Runtime form of the compile-time layout check
    pub fn validate_layout(self) -> Result<(), SpecError> {
        self.layout()
            .validate()
            .map_err(|source| SpecError::InvalidLayout { kind: self, source })
    }

    /// The 6-bit primary opcode pinned by this leaf's layout
    pub const fn opcode(self) -> u32 {
        self.layout().fixed_value() >> 26
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_layouts_validate() {
        for kind in InstructionKind::ALL {
            assert_eq!(kind.validate_layout(), Ok(()), "{:?}", kind);
        }
    }

    #[test]
    fn test_index_matches_position() {
        for (i, kind) in InstructionKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_every_leaf_pins_its_opcode() {
        for kind in InstructionKind::ALL {
            assert_eq!(
                kind.layout().fixed_mask() & 0xFC00_0000,
                0xFC00_0000,
                "{:?} leaves opcode bits open",
                kind
            );
        }
    }

    #[test]
    fn test_opcodes() {
        assert_eq!(InstructionKind::Add.opcode(), 0x00);
        assert_eq!(InstructionKind::Addi.opcode(), 0x08);
        assert_eq!(InstructionKind::J.opcode(), 0x02);
        assert_eq!(InstructionKind::FAdd.opcode(), 0x11);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(InstructionKind::Add.shape(), Shape::R);
        assert_eq!(InstructionKind::Beq.shape(), Shape::I);
        assert_eq!(InstructionKind::Jal.shape(), Shape::J);
        assert_eq!(InstructionKind::FCompare.shape(), Shape::F);
    }
}
