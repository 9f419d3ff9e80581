//! MIPS I Instruction Set
//!
//! One enum variant per instruction leaf. Opcode and function codes are not
//! stored in the variants; they are fixed by the leaf's layout (see
//! [`crate::kind`]). Conversion to and from the bit-level representation goes
//! through [`FieldValues`] so that a single generic codec serves every leaf.

use crate::codec::{self, FieldValues};
use crate::error::{Result, SpecError};
use crate::kind::{InstructionKind, Shape, FMT_D, FMT_L, FMT_S, FMT_W};
use crate::layout::Field;
use crate::register::{FpuRegister, Register};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric format of a floating point operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatFormat {
    Single,
    Double,
    Word,
    Long,
}

impl FloatFormat {
    /// COP1 `fmt` field code
    pub const fn code(self) -> u32 {
        match self {
            FloatFormat::Single => FMT_S,
            FloatFormat::Double => FMT_D,
            FloatFormat::Word => FMT_W,
            FloatFormat::Long => FMT_L,
        }
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            FMT_S => Some(FloatFormat::Single),
            FMT_D => Some(FloatFormat::Double),
            FMT_W => Some(FloatFormat::Word),
            FMT_L => Some(FloatFormat::Long),
            _ => None,
        }
    }

    /// Mnemonic suffix (`add.s`, `cvt.d.w`)
    pub const fn suffix(self) -> &'static str {
        match self {
            FloatFormat::Single => "s",
            FloatFormat::Double => "d",
            FloatFormat::Word => "w",
            FloatFormat::Long => "l",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "s" => Some(FloatFormat::Single),
            "d" => Some(FloatFormat::Double),
            "w" => Some(FloatFormat::Word),
            "l" => Some(FloatFormat::Long),
            _ => None,
        }
    }
}

/// Predicate selector of `c.cond.fmt` (4-bit `cond` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition(u8);

impl Condition {
    const NAMES: [&'static str; 16] = [
        "f", "un", "eq", "ueq", "olt", "ult", "ole", "ule", "sf", "ngle", "seq", "ngl", "lt",
        "nge", "le", "ngt",
    ];

    pub const F: Self = Self(0);
    pub const EQ: Self = Self(2);
    pub const OLT: Self = Self(4);
    pub const LT: Self = Self(12);
    pub const LE: Self = Self(14);

    pub const fn new(code: u8) -> Option<Self> {
        if code < 16 {
            Some(Self(code))
        } else {
            None
        }
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.0 as usize]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .map(|code| Self(code as u8))
    }

    /// Signaling predicates (codes 8-15) fault on any NaN operand
    #[inline]
    pub const fn is_signaling(self) -> bool {
        self.0 & 0b1000 != 0
    }
}

/// MIPS I instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// NOP: the all-zero word
    Nop,

    // ========== Shifts ==========
    /// SLL: rd = rt << shamt
    Sll { rd: Register, rt: Register, shamt: u8 },
    /// SRL: rd = rt >> shamt (logical)
    Srl { rd: Register, rt: Register, shamt: u8 },
    /// SRA: rd = rt >> shamt (arithmetic)
    Sra { rd: Register, rt: Register, shamt: u8 },
    /// SLLV: rd = rt << (rs & 31)
    Sllv { rd: Register, rt: Register, rs: Register },
    /// SRLV: rd = rt >> (rs & 31) (logical)
    Srlv { rd: Register, rt: Register, rs: Register },
    /// SRAV: rd = rt >> (rs & 31) (arithmetic)
    Srav { rd: Register, rt: Register, rs: Register },

    // ========== Register jumps ==========
    /// JR: PC = rs
    Jr { rs: Register },
    /// JALR: rd = return address; PC = rs
    Jalr { rd: Register, rs: Register },

    // ========== System ==========
    Syscall { code: u32 },
    Break { code: u32 },
    /// TEQ: trap if rs == rt
    Teq { rs: Register, rt: Register, code: u16 },
    /// TEQI: trap if rs == sign_extend(imm)
    Teqi { rs: Register, imm: i16 },

    // ========== HI/LO ==========
    Mfhi { rd: Register },
    Mthi { rs: Register },
    Mflo { rd: Register },
    Mtlo { rs: Register },
    /// MULT: HI:LO = rs * rt (signed)
    Mult { rs: Register, rt: Register },
    /// MULTU: HI:LO = rs * rt (unsigned)
    Multu { rs: Register, rt: Register },
    /// DIV: LO = rs / rt; HI = rs % rt (signed)
    Div { rs: Register, rt: Register },
    /// DIVU: LO = rs / rt; HI = rs % rt (unsigned)
    Divu { rs: Register, rt: Register },

    // ========== Register arithmetic and logic ==========
    /// ADD: rd = rs + rt, trapping on overflow
    Add { rd: Register, rs: Register, rt: Register },
    Addu { rd: Register, rs: Register, rt: Register },
    /// SUB: rd = rs - rt, trapping on overflow
    Sub { rd: Register, rs: Register, rt: Register },
    Subu { rd: Register, rs: Register, rt: Register },
    And { rd: Register, rs: Register, rt: Register },
    Or { rd: Register, rs: Register, rt: Register },
    Xor { rd: Register, rs: Register, rt: Register },
    Nor { rd: Register, rs: Register, rt: Register },
    Slt { rd: Register, rs: Register, rt: Register },
    Sltu { rd: Register, rs: Register, rt: Register },

    // ========== Branches (offset in words, relative to PC + 4) ==========
    Bltz { rs: Register, offset: i16 },
    Bgez { rs: Register, offset: i16 },
    Blez { rs: Register, offset: i16 },
    Bgtz { rs: Register, offset: i16 },
    Beq { rs: Register, rt: Register, offset: i16 },
    Bne { rs: Register, rt: Register, offset: i16 },

    // ========== Jumps (target in words) ==========
    J { target: u32 },
    Jal { target: u32 },

    // ========== Immediate arithmetic and logic ==========
    /// ADDI: rt = rs + imm, trapping on overflow
    Addi { rt: Register, rs: Register, imm: i16 },
    Addiu { rt: Register, rs: Register, imm: i16 },
    Slti { rt: Register, rs: Register, imm: i16 },
    /// SLTIU: unsigned compare against the sign-extended immediate
    Sltiu { rt: Register, rs: Register, imm: i16 },
    Andi { rt: Register, rs: Register, imm: u16 },
    Ori { rt: Register, rs: Register, imm: u16 },
    Xori { rt: Register, rs: Register, imm: u16 },
    /// LUI: rt = imm << 16
    Lui { rt: Register, imm: u16 },

    // ========== Loads and stores ==========
    Lb { rt: Register, base: Register, offset: i16 },
    Lh { rt: Register, base: Register, offset: i16 },
    Lw { rt: Register, base: Register, offset: i16 },
    Lbu { rt: Register, base: Register, offset: i16 },
    Lhu { rt: Register, base: Register, offset: i16 },
    Sb { rt: Register, base: Register, offset: i16 },
    Sh { rt: Register, base: Register, offset: i16 },
    Sw { rt: Register, base: Register, offset: i16 },
    Lwc1 { ft: FpuRegister, base: Register, offset: i16 },
    Swc1 { ft: FpuRegister, base: Register, offset: i16 },

    // ========== Coprocessor 1 ==========
    /// MFC1: rt = fs (raw bits)
    Mfc1 { rt: Register, fs: FpuRegister },
    /// MTC1: fs = rt (raw bits)
    Mtc1 { rt: Register, fs: FpuRegister },
    /// BC1F: branch if condition flag `cc` is clear
    Bc1f { cc: u8, offset: i16 },
    /// BC1T: branch if condition flag `cc` is set
    Bc1t { cc: u8, offset: i16 },
    FAdd { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister, ft: FpuRegister },
    FSub { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister, ft: FpuRegister },
    FMul { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister, ft: FpuRegister },
    FDiv { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister, ft: FpuRegister },
    FSqrt { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    FAbs { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    FMov { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    FNeg { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    /// CVT.S.fmt: fd = single(fs); `fmt` is the source format
    CvtS { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    /// CVT.D.fmt: fd = double(fs)
    CvtD { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    /// CVT.W.fmt: fd = word(fs), round to nearest
    CvtW { fmt: FloatFormat, fd: FpuRegister, fs: FpuRegister },
    /// C.cond.fmt: flag[cc] = cond(fs, ft)
    FCompare {
        fmt: FloatFormat,
        cond: Condition,
        cc: u8,
        fs: FpuRegister,
        ft: FpuRegister,
    },
}

fn gpr(values: &FieldValues, field: Field) -> Option<Register> {
    usize::try_from(values.get(field))
        .ok()
        .and_then(Register::from_index)
}

fn fpr(values: &FieldValues, field: Field) -> Option<FpuRegister> {
    u8::try_from(values.get(field)).ok().and_then(FpuRegister::new)
}

fn format(values: &FieldValues) -> Option<FloatFormat> {
    u32::try_from(values.get(Field::Fmt))
        .ok()
        .and_then(FloatFormat::from_code)
}

fn small(values: &FieldValues, field: Field) -> Option<u8> {
    u8::try_from(values.get(field)).ok()
}

fn reg(value: Register) -> i64 {
    value.index() as i64
}

fn freg(value: FpuRegister) -> i64 {
    value.index() as i64
}

impl Instruction {
    /// The leaf tag of this instruction
    pub fn kind(&self) -> InstructionKind {
        use InstructionKind as K;
        match self {
            Instruction::Nop => K::Nop,
            Instruction::Sll { .. } => K::Sll,
            Instruction::Srl { .. } => K::Srl,
            Instruction::Sra { .. } => K::Sra,
            Instruction::Sllv { .. } => K::Sllv,
            Instruction::Srlv { .. } => K::Srlv,
            Instruction::Srav { .. } => K::Srav,
            Instruction::Jr { .. } => K::Jr,
            Instruction::Jalr { .. } => K::Jalr,
            Instruction::Syscall { .. } => K::Syscall,
            Instruction::Break { .. } => K::Break,
            Instruction::Teq { .. } => K::Teq,
            Instruction::Teqi { .. } => K::Teqi,
            Instruction::Mfhi { .. } => K::Mfhi,
            Instruction::Mthi { .. } => K::Mthi,
            Instruction::Mflo { .. } => K::Mflo,
            Instruction::Mtlo { .. } => K::Mtlo,
            Instruction::Mult { .. } => K::Mult,
            Instruction::Multu { .. } => K::Multu,
            Instruction::Div { .. } => K::Div,
            Instruction::Divu { .. } => K::Divu,
            Instruction::Add { .. } => K::Add,
            Instruction::Addu { .. } => K::Addu,
            Instruction::Sub { .. } => K::Sub,
            Instruction::Subu { .. } => K::Subu,
            Instruction::And { .. } => K::And,
            Instruction::Or { .. } => K::Or,
            Instruction::Xor { .. } => K::Xor,
            Instruction::Nor { .. } => K::Nor,
            Instruction::Slt { .. } => K::Slt,
            Instruction::Sltu { .. } => K::Sltu,
            Instruction::Bltz { .. } => K::Bltz,
            Instruction::Bgez { .. } => K::Bgez,
            Instruction::Blez { .. } => K::Blez,
            Instruction::Bgtz { .. } => K::Bgtz,
            Instruction::Beq { .. } => K::Beq,
            Instruction::Bne { .. } => K::Bne,
            Instruction::J { .. } => K::J,
            Instruction::Jal { .. } => K::Jal,
            Instruction::Addi { .. } => K::Addi,
            Instruction::Addiu { .. } => K::Addiu,
            Instruction::Slti { .. } => K::Slti,
            Instruction::Sltiu { .. } => K::Sltiu,
            Instruction::Andi { .. } => K::Andi,
            Instruction::Ori { .. } => K::Ori,
            Instruction::Xori { .. } => K::Xori,
            Instruction::Lui { .. } => K::Lui,
            Instruction::Lb { .. } => K::Lb,
            Instruction::Lh { .. } => K::Lh,
            Instruction::Lw { .. } => K::Lw,
            Instruction::Lbu { .. } => K::Lbu,
            Instruction::Lhu { .. } => K::Lhu,
            Instruction::Sb { .. } => K::Sb,
            Instruction::Sh { .. } => K::Sh,
            Instruction::Sw { .. } => K::Sw,
            Instruction::Lwc1 { .. } => K::Lwc1,
            Instruction::Swc1 { .. } => K::Swc1,
            Instruction::Mfc1 { .. } => K::Mfc1,
            Instruction::Mtc1 { .. } => K::Mtc1,
            Instruction::Bc1f { .. } => K::Bc1f,
            Instruction::Bc1t { .. } => K::Bc1t,
            Instruction::FAdd { .. } => K::FAdd,
            Instruction::FSub { .. } => K::FSub,
            Instruction::FMul { .. } => K::FMul,
            Instruction::FDiv { .. } => K::FDiv,
            Instruction::FSqrt { .. } => K::FSqrt,
            Instruction::FAbs { .. } => K::FAbs,
            Instruction::FMov { .. } => K::FMov,
            Instruction::FNeg { .. } => K::FNeg,
            Instruction::CvtS { .. } => K::CvtS,
            Instruction::CvtD { .. } => K::CvtD,
            Instruction::CvtW { .. } => K::CvtW,
            Instruction::FCompare { .. } => K::FCompare,
        }
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.kind().shape()
    }

    /// Operand values keyed by field name
    pub fn fields(&self) -> FieldValues {
        let v = FieldValues::new();
        match *self {
            Instruction::Nop => v,
            Instruction::Sll { rd, rt, shamt }
            | Instruction::Srl { rd, rt, shamt }
            | Instruction::Sra { rd, rt, shamt } => v
                .with(Field::Rd, reg(rd))
                .with(Field::Rt, reg(rt))
                .with(Field::Shamt, shamt as i64),
            Instruction::Sllv { rd, rt, rs }
            | Instruction::Srlv { rd, rt, rs }
            | Instruction::Srav { rd, rt, rs }
            | Instruction::Add { rd, rs, rt }
            | Instruction::Addu { rd, rs, rt }
            | Instruction::Sub { rd, rs, rt }
            | Instruction::Subu { rd, rs, rt }
            | Instruction::And { rd, rs, rt }
            | Instruction::Or { rd, rs, rt }
            | Instruction::Xor { rd, rs, rt }
            | Instruction::Nor { rd, rs, rt }
            | Instruction::Slt { rd, rs, rt }
            | Instruction::Sltu { rd, rs, rt } => v
                .with(Field::Rd, reg(rd))
                .with(Field::Rs, reg(rs))
                .with(Field::Rt, reg(rt)),
            Instruction::Jr { rs } | Instruction::Mthi { rs } | Instruction::Mtlo { rs } => {
                v.with(Field::Rs, reg(rs))
            }
            Instruction::Jalr { rd, rs } => v.with(Field::Rd, reg(rd)).with(Field::Rs, reg(rs)),
            Instruction::Syscall { code } | Instruction::Break { code } => {
                v.with(Field::Code, code as i64)
            }
            Instruction::Teq { rs, rt, code } => v
                .with(Field::Rs, reg(rs))
                .with(Field::Rt, reg(rt))
                .with(Field::Code, code as i64),
            Instruction::Teqi { rs, imm } => v.with(Field::Rs, reg(rs)).with(Field::Imm, imm as i64),
            Instruction::Mfhi { rd } | Instruction::Mflo { rd } => v.with(Field::Rd, reg(rd)),
            Instruction::Mult { rs, rt }
            | Instruction::Multu { rs, rt }
            | Instruction::Div { rs, rt }
            | Instruction::Divu { rs, rt } => v.with(Field::Rs, reg(rs)).with(Field::Rt, reg(rt)),
            Instruction::Bltz { rs, offset }
            | Instruction::Bgez { rs, offset }
            | Instruction::Blez { rs, offset }
            | Instruction::Bgtz { rs, offset } => {
                v.with(Field::Rs, reg(rs)).with(Field::Imm, offset as i64)
            }
            Instruction::Beq { rs, rt, offset } | Instruction::Bne { rs, rt, offset } => v
                .with(Field::Rs, reg(rs))
                .with(Field::Rt, reg(rt))
                .with(Field::Imm, offset as i64),
            Instruction::J { target } | Instruction::Jal { target } => {
                v.with(Field::Target, target as i64)
            }
            Instruction::Addi { rt, rs, imm }
            | Instruction::Addiu { rt, rs, imm }
            | Instruction::Slti { rt, rs, imm }
            | Instruction::Sltiu { rt, rs, imm } => v
                .with(Field::Rt, reg(rt))
                .with(Field::Rs, reg(rs))
                .with(Field::Imm, imm as i64),
            Instruction::Andi { rt, rs, imm }
            | Instruction::Ori { rt, rs, imm }
            | Instruction::Xori { rt, rs, imm } => v
                .with(Field::Rt, reg(rt))
                .with(Field::Rs, reg(rs))
                .with(Field::Imm, imm as i64),
            Instruction::Lui { rt, imm } => v.with(Field::Rt, reg(rt)).with(Field::Imm, imm as i64),
            Instruction::Lb { rt, base, offset }
            | Instruction::Lh { rt, base, offset }
            | Instruction::Lw { rt, base, offset }
            | Instruction::Lbu { rt, base, offset }
            | Instruction::Lhu { rt, base, offset }
            | Instruction::Sb { rt, base, offset }
            | Instruction::Sh { rt, base, offset }
            | Instruction::Sw { rt, base, offset } => v
                .with(Field::Rt, reg(rt))
                .with(Field::Rs, reg(base))
                .with(Field::Imm, offset as i64),
            Instruction::Lwc1 { ft, base, offset } | Instruction::Swc1 { ft, base, offset } => v
                .with(Field::Ft, freg(ft))
                .with(Field::Rs, reg(base))
                .with(Field::Imm, offset as i64),
            Instruction::Mfc1 { rt, fs } | Instruction::Mtc1 { rt, fs } => {
                v.with(Field::Rt, reg(rt)).with(Field::Fs, freg(fs))
            }
            Instruction::Bc1f { cc, offset } | Instruction::Bc1t { cc, offset } => {
                v.with(Field::Cc, cc as i64).with(Field::Imm, offset as i64)
            }
            Instruction::FAdd { fmt, fd, fs, ft }
            | Instruction::FSub { fmt, fd, fs, ft }
            | Instruction::FMul { fmt, fd, fs, ft }
            | Instruction::FDiv { fmt, fd, fs, ft } => v
                .with(Field::Fmt, fmt.code() as i64)
                .with(Field::Fd, freg(fd))
                .with(Field::Fs, freg(fs))
                .with(Field::Ft, freg(ft)),
            Instruction::FSqrt { fmt, fd, fs }
            | Instruction::FAbs { fmt, fd, fs }
            | Instruction::FMov { fmt, fd, fs }
            | Instruction::FNeg { fmt, fd, fs }
            | Instruction::CvtS { fmt, fd, fs }
            | Instruction::CvtD { fmt, fd, fs }
            | Instruction::CvtW { fmt, fd, fs } => v
                .with(Field::Fmt, fmt.code() as i64)
                .with(Field::Fd, freg(fd))
                .with(Field::Fs, freg(fs)),
            Instruction::FCompare {
                fmt,
                cond,
                cc,
                fs,
                ft,
            } => v
                .with(Field::Fmt, fmt.code() as i64)
                .with(Field::Cond, cond.code() as i64)
                .with(Field::Cc, cc as i64)
                .with(Field::Fs, freg(fs))
                .with(Field::Ft, freg(ft)),
        }
    }

    /// Build the leaf `kind` from operand values.
    ///
    /// Returns `None` when a value does not name a valid operand (register
    /// out of range, unknown fmt code, ...). Immediates are truncated to the
    /// width of the variant's storage type; range checking is the caller's
    /// concern.
    pub fn from_fields(kind: InstructionKind, v: &FieldValues) -> Option<Self> {
        use InstructionKind as K;
        let rs = || gpr(v, Field::Rs);
        let rt = || gpr(v, Field::Rt);
        let rd = || gpr(v, Field::Rd);
        let fs = || fpr(v, Field::Fs);
        let ft = || fpr(v, Field::Ft);
        let fd = || fpr(v, Field::Fd);
        let shamt = || small(v, Field::Shamt).filter(|s| *s < 32);
        let imm = v.get(Field::Imm) as i16;
        let uimm = v.get(Field::Imm) as u16;

        let instruction = match kind {
            K::Nop => Instruction::Nop,
            K::Sll => Instruction::Sll { rd: rd()?, rt: rt()?, shamt: shamt()? },
            K::Srl => Instruction::Srl { rd: rd()?, rt: rt()?, shamt: shamt()? },
            K::Sra => Instruction::Sra { rd: rd()?, rt: rt()?, shamt: shamt()? },
            K::Sllv => Instruction::Sllv { rd: rd()?, rt: rt()?, rs: rs()? },
            K::Srlv => Instruction::Srlv { rd: rd()?, rt: rt()?, rs: rs()? },
            K::Srav => Instruction::Srav { rd: rd()?, rt: rt()?, rs: rs()? },
            K::Jr => Instruction::Jr { rs: rs()? },
            K::Jalr => Instruction::Jalr { rd: rd()?, rs: rs()? },
            K::Syscall => Instruction::Syscall { code: u32::try_from(v.get(Field::Code)).ok()? },
            K::Break => Instruction::Break { code: u32::try_from(v.get(Field::Code)).ok()? },
            K::Teq => Instruction::Teq {
                rs: rs()?,
                rt: rt()?,
                code: u16::try_from(v.get(Field::Code)).ok()?,
            },
            K::Teqi => Instruction::Teqi { rs: rs()?, imm },
            K::Mfhi => Instruction::Mfhi { rd: rd()? },
            K::Mthi => Instruction::Mthi { rs: rs()? },
            K::Mflo => Instruction::Mflo { rd: rd()? },
            K::Mtlo => Instruction::Mtlo { rs: rs()? },
            K::Mult => Instruction::Mult { rs: rs()?, rt: rt()? },
            K::Multu => Instruction::Multu { rs: rs()?, rt: rt()? },
            K::Div => Instruction::Div { rs: rs()?, rt: rt()? },
            K::Divu => Instruction::Divu { rs: rs()?, rt: rt()? },
            K::Add => Instruction::Add { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Addu => Instruction::Addu { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Sub => Instruction::Sub { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Subu => Instruction::Subu { rd: rd()?, rs: rs()?, rt: rt()? },
            K::And => Instruction::And { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Or => Instruction::Or { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Xor => Instruction::Xor { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Nor => Instruction::Nor { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Slt => Instruction::Slt { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Sltu => Instruction::Sltu { rd: rd()?, rs: rs()?, rt: rt()? },
            K::Bltz => Instruction::Bltz { rs: rs()?, offset: imm },
            K::Bgez => Instruction::Bgez { rs: rs()?, offset: imm },
            K::Blez => Instruction::Blez { rs: rs()?, offset: imm },
            K::Bgtz => Instruction::Bgtz { rs: rs()?, offset: imm },
            K::Beq => Instruction::Beq { rs: rs()?, rt: rt()?, offset: imm },
            K::Bne => Instruction::Bne { rs: rs()?, rt: rt()?, offset: imm },
            K::J => Instruction::J { target: u32::try_from(v.get(Field::Target)).ok()? },
            K::Jal => Instruction::Jal { target: u32::try_from(v.get(Field::Target)).ok()? },
            K::Addi => Instruction::Addi { rt: rt()?, rs: rs()?, imm },
            K::Addiu => Instruction::Addiu { rt: rt()?, rs: rs()?, imm },
            K::Slti => Instruction::Slti { rt: rt()?, rs: rs()?, imm },
            K::Sltiu => Instruction::Sltiu { rt: rt()?, rs: rs()?, imm },
            K::Andi => Instruction::Andi { rt: rt()?, rs: rs()?, imm: uimm },
            K::Ori => Instruction::Ori { rt: rt()?, rs: rs()?, imm: uimm },
            K::Xori => Instruction::Xori { rt: rt()?, rs: rs()?, imm: uimm },
            K::Lui => Instruction::Lui { rt: rt()?, imm: uimm },
            K::Lb => Instruction::Lb { rt: rt()?, base: rs()?, offset: imm },
            K::Lh => Instruction::Lh { rt: rt()?, base: rs()?, offset: imm },
            K::Lw => Instruction::Lw { rt: rt()?, base: rs()?, offset: imm },
            K::Lbu => Instruction::Lbu { rt: rt()?, base: rs()?, offset: imm },
            K::Lhu => Instruction::Lhu { rt: rt()?, base: rs()?, offset: imm },
            K::Sb => Instruction::Sb { rt: rt()?, base: rs()?, offset: imm },
            K::Sh => Instruction::Sh { rt: rt()?, base: rs()?, offset: imm },
            K::Sw => Instruction::Sw { rt: rt()?, base: rs()?, offset: imm },
            K::Lwc1 => Instruction::Lwc1 { ft: ft()?, base: rs()?, offset: imm },
            K::Swc1 => Instruction::Swc1 { ft: ft()?, base: rs()?, offset: imm },
            K::Mfc1 => Instruction::Mfc1 { rt: rt()?, fs: fs()? },
            K::Mtc1 => Instruction::Mtc1 { rt: rt()?, fs: fs()? },
            K::Bc1f => Instruction::Bc1f { cc: small(v, Field::Cc)?, offset: imm },
            K::Bc1t => Instruction::Bc1t { cc: small(v, Field::Cc)?, offset: imm },
            K::FAdd => Instruction::FAdd { fmt: format(v)?, fd: fd()?, fs: fs()?, ft: ft()? },
            K::FSub => Instruction::FSub { fmt: format(v)?, fd: fd()?, fs: fs()?, ft: ft()? },
            K::FMul => Instruction::FMul { fmt: format(v)?, fd: fd()?, fs: fs()?, ft: ft()? },
            K::FDiv => Instruction::FDiv { fmt: format(v)?, fd: fd()?, fs: fs()?, ft: ft()? },
            K::FSqrt => Instruction::FSqrt { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::FAbs => Instruction::FAbs { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::FMov => Instruction::FMov { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::FNeg => Instruction::FNeg { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::CvtS => Instruction::CvtS { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::CvtD => Instruction::CvtD { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::CvtW => Instruction::CvtW { fmt: format(v)?, fd: fd()?, fs: fs()? },
            K::FCompare => Instruction::FCompare {
                fmt: format(v)?,
                cond: small(v, Field::Cond).and_then(Condition::new)?,
                cc: small(v, Field::Cc)?,
                fs: fs()?,
                ft: ft()?,
            },
        };
        Some(instruction)
    }

    /// Encode to a 32-bit instruction word
    ///
    /// Operands must fit their fields; see [`Instruction::try_encode`] for a
    /// checked form that also enforces the leaf's restrictions.
    pub fn encode(&self) -> u32 {
        let layout = self.kind().layout();
        let values = self.fields();
        debug_assert!(
            layout.fields.iter().all(|f| f.fits(values.get(f.name))),
            "operand out of range in {:?}",
            self
        );
        codec::encode(layout, &values)
    }

    /// Encode, rejecting operands wider than their fields and words that
    /// violate the leaf's restrictions (such as `add.w`).
    pub fn try_encode(&self) -> Result<u32> {
        let kind = self.kind();
        let layout = kind.layout();
        let values = self.fields();
        if let Some(field) = layout.fields.iter().find(|f| !f.fits(values.get(f.name))) {
            return Err(SpecError::OperandOutOfRange {
                kind,
                field: field.name,
                value: values.get(field.name),
            });
        }
        let word = codec::encode(layout, &values);
        if !layout.matches(word) {
            return Err(SpecError::KindMismatch { kind, word });
        }
        Ok(word)
    }

    /// Decode `word` as leaf `kind`
    pub fn decode(kind: InstructionKind, word: u32) -> Result<Self> {
        if !kind.layout().matches(word) {
            return Err(SpecError::KindMismatch { kind, word });
        }
        Self::decode_as(kind, word).ok_or(SpecError::InvalidEncoding(word))
    }

    /// Decode `word` as leaf `kind`, or `None` if the word violates the
    /// leaf's constraints.
    pub fn decode_as(kind: InstructionKind, word: u32) -> Option<Self> {
        let layout = kind.layout();
        if !layout.matches(word) {
            return None;
        }
        Self::from_fields(kind, &codec::extract(layout, word))
    }

    /// Get instruction mnemonic (base form, see [`InstructionKind::mnemonic`])
    pub fn mnemonic(&self) -> &'static str {
        self.kind().mnemonic()
    }

    /// Conditional PC-relative branch
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Beq { .. }
                | Instruction::Bne { .. }
                | Instruction::Blez { .. }
                | Instruction::Bgtz { .. }
                | Instruction::Bltz { .. }
                | Instruction::Bgez { .. }
                | Instruction::Bc1f { .. }
                | Instruction::Bc1t { .. }
        )
    }

    /// Unconditional control transfer
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Instruction::J { .. }
                | Instruction::Jal { .. }
                | Instruction::Jr { .. }
                | Instruction::Jalr { .. }
        )
    }

    pub fn is_load(&self) -> bool {
        matches!(
            self,
            Instruction::Lb { .. }
                | Instruction::Lh { .. }
                | Instruction::Lw { .. }
                | Instruction::Lbu { .. }
                | Instruction::Lhu { .. }
                | Instruction::Lwc1 { .. }
        )
    }

    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Instruction::Sb { .. }
                | Instruction::Sh { .. }
                | Instruction::Sw { .. }
                | Instruction::Swc1 { .. }
        )
    }

    /// Branch offset in words, for PC-relative branches
    pub fn branch_offset(&self) -> Option<i16> {
        match *self {
            Instruction::Beq { offset, .. }
            | Instruction::Bne { offset, .. }
            | Instruction::Blez { offset, .. }
            | Instruction::Bgtz { offset, .. }
            | Instruction::Bltz { offset, .. }
            | Instruction::Bgez { offset, .. }
            | Instruction::Bc1f { offset, .. }
            | Instruction::Bc1t { offset, .. } => Some(offset),
            _ => None,
        }
    }

    /// Jump target in words, for `j`/`jal`
    pub fn jump_target(&self) -> Option<u32> {
        match *self {
            Instruction::J { target } | Instruction::Jal { target } => Some(target),
            _ => None,
        }
    }
}

/// Destination of a PC-relative branch at `pc` (offset counted from `pc + 4`)
#[inline]
pub fn branch_destination(pc: u32, offset: i16) -> u32 {
    pc.wrapping_add(4).wrapping_add(((offset as i32) << 2) as u32)
}

/// Destination of `j`/`jal` at `pc`: the word target within the 256 MB
/// region of the delay slot
#[inline]
pub fn jump_destination(pc: u32, target: u32) -> u32 {
    (pc.wrapping_add(4) & 0xF000_0000) | ((target << 2) & 0x0FFF_FFFF)
}

fn fp_name(base: &str, fmt: FloatFormat) -> String {
    format!("{}.{}", base, fmt.suffix())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.mnemonic();
        match *self {
            Instruction::Nop => write!(f, "nop"),

            Instruction::Sll { rd, rt, shamt }
            | Instruction::Srl { rd, rt, shamt }
            | Instruction::Sra { rd, rt, shamt } => write!(f, "{} {}, {}, {}", name, rd, rt, shamt),

            Instruction::Sllv { rd, rt, rs }
            | Instruction::Srlv { rd, rt, rs }
            | Instruction::Srav { rd, rt, rs } => write!(f, "{} {}, {}, {}", name, rd, rt, rs),

            Instruction::Jr { rs } | Instruction::Mthi { rs } | Instruction::Mtlo { rs } => {
                write!(f, "{} {}", name, rs)
            }
            Instruction::Jalr { rd, rs } => write!(f, "{} {}, {}", name, rd, rs),

            Instruction::Syscall { code } | Instruction::Break { code } => {
                if code == 0 {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{} {}", name, code)
                }
            }
            Instruction::Teq { rs, rt, code } => {
                if code == 0 {
                    write!(f, "{} {}, {}", name, rs, rt)
                } else {
                    write!(f, "{} {}, {}, {}", name, rs, rt, code)
                }
            }
            Instruction::Teqi { rs, imm } => write!(f, "{} {}, {}", name, rs, imm),

            Instruction::Mfhi { rd } | Instruction::Mflo { rd } => write!(f, "{} {}", name, rd),

            Instruction::Mult { rs, rt }
            | Instruction::Multu { rs, rt }
            | Instruction::Div { rs, rt }
            | Instruction::Divu { rs, rt } => write!(f, "{} {}, {}", name, rs, rt),

            Instruction::Add { rd, rs, rt }
            | Instruction::Addu { rd, rs, rt }
            | Instruction::Sub { rd, rs, rt }
            | Instruction::Subu { rd, rs, rt }
            | Instruction::And { rd, rs, rt }
            | Instruction::Or { rd, rs, rt }
            | Instruction::Xor { rd, rs, rt }
            | Instruction::Nor { rd, rs, rt }
            | Instruction::Slt { rd, rs, rt }
            | Instruction::Sltu { rd, rs, rt } => write!(f, "{} {}, {}, {}", name, rd, rs, rt),

            Instruction::Bltz { rs, offset }
            | Instruction::Bgez { rs, offset }
            | Instruction::Blez { rs, offset }
            | Instruction::Bgtz { rs, offset } => write!(f, "{} {}, {}", name, rs, offset),
            Instruction::Beq { rs, rt, offset } | Instruction::Bne { rs, rt, offset } => {
                write!(f, "{} {}, {}, {}", name, rs, rt, offset)
            }

            Instruction::J { target } | Instruction::Jal { target } => {
                write!(f, "{} 0x{:08x}", name, target << 2)
            }

            Instruction::Addi { rt, rs, imm }
            | Instruction::Addiu { rt, rs, imm }
            | Instruction::Slti { rt, rs, imm }
            | Instruction::Sltiu { rt, rs, imm } => write!(f, "{} {}, {}, {}", name, rt, rs, imm),
            Instruction::Andi { rt, rs, imm }
            | Instruction::Ori { rt, rs, imm }
            | Instruction::Xori { rt, rs, imm } => write!(f, "{} {}, {}, {}", name, rt, rs, imm),
            Instruction::Lui { rt, imm } => write!(f, "{} {}, {}", name, rt, imm),

            Instruction::Lb { rt, base, offset }
            | Instruction::Lh { rt, base, offset }
            | Instruction::Lw { rt, base, offset }
            | Instruction::Lbu { rt, base, offset }
            | Instruction::Lhu { rt, base, offset }
            | Instruction::Sb { rt, base, offset }
            | Instruction::Sh { rt, base, offset }
            | Instruction::Sw { rt, base, offset } => {
                write!(f, "{} {}, {}({})", name, rt, offset, base)
            }
            Instruction::Lwc1 { ft, base, offset } | Instruction::Swc1 { ft, base, offset } => {
                write!(f, "{} {}, {}({})", name, ft, offset, base)
            }

            Instruction::Mfc1 { rt, fs } | Instruction::Mtc1 { rt, fs } => {
                write!(f, "{} {}, {}", name, rt, fs)
            }
            Instruction::Bc1f { cc, offset } | Instruction::Bc1t { cc, offset } => {
                if cc == 0 {
                    write!(f, "{} {}", name, offset)
                } else {
                    write!(f, "{} {}, {}", name, cc, offset)
                }
            }

            Instruction::FAdd { fmt, fd, fs, ft } => write!(f, "{} {}, {}, {}", fp_name("add", fmt), fd, fs, ft),
            Instruction::FSub { fmt, fd, fs, ft } => write!(f, "{} {}, {}, {}", fp_name("sub", fmt), fd, fs, ft),
            Instruction::FMul { fmt, fd, fs, ft } => write!(f, "{} {}, {}, {}", fp_name("mul", fmt), fd, fs, ft),
            Instruction::FDiv { fmt, fd, fs, ft } => write!(f, "{} {}, {}, {}", fp_name("div", fmt), fd, fs, ft),
            Instruction::FSqrt { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("sqrt", fmt), fd, fs),
            Instruction::FAbs { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("abs", fmt), fd, fs),
            Instruction::FMov { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("mov", fmt), fd, fs),
            Instruction::FNeg { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("neg", fmt), fd, fs),
            Instruction::CvtS { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("cvt.s", fmt), fd, fs),
            Instruction::CvtD { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("cvt.d", fmt), fd, fs),
            Instruction::CvtW { fmt, fd, fs } => write!(f, "{} {}, {}", fp_name("cvt.w", fmt), fd, fs),
            Instruction::FCompare {
                fmt,
                cond,
                cc,
                fs,
                ft,
            } => {
                let name = format!("c.{}.{}", cond.name(), fmt.suffix());
                if cc == 0 {
                    write!(f, "{} {}, {}", name, fs, ft)
                } else {
                    write!(f, "{} {}, {}, {}", name, cc, fs, ft)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_add() {
        let add = Instruction::Add {
            rd: Register::T1,
            rs: Register::Zero,
            rt: Register::S0,
        };
        assert_eq!(add.encode(), 0x0010_4820);
        assert_eq!(add.encode().to_le_bytes(), [0x20, 0x48, 0x10, 0x00]);
    }

    #[test]
    fn test_decode_addi() {
        let inst = Instruction::decode_as(InstructionKind::Addi, 0x2008_000F).unwrap();
        assert_eq!(
            inst,
            Instruction::Addi {
                rt: Register::T0,
                rs: Register::Zero,
                imm: 0xF
            }
        );
        assert_eq!(inst.encode(), 0x2008_000F);
    }

    #[test]
    fn test_decode_rejects_other_leaf() {
        assert_eq!(Instruction::decode_as(InstructionKind::Addiu, 0x2008_000F), None);
        assert_eq!(Instruction::decode_as(InstructionKind::Sll, 0), None);
        assert_eq!(Instruction::decode_as(InstructionKind::Nop, 0), Some(Instruction::Nop));
    }

    #[test]
    fn test_decode_jump() {
        let inst = Instruction::decode_as(InstructionKind::J, 0x0810_0007).unwrap();
        assert_eq!(
            inst,
            Instruction::J {
                target: (0x0040_001C & 0x03FF_FFFF) >> 2
            }
        );
    }

    #[test]
    fn test_decode_reports_mismatch() {
        assert_eq!(
            Instruction::decode(InstructionKind::Addiu, 0x2008_000F),
            Err(SpecError::KindMismatch {
                kind: InstructionKind::Addiu,
                word: 0x2008_000F
            })
        );
        assert!(Instruction::decode(InstructionKind::Addi, 0x2008_000F).is_ok());
    }

    #[test]
    fn test_negative_offset_roundtrip() {
        let beq = Instruction::Beq {
            rs: Register::T0,
            rt: Register::T1,
            offset: -3,
        };
        let word = beq.encode();
        assert_eq!(word & 0xFFFF, 0xFFFD);
        assert_eq!(Instruction::decode_as(InstructionKind::Beq, word), Some(beq));
    }

    #[test]
    fn test_fp_format_restriction() {
        let add_s = Instruction::FAdd {
            fmt: FloatFormat::Single,
            fd: FpuRegister::F0,
            fs: FpuRegister::F12,
            ft: FpuRegister::F12,
        };
        let word = add_s.encode();
        assert_eq!(word >> 26, 0x11);
        assert_eq!(Instruction::decode_as(InstructionKind::FAdd, word), Some(add_s));

        // fmt = W is not a valid add.fmt encoding
        let as_word = (word & !(0x1F << 21)) | (FMT_W << 21);
        assert_eq!(Instruction::decode_as(InstructionKind::FAdd, as_word), None);
    }

    #[test]
    fn test_try_encode_checks_operands() {
        let sra = Instruction::Sra {
            rd: Register::T0,
            rt: Register::T1,
            shamt: 32,
        };
        assert_eq!(
            sra.try_encode(),
            Err(SpecError::OperandOutOfRange {
                kind: InstructionKind::Sra,
                field: Field::Shamt,
                value: 32
            })
        );

        let add_w = Instruction::FAdd {
            fmt: FloatFormat::Word,
            fd: FpuRegister::F0,
            fs: FpuRegister::F12,
            ft: FpuRegister::F12,
        };
        assert!(matches!(
            add_w.try_encode(),
            Err(SpecError::KindMismatch { kind: InstructionKind::FAdd, .. })
        ));

        let bc1t = Instruction::Bc1t { cc: 7, offset: -1 };
        assert_eq!(bc1t.try_encode(), Ok(bc1t.encode()));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "operand out of range")]
    fn test_encode_asserts_field_width() {
        let sll = Instruction::Sll {
            rd: Register::T0,
            rt: Register::T1,
            shamt: 40,
        };
        sll.encode();
    }

    #[test]
    fn test_from_fields_rejects_bad_register() {
        let values = FieldValues::new().with(Field::Rs, 40);
        assert_eq!(Instruction::from_fields(InstructionKind::Jr, &values), None);
    }

    #[test]
    fn test_condition_names() {
        assert_eq!(Condition::from_name("eq"), Some(Condition::EQ));
        assert_eq!(Condition::from_name("ngt").map(|c| c.code()), Some(15));
        assert!(Condition::LT.is_signaling());
        assert!(!Condition::OLT.is_signaling());
        assert_eq!(Condition::new(16), None);
    }

    #[test]
    fn test_display() {
        let add = Instruction::Add {
            rd: Register::T1,
            rs: Register::Zero,
            rt: Register::S0,
        };
        assert_eq!(add.to_string(), "add $t1, $zero, $s0");

        let lw = Instruction::Lw {
            rt: Register::T0,
            base: Register::Sp,
            offset: -8,
        };
        assert_eq!(lw.to_string(), "lw $t0, -8($sp)");

        let j = Instruction::J { target: 0x0010_0007 };
        assert_eq!(j.to_string(), "j 0x0040001c");

        let cmp = Instruction::FCompare {
            fmt: FloatFormat::Double,
            cond: Condition::LE,
            cc: 0,
            fs: FpuRegister::F0,
            ft: FpuRegister::F12,
        };
        assert_eq!(cmp.to_string(), "c.le.d $f0, $f12");

        let cvt = Instruction::CvtS {
            fmt: FloatFormat::Word,
            fd: FpuRegister::F0,
            fs: FpuRegister::F12,
        };
        assert_eq!(cvt.to_string(), "cvt.s.w $f0, $f12");
    }

    #[test]
    fn test_destinations() {
        assert_eq!(branch_destination(0x0040_0000, 3), 0x0040_0010);
        assert_eq!(branch_destination(0x0040_0010, -5), 0x0040_0000);
        assert_eq!(jump_destination(0x0040_0000, 0x0010_0007), 0x0040_001C);
        assert_eq!(jump_destination(0x1000_0000, 0x0000_0001), 0x1000_0004);
    }

    #[test]
    fn test_classification() {
        let beq = Instruction::Beq {
            rs: Register::T0,
            rt: Register::T1,
            offset: 4,
        };
        assert!(beq.is_branch());
        assert!(!beq.is_jump());
        assert_eq!(beq.branch_offset(), Some(4));
        assert!(Instruction::Jal { target: 1 }.is_jump());
        assert!(Instruction::Lw {
            rt: Register::T0,
            base: Register::Sp,
            offset: 0
        }
        .is_load());
    }
}
