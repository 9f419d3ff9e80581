//! Coprocessor 1 operations
//!
//! Operands are read through the format tag of the instruction: singles and
//! words from one register, doubles from an even/odd pair. Any operand the
//! format cannot address (odd register for a double, `.l` format, word
//! arithmetic) is an invalid instruction.

use crate::registers::RegisterCollection;
use crate::signal::SignalType;
use mips_spec::{Condition, FloatFormat, FpuRegister};

/// Outcome bits of `c.cond.fmt`, indexed by the condition code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicate {
    pub name: &'static str,
    /// True when either operand is NaN
    pub unordered: bool,
    pub equal: bool,
    pub less: bool,
    /// Raise an invalid operation on NaN operands
    pub signaling: bool,
}

const fn predicate(
    name: &'static str,
    unordered: bool,
    equal: bool,
    less: bool,
    signaling: bool,
) -> Predicate {
    Predicate {
        name,
        unordered,
        equal,
        less,
        signaling,
    }
}

/// The sixteen comparison predicates
pub const PREDICATES: [Predicate; 16] = [
    predicate("f", false, false, false, false),
    predicate("un", true, false, false, false),
    predicate("eq", false, true, false, false),
    predicate("ueq", true, true, false, false),
    predicate("olt", false, false, true, false),
    predicate("ult", true, false, true, false),
    predicate("ole", false, true, true, false),
    predicate("ule", true, true, true, false),
    predicate("sf", false, false, false, true),
    predicate("ngle", true, false, false, true),
    predicate("seq", false, true, false, true),
    predicate("ngl", true, true, false, true),
    predicate("lt", false, false, true, true),
    predicate("nge", true, false, true, true),
    predicate("le", false, true, true, true),
    predicate("ngt", true, true, true, true),
];

/// Result of comparing two operands under a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub result: bool,
    /// A signaling predicate saw a NaN
    pub invalid: bool,
}

pub fn compare_values(a: f64, b: f64, cond: Condition) -> Comparison {
    let predicate = &PREDICATES[cond.code() as usize];
    let unordered = a.is_nan() || b.is_nan();
    let result = if unordered {
        predicate.unordered
    } else {
        (predicate.equal && a == b) || (predicate.less && a < b)
    };
    Comparison {
        result,
        invalid: unordered && predicate.signaling,
    }
}

/// Round to the nearest word, ties to even. NaN and out of range values
/// produce the invalid result `0x7FFF_FFFF`.
pub fn round_to_word(value: f64) -> i32 {
    let rounded = value.round_ties_even();
    if rounded.is_nan() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        i32::MAX
    } else {
        rounded as i32
    }
}

/// Operand value read through a format tag
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FpValue {
    Single(f32),
    Double(f64),
    Word(i32),
}

impl FpValue {
    pub fn as_f64(self) -> f64 {
        match self {
            FpValue::Single(v) => v as f64,
            FpValue::Double(v) => v,
            FpValue::Word(v) => v as f64,
        }
    }
}

type FpResult<T> = Result<T, SignalType>;

pub fn read(regs: &RegisterCollection, fmt: FloatFormat, reg: FpuRegister) -> FpResult<FpValue> {
    match fmt {
        FloatFormat::Single => Ok(FpValue::Single(regs.single(reg))),
        FloatFormat::Double => regs
            .double(reg)
            .map(FpValue::Double)
            .ok_or(SignalType::InvalidInstruction),
        FloatFormat::Word => Ok(FpValue::Word(regs.fpr(reg) as i32)),
        FloatFormat::Long => Err(SignalType::InvalidInstruction),
    }
}

pub fn write(regs: &mut RegisterCollection, reg: FpuRegister, value: FpValue) -> FpResult<()> {
    match value {
        FpValue::Single(v) => regs.set_single(reg, v),
        FpValue::Double(v) => {
            if !regs.set_double(reg, v) {
                return Err(SignalType::InvalidInstruction);
            }
        }
        FpValue::Word(v) => regs.set_fpr(reg, v as u32),
    }
    Ok(())
}

/// `fd = op(fs, ft)` in single or double precision
pub fn binary(
    regs: &mut RegisterCollection,
    fmt: FloatFormat,
    fd: FpuRegister,
    fs: FpuRegister,
    ft: FpuRegister,
    single: impl Fn(f32, f32) -> f32,
    double: impl Fn(f64, f64) -> f64,
) -> FpResult<()> {
    let value = match (read(regs, fmt, fs)?, read(regs, fmt, ft)?) {
        (FpValue::Single(a), FpValue::Single(b)) => FpValue::Single(single(a, b)),
        (FpValue::Double(a), FpValue::Double(b)) => FpValue::Double(double(a, b)),
        _ => return Err(SignalType::InvalidInstruction),
    };
    write(regs, fd, value)
}

/// `fd = op(fs)` in single or double precision
pub fn unary(
    regs: &mut RegisterCollection,
    fmt: FloatFormat,
    fd: FpuRegister,
    fs: FpuRegister,
    single: impl Fn(f32) -> f32,
    double: impl Fn(f64) -> f64,
) -> FpResult<()> {
    let value = match read(regs, fmt, fs)? {
        FpValue::Single(a) => FpValue::Single(single(a)),
        FpValue::Double(a) => FpValue::Double(double(a)),
        FpValue::Word(_) => return Err(SignalType::InvalidInstruction),
    };
    write(regs, fd, value)
}

/// `cvt.to.from fd, fs`
pub fn convert(
    regs: &mut RegisterCollection,
    to: FloatFormat,
    from: FloatFormat,
    fd: FpuRegister,
    fs: FpuRegister,
) -> FpResult<()> {
    if to == from {
        return Err(SignalType::InvalidInstruction);
    }
    let source = read(regs, from, fs)?;
    let value = match to {
        FloatFormat::Single => FpValue::Single(match source {
            FpValue::Single(v) => v,
            FpValue::Double(v) => v as f32,
            FpValue::Word(v) => v as f32,
        }),
        FloatFormat::Double => FpValue::Double(source.as_f64()),
        FloatFormat::Word => FpValue::Word(round_to_word(source.as_f64())),
        FloatFormat::Long => return Err(SignalType::InvalidInstruction),
    };
    write(regs, fd, value)
}

/// `c.cond.fmt cc, fs, ft`: sets the flag, then reports a signaling NaN
pub fn compare(
    regs: &mut RegisterCollection,
    fmt: FloatFormat,
    cond: Condition,
    cc: u8,
    fs: FpuRegister,
    ft: FpuRegister,
) -> FpResult<()> {
    let comparison = match (read(regs, fmt, fs)?, read(regs, fmt, ft)?) {
        (FpValue::Single(a), FpValue::Single(b)) => compare_values(a as f64, b as f64, cond),
        (FpValue::Double(a), FpValue::Double(b)) => compare_values(a, b, cond),
        _ => return Err(SignalType::InvalidInstruction),
    };
    regs.set_condition_flag(cc, comparison.result);
    if comparison.invalid {
        return Err(SignalType::InvalidOperation);
    }
    Ok(())
}
