//! Register definitions for MIPS I (O32 naming convention)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of general purpose registers
pub const NUM_REGISTERS: usize = 32;

/// Number of floating point (coprocessor 1) registers
pub const NUM_FPU_REGISTERS: usize = 32;

/// General purpose register ($0-$31)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    Zero = 0, // hardwired to 0
    At = 1,   // assembler temporary
    V0 = 2,   // return values
    V1 = 3,
    A0 = 4, // arguments
    A1 = 5,
    A2 = 6,
    A3 = 7,
    T0 = 8, // temporaries (caller-saved)
    T1 = 9,
    T2 = 10,
    T3 = 11,
    T4 = 12,
    T5 = 13,
    T6 = 14,
    T7 = 15,
    S0 = 16, // saved (callee-saved)
    S1 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    T8 = 24,
    T9 = 25,
    K0 = 26, // reserved for the kernel
    K1 = 27,
    Gp = 28, // global pointer
    Sp = 29, // stack pointer
    Fp = 30, // frame pointer
    Ra = 31, // return address
}

impl Register {
    /// All registers in index order
    pub const ALL: [Register; NUM_REGISTERS] = [
        Self::Zero,
        Self::At,
        Self::V0,
        Self::V1,
        Self::A0,
        Self::A1,
        Self::A2,
        Self::A3,
        Self::T0,
        Self::T1,
        Self::T2,
        Self::T3,
        Self::T4,
        Self::T5,
        Self::T6,
        Self::T7,
        Self::S0,
        Self::S1,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::S5,
        Self::S6,
        Self::S7,
        Self::T8,
        Self::T9,
        Self::K0,
        Self::K1,
        Self::Gp,
        Self::Sp,
        Self::Fp,
        Self::Ra,
    ];

    const NAMES: [&'static str; NUM_REGISTERS] = [
        "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5",
        "t6", "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1",
        "gp", "sp", "fp", "ra",
    ];

    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self == Self::Zero
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }

    /// Resolve an assembly register name such as `$t0`, `t0` or `$8`.
    ///
    /// `$s8` is accepted as an alias of `$fp`.
    pub fn parse(text: &str) -> Option<Self> {
        let name = text.strip_prefix('$').unwrap_or(text);
        if let Some(index) = Self::NAMES.iter().position(|n| *n == name) {
            return Self::from_index(index);
        }
        if name == "s8" {
            return Some(Self::Fp);
        }
        parse_number(name).and_then(Self::from_index)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name())
    }
}

/// Floating point register ($f0-$f31)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FpuRegister(u8);

impl FpuRegister {
    pub const F0: Self = Self(0);
    pub const F12: Self = Self(12);

    #[inline]
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < NUM_FPU_REGISTERS).then_some(Self(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Double precision values occupy an even/odd register pair
    #[inline]
    pub fn is_even(self) -> bool {
        self.0 % 2 == 0
    }

    /// Resolve `$f12` or `f12`
    pub fn parse(text: &str) -> Option<Self> {
        let name = text.strip_prefix('$').unwrap_or(text);
        let digits = name.strip_prefix('f')?;
        let index = parse_number(digits)?;
        u8::try_from(index).ok().and_then(Self::new)
    }
}

impl fmt::Display for FpuRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$f{}", self.0)
    }
}

fn parse_number(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Register banks tracked by the simulator
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterGroup {
    /// $0-$31
    General,
    /// $f0-$f31
    Fpu,
    /// FIR (0) and FCSR (31)
    FpuControl,
    /// PC, HI and LO
    Special,
}

/// Indices into the special register bank
pub mod special {
    pub const PC: usize = 0;
    pub const HI: usize = 1;
    pub const LO: usize = 2;
    pub const COUNT: usize = 3;
}

/// Indices into the FPU control register bank
pub mod fpu_control {
    pub const FIR: usize = 0;
    pub const FCSR: usize = 31;
    pub const COUNT: usize = 32;
}
