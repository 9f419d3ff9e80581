//! # MIPS I Instruction Model
//!
//! Typed instructions, declarative bit layouts, and the generic codec that
//! turns one into the other.
//!
//! ## Key Features
//! - Closed sum type over every supported instruction leaf
//! - Per-leaf layouts as `const` data, validated at compile time
//! - One encode and one extract routine shared by all leaves
//! - O32 register naming and the register banks of the simulator
//! - Flat program image (text, data, entry point)

pub mod codec;
pub mod error;
pub mod instruction;
pub mod kind;
pub mod layout;
pub mod program;
pub mod register;

pub use codec::FieldValues;
pub use error::{Result, SpecError};
pub use instruction::{
    branch_destination, jump_destination, Condition, FloatFormat, Instruction,
};
pub use kind::{InstructionKind, Shape};
pub use layout::{ConstraintKind, Field, FieldInfo, FormatInfo, Layout, LayoutError};
pub use program::{
    segment_limit, ProgramImage, DATA_BASE, GLOBAL_POINTER, HEAP_BASE, MAX_SEGMENT_BYTES,
    STACK_POINTER, TEXT_BASE, WORD_BYTES,
};
pub use register::{FpuRegister, Register, RegisterGroup, NUM_FPU_REGISTERS, NUM_REGISTERS};

/// Word type (32-bit)
pub type Word = u32;

/// Address type (32-bit)
pub type Address = u32;
