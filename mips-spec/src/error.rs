//! # Error Types for the MIPS Instruction Model

use crate::kind::InstructionKind;
use crate::layout::{Field, LayoutError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    // Instruction errors
    #[error("Invalid instruction encoding: {0:#010x}")]
    InvalidEncoding(u32),

    #[error("Word {word:#010x} does not encode {kind:?}")]
    KindMismatch { kind: InstructionKind, word: u32 },

    #[error("Operand {value} does not fit field {field:?} of {kind:?}")]
    OperandOutOfRange {
        kind: InstructionKind,
        field: Field,
        value: i64,
    },

    #[error("Invalid layout for {kind:?}: {source}")]
    InvalidLayout {
        kind: InstructionKind,
        #[source]
        source: LayoutError,
    },

    // Program image errors
    #[error("Text segment size {0} is not a whole number of words")]
    InvalidTextSize(usize),

    #[error("{segment} segment base {base:#010x} is not word aligned")]
    MisalignedSegment { segment: &'static str, base: u32 },

    #[error("{segment} segment at {base:#010x} with {len} bytes exceeds the address space")]
    SegmentOverflow {
        segment: &'static str,
        base: u32,
        len: usize,
    },

    #[error("Entry point {0:#010x} is not an instruction of the text segment")]
    InvalidEntry(u32),
}

pub type Result<T> = std::result::Result<T, SpecError>;
