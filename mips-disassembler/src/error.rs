//! Disassembler errors

use mips_spec::SpecError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisassemblerError {
    #[error("Invalid instruction encoding: 0x{0:08X}")]
    InvalidEncoding(u32),

    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("Invalid program image: {0}")]
    InvalidImage(#[from] SpecError),
}

pub type Result<T> = std::result::Result<T, DisassemblerError>;
