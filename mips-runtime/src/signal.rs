//! Signals raised by the CPU core
//!
//! A signal suspends the core until the owner resumes or halts it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    /// Signed overflow in `add`, `addi` or `sub`
    IntegerOverflow,
    /// Misaligned or unmapped fetch, load or store
    AddressError,
    /// Word that decodes to no instruction, or an illegal operand
    InvalidInstruction,
    /// Signaling floating point compare with a NaN operand
    InvalidOperation,
    /// `teq` / `teqi` with equal operands
    Trap,
    /// `break`
    Breakpoint,
    /// `syscall`
    SystemCall,
    /// PC ran off the end of the text segment
    Halt,
}

impl SignalType {
    /// Signals that report a fault of the program, as opposed to a request
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            SignalType::IntegerOverflow
                | SignalType::AddressError
                | SignalType::InvalidInstruction
                | SignalType::InvalidOperation
        )
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalType::IntegerOverflow => "integer overflow",
            SignalType::AddressError => "address error",
            SignalType::InvalidInstruction => "invalid instruction",
            SignalType::InvalidOperation => "invalid operation",
            SignalType::Trap => "trap",
            SignalType::Breakpoint => "breakpoint",
            SignalType::SystemCall => "system call",
            SignalType::Halt => "halt",
        };
        f.write_str(name)
    }
}

/// A raised signal with the state that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalType,
    /// Instruction word being executed
    pub word: u32,
    /// Address of that instruction
    pub pc: u32,
    /// Faulting data address, for `AddressError`
    pub address: Option<u32>,
}

impl Signal {
    pub fn new(kind: SignalType, word: u32, pc: u32) -> Self {
        Self {
            kind,
            word,
            pc,
            address: None,
        }
    }

    pub fn address_error(word: u32, pc: u32, address: u32) -> Self {
        Self {
            address: Some(address),
            ..Self::new(SignalType::AddressError, word, pc)
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at PC {:#010x} (word {:#010x})", self.kind, self.pc, self.word)?;
        if let Some(address) = self.address {
            write!(f, ", address {:#010x}", address)?;
        }
        Ok(())
    }
}
