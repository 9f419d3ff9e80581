//! Runtime error types
//!
//! Faults of the simulated program are [`Signal`](crate::Signal)s, not errors.
//! A `RuntimeError` means the host side of the simulation cannot continue.

use crate::machine::Architecture;
use mips_spec::SpecError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Spec error: {0}")]
    SpecError(#[from] SpecError),

    #[error("Misaligned access: address {address:#x}, alignment {alignment}")]
    MisalignedAccess { address: u32, alignment: u32 },

    #[error("Unknown syscall {service} at PC {pc:#x}")]
    UnknownSyscall { service: u32, pc: u32 },

    #[error("Invalid syscall argument: {0}")]
    InvalidSyscallArgument(String),

    #[error("Output channel is full")]
    ChannelFull,

    #[error("End of input")]
    EndOfInput,

    #[error("Architecture {0:?} is not supported")]
    UnsupportedArchitecture(Architecture),

    #[error("CPU is not suspended")]
    NotSuspended,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misaligned_access_display() {
        let err = RuntimeError::MisalignedAccess {
            address: 0x1001,
            alignment: 4,
        };
        assert_eq!(err.to_string(), "Misaligned access: address 0x1001, alignment 4");
    }

    #[test]
    fn test_unknown_syscall_display() {
        let err = RuntimeError::UnknownSyscall {
            service: 999,
            pc: 0x0040_0010,
        };
        assert_eq!(err.to_string(), "Unknown syscall 999 at PC 0x400010");
    }

    #[test]
    fn test_spec_error_from() {
        let err: RuntimeError = SpecError::InvalidTextSize(3).into();
        assert!(err.to_string().starts_with("Spec error"));
    }

    #[test]
    fn test_unsupported_architecture_display() {
        let err = RuntimeError::UnsupportedArchitecture(Architecture::Pipelined);
        assert_eq!(err.to_string(), "Architecture Pipelined is not supported");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuntimeError>();
    }
}
