//! # MIPS Runtime
//!
//! Cycle-stepped simulation of MIPS I programs.
//!
//! ## Features
//!
//! - **Monocycle core**: fetch, decode, execute and PC update per cycle
//! - **Delayed branching**: taken branches commit after their delay slot
//! - **Signals**: overflow, address errors, traps and syscalls suspend the core
//! - **Coprocessor 1**: single and double precision with all 16 compare predicates
//! - **Syscalls**: console I/O over bounded channels, sbrk and exit
//!
//! ## Example
//!
//! ```rust
//! use mips_runtime::{Machine, MachineConfig, RunOutcome};
//! use mips_spec::ProgramImage;
//!
//! // addi $a0, $zero, 7 / addi $v0, $zero, 1 / syscall
//! let image = ProgramImage::from_words(&[0x2004_0007, 0x2002_0001, 0x0000_000C]);
//! let mut machine = Machine::new(&image, MachineConfig::default()).unwrap();
//! let outcome = machine.run(1_000).unwrap();
//! assert!(matches!(outcome, RunOutcome::Exited { code: 0, .. }));
//! assert_eq!(machine.channels_mut().stdout.drain_string(), "7");
//! ```

pub mod cpu;
pub mod error;
pub mod execute;
pub mod fpu;
pub mod io;
pub mod machine;
pub mod memory;
pub mod pipeline;
pub mod registers;
pub mod signal;
pub mod syscall;

pub use cpu::{Cpu, CpuConfig, CpuState, StepOutcome};
pub use error::{Result, RuntimeError};
pub use io::{CharChannel, Channels};
pub use machine::{Architecture, ClockOutcome, Machine, MachineConfig, RunOutcome};
pub use memory::{load_image, Memory, SparseMemory};
pub use pipeline::{Latch, PipelinedCpu};
pub use registers::{RegisterCollection, RegisterWrite};
pub use signal::{Signal, SignalType};
pub use syscall::{SyscallOutcome, SyscallService};

/// Simple execution helper
///
/// Runs `image` with `stdin` as closed console input and returns the outcome
/// together with everything printed.
pub fn run(image: &mips_spec::ProgramImage, stdin: &str) -> Result<(RunOutcome, String)> {
    let config = MachineConfig {
        channel_capacity: stdin.chars().count().max(io::DEFAULT_CAPACITY),
        ..MachineConfig::default()
    };
    let max_cycles = config.max_cycles;
    let mut machine = Machine::new(image, config)?;
    machine.channels_mut().stdin.push_str(stdin);
    machine.channels_mut().stdin.close();

    let mut output = String::new();
    loop {
        let outcome = machine.run(max_cycles)?;
        let drained = machine.channels_mut().stdout.drain_string();
        output.push_str(&drained);
        // Output backpressure clears once drained
        if matches!(outcome, RunOutcome::Blocked { .. }) && !drained.is_empty() {
            continue;
        }
        return Ok((outcome, output));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mips_spec::ProgramImage;

    #[test]
    fn test_public_exports() {
        let _ = MachineConfig::default();
        let _ = CpuConfig::default();
        let _ = SparseMemory::new();
        let _ = SyscallService::default();
        let _ = Latch::<u32>::new();
    }

    #[test]
    fn test_machine_config_default() {
        let config = MachineConfig::default();
        assert_eq!(config.architecture, Architecture::Monocycle);
        assert!(config.cpu.delayed_branching);
        assert_eq!(config.max_cycles, 1_000_000);
    }

    #[test]
    fn test_run_helper() {
        // addi $v0, $zero, 5 / syscall / addi $a0, $v0, 1 / addi $v0, $zero, 1 / syscall
        let image = ProgramImage::from_words(&[
            0x2002_0005,
            0x0000_000C,
            0x2044_0001,
            0x2002_0001,
            0x0000_000C,
        ]);
        let (outcome, output) = run(&image, "9\n").unwrap();
        assert!(matches!(outcome, RunOutcome::Exited { code: 0, .. }));
        assert_eq!(output, "10");
    }

    #[test]
    fn test_run_helper_end_of_input() {
        let image = ProgramImage::from_words(&[0x2002_0005, 0x0000_000C]);
        assert_eq!(run(&image, ""), Err(RuntimeError::EndOfInput));
    }
}
