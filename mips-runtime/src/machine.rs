//! Simulated machine
//!
//! Owns the CPU, memory, standard channels and the syscall service, and
//! routes `SystemCall` signals to the service.

use crate::cpu::{Cpu, CpuConfig, StepOutcome};
use crate::error::{Result, RuntimeError};
use crate::io::{Channels, DEFAULT_CAPACITY};
use crate::memory::{load_image, Memory, SparseMemory};
use crate::signal::{Signal, SignalType};
use crate::syscall::{SyscallOutcome, SyscallService};
use mips_spec::ProgramImage;
use serde::{Deserialize, Serialize};

/// CPU model driving the machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    Monocycle,
    /// Five-stage pipeline, not runnable
    Pipelined,
}

/// Machine configuration
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub architecture: Architecture,
    pub cpu: CpuConfig,
    /// Capacity of each standard channel in characters
    pub channel_capacity: usize,
    /// Cycle budget used by [`crate::run`]
    pub max_cycles: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Monocycle,
            cpu: CpuConfig::default(),
            channel_capacity: DEFAULT_CAPACITY,
            max_cycles: 1_000_000,
        }
    }
}

/// Result of one clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockOutcome {
    /// An instruction completed
    Executed,
    /// A syscall waits for input or output space
    Blocked,
    Exited(i32),
    /// The program raised a signal the machine does not handle
    Signaled(Signal),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Exited { code: i32, cycles: u64 },
    Blocked { cycles: u64 },
    Faulted { signal: Signal, cycles: u64 },
    CycleLimit { cycles: u64 },
}

pub struct Machine<M: Memory = SparseMemory> {
    cpu: Cpu,
    memory: M,
    channels: Channels,
    syscalls: SyscallService,
    config: MachineConfig,
}

impl Machine<SparseMemory> {
    /// Load `image` into fresh zero-filled memory
    pub fn new(image: &ProgramImage, config: MachineConfig) -> Result<Self> {
        Self::with_memory(SparseMemory::new(), image, config)
    }
}

impl<M: Memory> Machine<M> {
    pub fn with_memory(mut memory: M, image: &ProgramImage, config: MachineConfig) -> Result<Self> {
        if config.architecture != Architecture::Monocycle {
            return Err(RuntimeError::UnsupportedArchitecture(config.architecture));
        }
        load_image(&mut memory, image)?;
        let mut cpu = Cpu::new(config.cpu);
        cpu.reset(image);
        tracing::debug!(
            "machine loaded: {} text bytes, {} data bytes, entry {:#010x}",
            image.text.len(),
            image.data.len(),
            image.entry
        );

        Ok(Self {
            cpu,
            memory,
            channels: Channels::new(config.channel_capacity),
            syscalls: SyscallService::new(),
            config,
        })
    }

    /// Execute exactly one cycle
    pub fn clock(&mut self) -> Result<ClockOutcome> {
        match self.cpu.step(&mut self.memory) {
            Ok(StepOutcome::Executed { .. }) => Ok(ClockOutcome::Executed),
            Ok(StepOutcome::Halted(code)) => Ok(ClockOutcome::Exited(code)),
            Err(signal) => match signal.kind {
                SignalType::SystemCall => self.system_call(signal),
                SignalType::Halt => Ok(ClockOutcome::Exited(self.cpu.exit_code().unwrap_or(0))),
                _ => Ok(ClockOutcome::Signaled(signal)),
            },
        }
    }

    fn system_call(&mut self, signal: Signal) -> Result<ClockOutcome> {
        let outcome = self.syscalls.handle(
            self.cpu.registers_mut(),
            &mut self.memory,
            &mut self.channels,
            signal.pc,
        )?;
        match outcome {
            SyscallOutcome::Continue => {
                self.cpu.resume()?;
                Ok(ClockOutcome::Executed)
            }
            SyscallOutcome::WouldBlock => Ok(ClockOutcome::Blocked),
            SyscallOutcome::Exit(code) => {
                self.cpu.halt(code);
                Ok(ClockOutcome::Exited(code))
            }
        }
    }

    /// Clock until the program exits, blocks, faults or uses `max_cycles`
    pub fn run(&mut self, max_cycles: u64) -> Result<RunOutcome> {
        let start = self.cpu.cycles();
        loop {
            let cycles = self.cpu.cycles() - start;
            if cycles >= max_cycles {
                return Ok(RunOutcome::CycleLimit { cycles });
            }
            let outcome = self.clock()?;
            let cycles = self.cpu.cycles() - start;
            match outcome {
                ClockOutcome::Executed => {}
                ClockOutcome::Blocked => return Ok(RunOutcome::Blocked { cycles }),
                ClockOutcome::Exited(code) => return Ok(RunOutcome::Exited { code, cycles }),
                ClockOutcome::Signaled(signal) => {
                    return Ok(RunOutcome::Faulted { signal, cycles })
                }
            }
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut Channels {
        &mut self.channels
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mips_spec::Register;

    // addi $v0, $zero, 5 / syscall / addi $a0, $v0, 1 / addi $v0, $zero, 1 /
    // syscall
    const ECHO: [u32; 5] = [0x2002_0005, 0x0000_000C, 0x2044_0001, 0x2002_0001, 0x0000_000C];

    fn machine(words: &[u32]) -> Machine {
        Machine::new(&ProgramImage::from_words(words), MachineConfig::default()).unwrap()
    }

    #[test]
    fn test_pipelined_is_refused() {
        let config = MachineConfig {
            architecture: Architecture::Pipelined,
            ..MachineConfig::default()
        };
        let result = Machine::new(&ProgramImage::from_words(&[0]), config);
        assert!(matches!(
            result,
            Err(RuntimeError::UnsupportedArchitecture(Architecture::Pipelined))
        ));
    }

    #[test]
    fn test_invalid_image_is_refused() {
        let mut image = ProgramImage::from_words(&[0]);
        image.text.push(0);
        assert!(matches!(
            Machine::new(&image, MachineConfig::default()),
            Err(RuntimeError::SpecError(_))
        ));
    }

    #[test]
    fn test_blocked_read_resumes_after_input() {
        let mut machine = machine(&ECHO);
        assert_eq!(machine.clock().unwrap(), ClockOutcome::Executed);
        assert_eq!(machine.clock().unwrap(), ClockOutcome::Blocked);
        assert_eq!(machine.clock().unwrap(), ClockOutcome::Blocked);

        machine.channels_mut().stdin.push_str("41\n");
        assert_eq!(machine.clock().unwrap(), ClockOutcome::Executed);
        assert_eq!(machine.cpu().registers().gpr(Register::V0), 41);

        let outcome = machine.run(100).unwrap();
        assert_eq!(outcome, RunOutcome::Exited { code: 0, cycles: 3 });
        assert_eq!(machine.channels_mut().stdout.drain_string(), "42");
    }

    #[test]
    fn test_exit_syscall() {
        // addi $a0, $zero, 3 / addi $v0, $zero, 17 / syscall / break
        let mut machine = machine(&[0x2004_0003, 0x2002_0011, 0x0000_000C, 0x0000_000D]);
        assert_eq!(machine.run(100).unwrap(), RunOutcome::Exited { code: 3, cycles: 2 });
        assert_eq!(machine.clock().unwrap(), ClockOutcome::Exited(3));
    }

    #[test]
    fn test_fault_is_reported() {
        let mut machine = machine(&[0x0000_000D]);
        match machine.run(10).unwrap() {
            RunOutcome::Faulted { signal, cycles } => {
                assert_eq!(signal.kind, SignalType::Breakpoint);
                assert_eq!(cycles, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_cycle_limit() {
        // loop: beq $zero, $zero, loop / nop
        let mut machine = machine(&[0x1000_FFFF, 0x0000_0000]);
        assert_eq!(machine.run(50).unwrap(), RunOutcome::CycleLimit { cycles: 50 });
    }

    #[test]
    fn test_unknown_syscall_is_an_error() {
        // addi $v0, $zero, 99 / syscall
        let mut machine = machine(&[0x2002_0063, 0x0000_000C]);
        assert!(matches!(
            machine.run(10),
            Err(RuntimeError::UnknownSyscall { service: 99, .. })
        ));
    }
}
