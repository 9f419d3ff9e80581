//! Monocycle CPU core
//!
//! One [`Cpu::step`] is one cycle: fetch, decode, execute, PC update. Taken
//! branches go through the delay protocol when delayed branching is enabled.
//! A signal suspends the core until [`Cpu::resume`] or [`Cpu::halt`].

use crate::error::{Result, RuntimeError};
use crate::execute::{execute, Context, Fault, Flow};
use crate::memory::Memory;
use crate::registers::RegisterCollection;
use crate::signal::{Signal, SignalType};
use mips_disassembler::Disassembler;
use mips_spec::{Instruction, ProgramImage, Register, GLOBAL_POINTER, STACK_POINTER, TEXT_BASE};

/// CPU configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuConfig {
    /// Execute the instruction after a taken branch before transferring
    pub delayed_branching: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            delayed_branching: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    /// Waiting for the owner to resume or halt
    Suspended(Signal),
    /// Stopped with an exit code
    Halted(i32),
}

/// Result of a cycle that raised no signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Executed { pc: u32, instruction: Instruction },
    Halted(i32),
}

pub struct Cpu {
    registers: RegisterCollection,
    disassembler: Disassembler,
    config: CpuConfig,
    state: CpuState,
    /// Target of a taken branch waiting for its delay slot
    pending_branch: Option<u32>,
    /// PC to continue from after the current signal
    resume_pc: u32,
    text_start: u32,
    text_end: u32,
    cycles: u64,
}

impl Cpu {
    pub fn new(config: CpuConfig) -> Self {
        Self {
            registers: RegisterCollection::new(),
            disassembler: Disassembler::new(),
            config,
            state: CpuState::Running,
            pending_branch: None,
            resume_pc: TEXT_BASE,
            text_start: TEXT_BASE,
            text_end: TEXT_BASE,
            cycles: 0,
        }
    }

    /// Reset registers and state for a freshly loaded `image`
    pub fn reset(&mut self, image: &ProgramImage) {
        self.registers = RegisterCollection::new();
        self.registers.set_gpr(Register::Sp, STACK_POINTER);
        self.registers.set_gpr(Register::Gp, GLOBAL_POINTER);
        self.registers.set_pc(image.entry);
        self.registers.drain_dirty();

        self.state = CpuState::Running;
        self.pending_branch = None;
        self.resume_pc = image.entry;
        self.text_start = image.text_base;
        self.text_end = image.text_end();
        self.cycles = 0;
    }

    /// Execute one cycle
    pub fn step<M: Memory + ?Sized>(&mut self, memory: &mut M) -> std::result::Result<StepOutcome, Signal> {
        match self.state {
            CpuState::Running => {}
            CpuState::Suspended(signal) => return Err(signal),
            CpuState::Halted(code) => return Ok(StepOutcome::Halted(code)),
        }

        let mut pc = self.registers.pc();
        if pc == self.text_end {
            // A delay slot past the end of text acts as a nop
            if let Some(target) = self.pending_branch.take() {
                self.registers.set_pc(target);
                pc = target;
            }
        }
        if pc == self.text_end {
            self.state = CpuState::Halted(0);
            tracing::info!("PC {:#010x} reached end of text, halting", pc);
            return Err(Signal::new(SignalType::Halt, 0, pc));
        }

        let pending = self.pending_branch.take();
        let next_pc = pending.unwrap_or(pc.wrapping_add(4));

        // Fetch
        if pc % 4 != 0 || pc < self.text_start || pc > self.text_end {
            return Err(self.suspend(Signal::address_error(0, pc, pc), next_pc));
        }
        let word = match memory.read_word(pc) {
            Ok(word) => word,
            Err(_) => return Err(self.suspend(Signal::address_error(0, pc, pc), next_pc)),
        };

        // Decode
        let instruction = match self.disassembler.decode(word).copied() {
            Some(instruction) => instruction,
            None => {
                let signal = Signal::new(SignalType::InvalidInstruction, word, pc);
                return Err(self.suspend(signal, next_pc));
            }
        };

        // Execute
        let delayed = self.config.delayed_branching;
        let link = if delayed {
            pc.wrapping_add(8)
        } else {
            pc.wrapping_add(4)
        };
        let mut cx = Context {
            regs: &mut self.registers,
            memory,
            pc,
            link,
        };
        match execute(&instruction, &mut cx) {
            Ok(Flow::Next) => self.registers.set_pc(next_pc),
            Ok(Flow::Jump(target)) if delayed => {
                self.pending_branch = Some(target);
                self.registers.set_pc(next_pc);
            }
            Ok(Flow::Jump(target)) => self.registers.set_pc(target),
            Err(Fault { kind, address }) => {
                let signal = Signal {
                    kind,
                    word,
                    pc,
                    address,
                };
                return Err(self.suspend(signal, next_pc));
            }
        }

        self.cycles += 1;
        tracing::trace!("[{:6}] PC={:#010x} {}", self.cycles, pc, instruction);
        Ok(StepOutcome::Executed { pc, instruction })
    }

    fn suspend(&mut self, signal: Signal, resume_pc: u32) -> Signal {
        tracing::debug!("signal: {}", signal);
        self.state = CpuState::Suspended(signal);
        self.resume_pc = resume_pc;
        signal
    }

    /// Continue past the instruction that raised the pending signal
    pub fn resume(&mut self) -> Result<()> {
        if !matches!(self.state, CpuState::Suspended(_)) {
            return Err(RuntimeError::NotSuspended);
        }
        self.state = CpuState::Running;
        self.registers.set_pc(self.resume_pc);
        self.cycles += 1;
        Ok(())
    }

    /// Stop the core; every later step reports `code`
    pub fn halt(&mut self, code: i32) {
        tracing::info!("halted with exit code {} after {} cycles", code, self.cycles);
        self.state = CpuState::Halted(code);
        self.pending_branch = None;
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, CpuState::Halted(_))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            CpuState::Halted(code) => Some(code),
            _ => None,
        }
    }

    /// Signal the core is suspended on, if any
    pub fn pending_signal(&self) -> Option<Signal> {
        match self.state {
            CpuState::Suspended(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn pending_branch(&self) -> Option<u32> {
        self.pending_branch
    }

    /// Completed instructions
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    pub fn registers(&self) -> &RegisterCollection {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterCollection {
        &mut self.registers
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(CpuConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{load_image, SparseMemory};

    fn boot(words: &[u32], config: CpuConfig) -> (Cpu, SparseMemory) {
        let image = ProgramImage::from_words(words);
        let mut memory = SparseMemory::new();
        load_image(&mut memory, &image).unwrap();
        let mut cpu = Cpu::new(config);
        cpu.reset(&image);
        (cpu, memory)
    }

    // addi $t0, $zero, 1 / beq $zero, $zero, +2 / addi $t1, $zero, 2 /
    // addi $t2, $zero, 3 / addi $t3, $zero, 4
    const BRANCH_PROGRAM: [u32; 5] = [0x2008_0001, 0x1000_0002, 0x2009_0002, 0x200A_0003, 0x200B_0004];

    #[test]
    fn test_reset_initial_registers() {
        let (cpu, _) = boot(&[0x0000_0000], CpuConfig::default());
        assert_eq!(cpu.registers().gpr(Register::Sp), STACK_POINTER);
        assert_eq!(cpu.registers().gpr(Register::Gp), GLOBAL_POINTER);
        assert_eq!(cpu.registers().pc(), TEXT_BASE);
        assert!(cpu.registers().dirty().is_empty());
    }

    #[test]
    fn test_delay_slot_executes_before_branch() {
        let (mut cpu, mut memory) = boot(&BRANCH_PROGRAM, CpuConfig::default());
        cpu.step(&mut memory).unwrap();
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.pending_branch(), Some(TEXT_BASE + 16));
        assert_eq!(cpu.registers().pc(), TEXT_BASE + 8);

        // Delay slot
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().gpr(Register::T1), 2);
        assert_eq!(cpu.registers().pc(), TEXT_BASE + 16);
        assert_eq!(cpu.pending_branch(), None);

        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().gpr(Register::T2), 0);
        assert_eq!(cpu.registers().gpr(Register::T3), 4);
    }

    #[test]
    fn test_branch_in_last_word_still_jumps() {
        // addi $t0, $t0, 1 / beq $zero, $zero, -2
        let (mut cpu, mut memory) = boot(&[0x2108_0001, 0x1000_FFFE], CpuConfig::default());
        cpu.step(&mut memory).unwrap();
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().pc(), TEXT_BASE + 8);
        assert_eq!(cpu.pending_branch(), Some(TEXT_BASE));

        assert_eq!(
            cpu.step(&mut memory),
            Ok(StepOutcome::Executed {
                pc: TEXT_BASE,
                instruction: Instruction::Addi {
                    rt: Register::T0,
                    rs: Register::T0,
                    imm: 1
                }
            })
        );
        assert_eq!(cpu.registers().gpr(Register::T0), 2);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn test_branch_commits_immediately_without_delay() {
        let config = CpuConfig {
            delayed_branching: false,
        };
        let (mut cpu, mut memory) = boot(&BRANCH_PROGRAM, config);
        cpu.step(&mut memory).unwrap();
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().pc(), TEXT_BASE + 16);
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().gpr(Register::T1), 0);
        assert_eq!(cpu.registers().gpr(Register::T3), 4);
    }

    #[test]
    fn test_link_value_depends_on_delay() {
        // jal 0x00400008
        let words = [0x0C10_0002, 0x0000_0000, 0x0000_0000];
        let (mut cpu, mut memory) = boot(&words, CpuConfig::default());
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().gpr(Register::Ra), TEXT_BASE + 8);

        let config = CpuConfig {
            delayed_branching: false,
        };
        let (mut cpu, mut memory) = boot(&words, config);
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().gpr(Register::Ra), TEXT_BASE + 4);
    }

    #[test]
    fn test_end_of_text_halts() {
        let (mut cpu, mut memory) = boot(&[0x2008_0001], CpuConfig::default());
        cpu.step(&mut memory).unwrap();
        let signal = cpu.step(&mut memory).unwrap_err();
        assert_eq!(signal.kind, SignalType::Halt);
        assert_eq!(cpu.exit_code(), Some(0));
        assert_eq!(cpu.step(&mut memory), Ok(StepOutcome::Halted(0)));
        assert_eq!(cpu.cycles(), 1);
    }

    #[test]
    fn test_signal_repeats_until_resumed() {
        // break / addi $t0, $zero, 7
        let (mut cpu, mut memory) = boot(&[0x0000_000D, 0x2008_0007], CpuConfig::default());
        let signal = cpu.step(&mut memory).unwrap_err();
        assert_eq!(signal.kind, SignalType::Breakpoint);
        assert_eq!(signal.pc, TEXT_BASE);
        assert_eq!(cpu.step(&mut memory), Err(signal));
        assert_eq!(cpu.registers().pc(), TEXT_BASE);

        cpu.resume().unwrap();
        assert_eq!(cpu.resume(), Err(RuntimeError::NotSuspended));
        cpu.step(&mut memory).unwrap();
        assert_eq!(cpu.registers().gpr(Register::T0), 7);
    }

    #[test]
    fn test_resume_honours_pending_branch() {
        // beq $zero, $zero, +2 / break / nop / addi $t0, $zero, 9
        let words = [0x1000_0002, 0x0000_000D, 0x0000_0000, 0x2008_0009];
        let (mut cpu, mut memory) = boot(&words, CpuConfig::default());
        cpu.step(&mut memory).unwrap();
        assert!(cpu.step(&mut memory).is_err());
        cpu.resume().unwrap();
        assert_eq!(cpu.registers().pc(), TEXT_BASE + 12);
    }

    #[test]
    fn test_invalid_word_raises_invalid_instruction() {
        let (mut cpu, mut memory) = boot(&[0xFC00_0000], CpuConfig::default());
        let signal = cpu.step(&mut memory).unwrap_err();
        assert_eq!(signal, Signal::new(SignalType::InvalidInstruction, 0xFC00_0000, TEXT_BASE));
    }

    #[test]
    fn test_misaligned_pc_raises_address_error() {
        // jr $t0 / nop, with $t0 misaligned
        let (mut cpu, mut memory) = boot(&[0x0100_0008, 0x0000_0000], CpuConfig::default());
        cpu.registers_mut().set_gpr(Register::T0, TEXT_BASE + 2);
        cpu.step(&mut memory).unwrap();
        cpu.step(&mut memory).unwrap();
        let signal = cpu.step(&mut memory).unwrap_err();
        assert_eq!(signal.kind, SignalType::AddressError);
        assert_eq!(signal.address, Some(TEXT_BASE + 2));
    }

    #[test]
    fn test_halt_stops_core() {
        let (mut cpu, mut memory) = boot(&[0x0000_000C], CpuConfig::default());
        assert!(cpu.step(&mut memory).is_err());
        cpu.halt(3);
        assert!(cpu.is_halted());
        assert_eq!(cpu.step(&mut memory), Ok(StepOutcome::Halted(3)));
    }
}
