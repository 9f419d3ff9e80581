//! Five-stage pipeline skeleton
//!
//! Stages and latches only. Stage bodies produce nothing and hazards are not
//! handled, so [`Machine`](crate::Machine) refuses this architecture.

use crate::registers::RegisterCollection;
use mips_spec::Instruction;

/// Single-slot barrier between two stages
///
/// Writes land in `next` and become visible after [`Latch::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Latch<T> {
    current: Option<T>,
    next: Option<T>,
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self {
            current: None,
            next: None,
        }
    }
}

impl<T> Latch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, value: Option<T>) {
        self.next = value;
    }

    pub fn read(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn advance(&mut self) {
        self.current = self.next.take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    pub pc: u32,
    pub word: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    pub pc: u32,
    pub instruction: Instruction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Executed {
    pub pc: u32,
    pub instruction: Instruction,
    pub result: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accessed {
    pub pc: u32,
    pub instruction: Instruction,
    pub value: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PipelinedCpu {
    registers: RegisterCollection,
    fetch_decode: Latch<Fetched>,
    decode_execute: Latch<Decoded>,
    execute_memory: Latch<Executed>,
    memory_writeback: Latch<Accessed>,
    cycles: u64,
}

impl PipelinedCpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn fetch(&self) -> Option<Fetched> {
        None
    }

    fn decode(_input: &Fetched) -> Option<Decoded> {
        None
    }

    fn execute(_input: &Decoded) -> Option<Executed> {
        None
    }

    fn memory(_input: &Executed) -> Option<Accessed> {
        None
    }

    fn writeback(&mut self, _input: &Accessed) {}

    /// Run every stage once, then advance all latches together
    pub fn tick(&mut self) {
        if let Some(accessed) = self.memory_writeback.read().copied() {
            self.writeback(&accessed);
        }
        let accessed = self.execute_memory.read().and_then(Self::memory);
        let executed = self.decode_execute.read().and_then(Self::execute);
        let decoded = self.fetch_decode.read().and_then(Self::decode);
        let fetched = self.fetch();

        self.memory_writeback.write(accessed);
        self.execute_memory.write(executed);
        self.decode_execute.write(decoded);
        self.fetch_decode.write(fetched);

        self.memory_writeback.advance();
        self.execute_memory.advance();
        self.decode_execute.advance();
        self.fetch_decode.advance();
        self.cycles += 1;
    }

    /// True while no stage holds an instruction
    pub fn is_drained(&self) -> bool {
        self.fetch_decode.read().is_none()
            && self.decode_execute.read().is_none()
            && self.execute_memory.read().is_none()
            && self.memory_writeback.read().is_none()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn registers(&self) -> &RegisterCollection {
        &self.registers
    }
}
