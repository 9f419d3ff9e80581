//! Table-driven instruction decoder
//!
//! Every leaf contributes a `(mask, value)` pair computed at compile time from
//! its layout. A word is tested against the leaves sharing its primary opcode,
//! in [`InstructionKind::ALL`] order; the first leaf whose full constraint set
//! holds wins. The layouts are mutually exclusive, so order only matters for
//! speed.

use crate::error::{DisassemblerError, Result};
use mips_spec::{Instruction, InstructionKind};

/// Number of distinct primary opcodes
const OPCODE_SPACE: usize = 64;

/// Fixed `(mask, value)` of every leaf, indexed by [`InstructionKind::index`]
pub const DECODE_TABLE: [(u32, u32); InstructionKind::COUNT] = decode_table();

const fn decode_table() -> [(u32, u32); InstructionKind::COUNT] {
    let mut table = [(0u32, 0u32); InstructionKind::COUNT];
    let mut i = 0;
    while i < InstructionKind::COUNT {
        let layout = InstructionKind::ALL[i].layout();
        table[i] = (layout.fixed_mask(), layout.fixed_value());
        i += 1;
    }
    table
}

#[inline]
fn opcode(word: u32) -> usize {
    (word >> 26) as usize
}

/// Whether `word` satisfies every constraint of `kind`
#[inline]
fn accepts(kind: InstructionKind, word: u32) -> bool {
    let (mask, value) = DECODE_TABLE[kind.index()];
    word & mask == value && (!kind.layout().has_restrictions() || kind.layout().matches(word))
}

/// Decoder registry: opcode buckets plus one pooled instruction slot per leaf
///
/// The slot of a leaf is overwritten by every successful decode of that leaf,
/// so a returned reference is only valid until the next call.
#[derive(Debug, Clone)]
pub struct Disassembler {
    buckets: Vec<Vec<InstructionKind>>,
    pool: Vec<Option<Instruction>>,
}

impl Disassembler {
    pub fn new() -> Self {
        let mut buckets = vec![Vec::new(); OPCODE_SPACE];
        for &kind in InstructionKind::ALL {
            // Every layout pins the opcode bits, so each leaf has one bucket.
            let (_, value) = DECODE_TABLE[kind.index()];
            buckets[opcode(value)].push(kind);
        }
        Self {
            buckets,
            pool: vec![None; InstructionKind::COUNT],
        }
    }

    /// Leaves that can match a word with primary opcode `opcode`
    pub fn candidates(&self, opcode: u8) -> &[InstructionKind] {
        self.buckets
            .get(opcode as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Decode `word`, or `None` if no leaf accepts it
    pub fn decode(&mut self, word: u32) -> Option<&Instruction> {
        let kind = self.buckets[opcode(word)]
            .iter()
            .copied()
            .find(|&kind| accepts(kind, word))?;
        let slot = &mut self.pool[kind.index()];
        *slot = Instruction::decode_as(kind, word);
        slot.as_ref()
    }

    /// Every leaf whose constraint set accepts `word`
    ///
    /// For a well-formed table this is never more than one leaf.
    pub fn matching_kinds(&self, word: u32) -> Vec<InstructionKind> {
        matching_kinds(word)
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a single 32-bit instruction word
pub fn decode(word: u32) -> Result<Instruction> {
    let mut candidates = InstructionKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.opcode() as usize == opcode(word))
        .peekable();
    if candidates.peek().is_none() {
        return Err(DisassemblerError::UnknownOpcode(opcode(word) as u8));
    }
    candidates
        .find(|&kind| accepts(kind, word))
        .and_then(|kind| Instruction::decode_as(kind, word))
        .ok_or(DisassemblerError::InvalidEncoding(word))
}

/// Every leaf whose constraint set accepts `word`
pub fn matching_kinds(word: u32) -> Vec<InstructionKind> {
    InstructionKind::ALL
        .iter()
        .copied()
        .filter(|&kind| accepts(kind, word))
        .collect()
}
