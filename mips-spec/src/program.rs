//! # Program Image
//!
//! Flat output of the assembler and input of the simulator: the text and data
//! segments as little-endian bytes, their load addresses, and the entry point.
//! There is no container header.

use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default load address of the text segment
pub const TEXT_BASE: u32 = 0x0040_0000;

/// Default load address of the data segment
pub const DATA_BASE: u32 = 0x1001_0000;

/// Start of the heap handed out by `sbrk`-style allocation
pub const HEAP_BASE: u32 = 0x1004_0000;

/// Initial `$gp`
pub const GLOBAL_POINTER: u32 = 0x1000_8000;

/// Initial `$sp`
pub const STACK_POINTER: u32 = 0x7FFF_EFFC;

/// Instruction word size in bytes
pub const WORD_BYTES: u32 = 4;

/// Largest text or data segment the assembler lays out
pub const MAX_SEGMENT_BYTES: u32 = 0x0100_0000;

/// Exclusive end address of a segment starting at `base`
///
/// The segment stops at `next`, the start of the following region, when that
/// lies above `base`, and never spans more than [`MAX_SEGMENT_BYTES`] or
/// past the end of the address space.
pub const fn segment_limit(base: u32, next: u32) -> u64 {
    let mut cap = base as u64 + MAX_SEGMENT_BYTES as u64;
    if cap > u32::MAX as u64 {
        cap = u32::MAX as u64;
    }
    if next > base && (next as u64) < cap {
        next as u64
    } else {
        cap
    }
}

/// Assembled program ready to be loaded into memory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Text segment (instruction words, little-endian)
    pub text: Vec<u8>,

    /// Data segment (initialized data)
    pub data: Vec<u8>,

    pub text_base: u32,
    pub data_base: u32,

    /// Address of the first instruction executed
    pub entry: u32,
}

impl ProgramImage {
    /// Create an empty image at the default segment addresses
    pub fn new() -> Self {
        Self {
            text: Vec::new(),
            data: Vec::new(),
            text_base: TEXT_BASE,
            data_base: DATA_BASE,
            entry: TEXT_BASE,
        }
    }

    /// Build an image whose text segment holds `words`
    pub fn from_words(words: &[u32]) -> Self {
        let mut image = Self::new();
        image.text = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        image
    }

    /// Number of instruction words in the text segment
    pub fn word_count(&self) -> usize {
        self.text.len() / WORD_BYTES as usize
    }

    /// Instruction words of the text segment, in address order
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.text
            .chunks_exact(WORD_BYTES as usize)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    /// Word at `address`, if it lies in the text segment
    pub fn word_at(&self, address: u32) -> Option<u32> {
        let offset = address.checked_sub(self.text_base)? as usize;
        if offset % WORD_BYTES as usize != 0 {
            return None;
        }
        let bytes = self.text.get(offset..offset + WORD_BYTES as usize)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// First address past the text segment
    pub fn text_end(&self) -> u32 {
        self.text_base.wrapping_add(self.text.len() as u32)
    }

    /// First address past the data segment
    pub fn data_end(&self) -> u32 {
        self.data_base.wrapping_add(self.data.len() as u32)
    }

    /// Check segment alignment and placement of the entry point
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.text.len() % WORD_BYTES as usize != 0 {
            return Err(SpecError::InvalidTextSize(self.text.len()));
        }
        if self.text_base % WORD_BYTES != 0 {
            return Err(SpecError::MisalignedSegment {
                segment: "text",
                base: self.text_base,
            });
        }
        if self.text_base.checked_add(self.text.len() as u32).is_none() {
            return Err(SpecError::SegmentOverflow {
                segment: "text",
                base: self.text_base,
                len: self.text.len(),
            });
        }
        if self.data_base.checked_add(self.data.len() as u32).is_none() {
            return Err(SpecError::SegmentOverflow {
                segment: "data",
                base: self.data_base,
                len: self.data.len(),
            });
        }
        let entry_in_text = self.entry >= self.text_base && self.entry < self.text_end();
        if self.entry % WORD_BYTES != 0 || (!self.text.is_empty() && !entry_in_text) {
            return Err(SpecError::InvalidEntry(self.entry));
        }
        Ok(())
    }
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MIPS Program Image")?;
        writeln!(f, "  Entry:       {:#010x}", self.entry)?;
        writeln!(
            f,
            "  Text:        {:#010x}..{:#010x} ({} words)",
            self.text_base,
            self.text_end(),
            self.word_count()
        )?;
        writeln!(
            f,
            "  Data:        {:#010x}..{:#010x} ({} bytes)",
            self.data_base,
            self.data_end(),
            self.data.len()
        )?;
        Ok(())
    }
}
