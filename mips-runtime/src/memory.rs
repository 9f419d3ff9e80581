//! Memory subsystem
//!
//! The core only sees the [`Memory`] capability. [`SparseMemory`] stores
//! non-zero words in a map; everything else reads as zero.

use crate::error::{Result, RuntimeError};
use mips_spec::ProgramImage;
use std::collections::HashMap;

/// Byte-addressable little-endian memory
pub trait Memory {
    fn read_byte(&self, address: u32) -> Result<u8>;

    /// Read an aligned word
    fn read_word(&self, address: u32) -> Result<u32>;

    fn write_byte(&mut self, address: u32, value: u8) -> Result<()>;

    /// Write an aligned word
    fn write_word(&mut self, address: u32, value: u32) -> Result<()>;

    /// Read an aligned half word
    fn read_half(&self, address: u32) -> Result<u16> {
        check_alignment(address, 2)?;
        let low = self.read_byte(address)?;
        let high = self.read_byte(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Write an aligned half word
    fn write_half(&mut self, address: u32, value: u16) -> Result<()> {
        check_alignment(address, 2)?;
        let [low, high] = value.to_le_bytes();
        self.write_byte(address, low)?;
        self.write_byte(address.wrapping_add(1), high)
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        for (offset, byte) in bytes.iter().enumerate() {
            self.write_byte(address.wrapping_add(offset as u32), *byte)?;
        }
        Ok(())
    }
}

#[inline]
fn check_alignment(address: u32, alignment: u32) -> Result<()> {
    if address % alignment != 0 {
        return Err(RuntimeError::MisalignedAccess { address, alignment });
    }
    Ok(())
}

/// Copy the text and data segments of `image` into `memory`
pub fn load_image<M: Memory + ?Sized>(memory: &mut M, image: &ProgramImage) -> Result<()> {
    image.validate()?;
    memory.write_bytes(image.text_base, &image.text)?;
    memory.write_bytes(image.data_base, &image.data)?;
    Ok(())
}

/// Zero-filled memory backed by a word map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMemory {
    words: HashMap<u32, u32>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-zero words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn word(&self, aligned: u32) -> u32 {
        self.words.get(&aligned).copied().unwrap_or(0)
    }

    fn store(&mut self, aligned: u32, value: u32) {
        if value == 0 {
            self.words.remove(&aligned);
        } else {
            self.words.insert(aligned, value);
        }
    }
}

impl Memory for SparseMemory {
    fn read_byte(&self, address: u32) -> Result<u8> {
        let shift = (address & 3) * 8;
        Ok((self.word(address & !3) >> shift) as u8)
    }

    fn read_word(&self, address: u32) -> Result<u32> {
        check_alignment(address, 4)?;
        Ok(self.word(address))
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<()> {
        let aligned = address & !3;
        let shift = (address & 3) * 8;
        let mask = !(0xFFu32 << shift);
        let word = (self.word(aligned) & mask) | ((value as u32) << shift);
        self.store(aligned, word);
        Ok(())
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<()> {
        check_alignment(address, 4)?;
        self.store(address, value);
        Ok(())
    }
}
