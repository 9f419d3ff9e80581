//! # MIPS Disassembler
//!
//! Decode 32-bit MIPS I words into typed [`Instruction`](mips_spec::Instruction)
//! values and render program listings.
//!
//! ## Example
//!
//! ```rust
//! use mips_disassembler::{decode, disassemble, Disassembler};
//! use mips_spec::ProgramImage;
//!
//! // addi $t0, $zero, 15
//! let instr = decode(0x2008_000F).unwrap();
//! assert_eq!(instr.to_string(), "addi $t0, $zero, 15");
//!
//! // Pooled decoding for hot loops
//! let mut disassembler = Disassembler::new();
//! assert!(disassembler.decode(0x0000_000C).is_some());
//!
//! let image = ProgramImage::from_words(&[0x2008_000F]);
//! println!("{}", disassemble(&image).unwrap());
//! ```

pub mod decoder;
pub mod disassembler;
pub mod error;
pub mod formatter;

pub use decoder::{decode, matching_kinds, Disassembler, DECODE_TABLE};
pub use disassembler::disassemble;
pub use error::{DisassemblerError, Result};
pub use formatter::{format, format_at};
