//! MIPS Assembler
//!
//! Assemble MIPS I assembly language (with the COP1 floating point subset)
//! into a [`ProgramImage`](mips_spec::ProgramImage).
//!
//! ## Example
//!
//! ```rust
//! use mips_assembler::{assemble, Assembler};
//!
//! let source = r#"
//!     .data
//! msg: .asciiz "hi"
//!     .text
//! main:
//!     addi $v0, $zero, 10
//!     syscall
//! "#;
//!
//! let image = assemble(source).unwrap();
//! assert_eq!(image.word_count(), 2);
//!
//! // Best-effort run with every diagnostic
//! let assembly = Assembler::default().run("nop\nfrob $t0\n");
//! assert_eq!(assembly.errors().count(), 1);
//! ```

pub mod assembler;
pub mod diagnostic;
pub mod encoder;
pub mod error;
pub mod lexer;
pub mod parser;

pub use assembler::{assemble, Assembler, AssemblerConfig, Assembly};
pub use diagnostic::{has_errors, Diagnostic, Severity};
pub use encoder::encode;
pub use error::{AssemblerError, Result};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{Parser, Program};
