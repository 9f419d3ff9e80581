//! Assembler errors

use crate::diagnostic::Diagnostic;
use mips_spec::SpecError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblerError {
    #[error("Assembly failed with {} error(s){}", count_errors(.0), first_error(.0))]
    Failed(Vec<Diagnostic>),

    #[error("Invalid program image: {0}")]
    InvalidImage(#[from] SpecError),
}

impl AssemblerError {
    /// Diagnostics carried by a failed run
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            AssemblerError::Failed(diagnostics) => diagnostics,
            AssemblerError::InvalidImage(_) => &[],
        }
    }
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn first_error(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .or_else(|| diagnostics.first())
        .map(|d| format!(", first: {}", d))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
