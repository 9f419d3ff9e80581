//! Assembler diagnostics
//!
//! Errors skip the offending line; warnings never block assembly.

use crate::lexer::Token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A message pinned to a source range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Absolute byte range in the source
    pub span: Range<usize>,
    /// 1-based line number
    pub line: usize,
    /// Source text of the offending token
    pub lexeme: String,
}

impl Diagnostic {
    pub fn error(
        message: impl Into<String>,
        span: Range<usize>,
        line: usize,
        lexeme: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
            line,
            lexeme: lexeme.into(),
        }
    }

    pub fn warning(
        message: impl Into<String>,
        span: Range<usize>,
        line: usize,
        lexeme: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message, span, line, lexeme)
        }
    }

    /// Error pointing at `token`
    pub fn error_at(token: &Token, message: impl Into<String>) -> Self {
        Self::error(message, token.span.clone(), token.line, token.lexeme.clone())
    }

    /// Warning pointing at `token`
    pub fn warning_at(token: &Token, message: impl Into<String>) -> Self {
        Self::warning(message, token.span.clone(), token.line, token.lexeme.clone())
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render with a caret line under the offending range of `source`
    pub fn render(&self, source: &str) -> String {
        let line_start = source[..self.span.start.min(source.len())]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        let line_end = source[line_start..]
            .find('\n')
            .map_or(source.len(), |i| line_start + i);
        let text = &source[line_start..line_end];
        let column = self.span.start.saturating_sub(line_start);
        let width = self.span.len().max(1);
        format!(
            "{}\n  {} | {}\n  {} | {}{}",
            self,
            self.line,
            text,
            " ".repeat(self.line.to_string().len()),
            " ".repeat(column),
            "^".repeat(width)
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity, self.message)
    }
}

/// Whether any diagnostic in `diagnostics` is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diag = Diagnostic::error("unknown directive `.foo`", 0..4, 3, ".foo");
        assert_eq!(diag.to_string(), "line 3: error: unknown directive `.foo`");

        let warn = Diagnostic::warning("no values", 0..5, 1, ".word");
        assert!(!warn.is_error());
        assert_eq!(warn.to_string(), "line 1: warning: no values");
    }

    #[test]
    fn test_render_caret() {
        let source = "nop\naddd $t0, $t1\n";
        let diag = Diagnostic::error("no instruction matches", 4..8, 2, "addd");
        let rendered = diag.render(source);
        assert!(rendered.contains("2 | addd $t0, $t1"));
        assert!(rendered.ends_with("  | ^^^^"));
    }

    #[test]
    fn test_has_errors() {
        let warn = Diagnostic::warning("w", 0..1, 1, "x");
        assert!(!has_errors(&[warn.clone()]));
        let err = Diagnostic::error("e", 0..1, 1, "x");
        assert!(has_errors(&[warn, err]));
    }
}
