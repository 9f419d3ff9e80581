//! Assembler driver
//!
//! Tokenize, parse, encode and lay out the segments of one translation unit.

use crate::diagnostic::{has_errors, Diagnostic};
use crate::encoder::encode;
use crate::error::{AssemblerError, Result};
use crate::lexer::tokenize;
use crate::parser::{DataItem, Parser, Program};
use mips_spec::{Instruction, ProgramImage, DATA_BASE, TEXT_BASE, WORD_BYTES};

/// Assembler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Initial `.text` cursor
    pub text_base: u32,
    /// Initial `.data` cursor
    pub data_base: u32,
    /// Label used as the entry point when defined
    pub entry_label: String,
    /// Promote warnings to errors in [`Assembler::assemble`]
    pub warnings_as_errors: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            text_base: TEXT_BASE,
            data_base: DATA_BASE,
            entry_label: "main".to_string(),
            warnings_as_errors: false,
        }
    }
}

/// Best-effort result of one assembler run
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub image: ProgramImage,
    pub program: Program,
    /// Every diagnostic, in pass order
    pub diagnostics: Vec<Diagnostic>,
    /// Successfully encoded instructions with their addresses
    pub instructions: Vec<(u32, Instruction)>,
}

impl Assembly {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Assemble `source`, keeping going past failed lines
    pub fn run(&self, source: &str) -> Assembly {
        let (tokens, mut diagnostics) = tokenize(source);
        tracing::debug!(tokens = tokens.len(), errors = diagnostics.len(), "tokenized");

        let (program, parse_diagnostics) =
            Parser::new(self.config.text_base, self.config.data_base).parse(&tokens);
        diagnostics.extend(parse_diagnostics);
        tracing::debug!(
            labels = program.labels.len(),
            instructions = program.instructions.len(),
            data_values = program.data_values.len(),
            "parsed"
        );

        let mut instructions = Vec::with_capacity(program.instructions.len());
        for line in &program.instructions {
            match encode(line, &program.labels) {
                Ok(instruction) => instructions.push((line.address, instruction)),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let text = self.layout_text(&program, &instructions);
        let data = self.layout_data(&program, &mut diagnostics);
        let entry = program
            .label(&self.config.entry_label)
            .unwrap_or(self.config.text_base);

        let image = ProgramImage {
            text,
            data,
            text_base: self.config.text_base,
            data_base: self.config.data_base,
            entry,
        };
        tracing::debug!(
            text_bytes = image.text.len(),
            data_bytes = image.data.len(),
            entry = format_args!("{:#010x}", entry),
            diagnostics = diagnostics.len(),
            "assembled"
        );

        Assembly {
            image,
            program,
            diagnostics,
            instructions,
        }
    }

    /// Assemble `source` into an image, failing on any error diagnostic
    pub fn assemble(&self, source: &str) -> Result<ProgramImage> {
        let assembly = self.run(source);
        let failed = assembly.has_errors()
            || (self.config.warnings_as_errors && assembly.warnings().next().is_some());
        if failed {
            return Err(AssemblerError::Failed(assembly.diagnostics));
        }
        assembly.image.validate()?;
        Ok(assembly.image)
    }

    /// Text bytes at their offsets from the text base; gaps are zero (`nop`)
    fn layout_text(&self, program: &Program, instructions: &[(u32, Instruction)]) -> Vec<u8> {
        let base = self.config.text_base;
        let end = program
            .instructions
            .iter()
            .filter_map(|line| offset(line.address, base))
            .map(|offset| offset + WORD_BYTES as usize)
            .max()
            .unwrap_or(0);
        let mut text = vec![0u8; end];
        for (address, instruction) in instructions {
            if let Some(offset) = offset(*address, base) {
                text[offset..offset + 4].copy_from_slice(&instruction.encode().to_le_bytes());
            }
        }
        text
    }

    /// Data bytes at their offsets from the data base, label words resolved
    fn layout_data(&self, program: &Program, diagnostics: &mut Vec<Diagnostic>) -> Vec<u8> {
        let base = self.config.data_base;
        let end = program
            .data_values
            .iter()
            .filter_map(|value| offset(value.address, base).map(|offset| offset + value.len()))
            .max()
            .unwrap_or(0);
        let mut data = vec![0u8; end];

        for value in &program.data_values {
            let Some(offset) = offset(value.address, base) else {
                continue;
            };
            match &value.item {
                DataItem::Bytes(bytes) => {
                    data[offset..offset + bytes.len()].copy_from_slice(bytes);
                }
                DataItem::LabelWord(token) => match program.label(&token.lexeme) {
                    Some(address) => {
                        data[offset..offset + 4].copy_from_slice(&address.to_le_bytes());
                    }
                    None => diagnostics.push(Diagnostic::error_at(
                        token,
                        format!("undefined label `{}`", token.lexeme),
                    )),
                },
            }
        }
        data
    }
}

/// Byte offset of `address` in a segment starting at `base`
///
/// The parser keeps every address inside its segment bounds, so offsets stay
/// below `MAX_SEGMENT_BYTES`.
fn offset(address: u32, base: u32) -> Option<usize> {
    address.checked_sub(base).map(|offset| offset as usize)
}

/// Assemble `source` with the default configuration
pub fn assemble(source: &str) -> Result<ProgramImage> {
    Assembler::default().assemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # Simple test
            addi $t0, $zero, 15
            syscall
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.word_count(), 2);
        assert_eq!(image.words().collect::<Vec<_>>(), vec![0x2008_000F, 0x0000_000C]);
        assert_eq!(image.entry, TEXT_BASE);
    }

    #[test]
    fn test_entry_is_main() {
        let image = assemble("helper: jr $ra\nmain: nop\n").unwrap();
        assert_eq!(image.entry, TEXT_BASE + 4);
    }

    #[test]
    fn test_data_label_words() {
        let source = ".data\nvalue: .word 7\nptr: .word value\n.text\nmain: lw $t0, 0($gp)\n";
        let image = assemble(source).unwrap();
        assert_eq!(image.data.len(), 8);
        assert_eq!(&image.data[0..4], &7u32.to_le_bytes());
        assert_eq!(&image.data[4..8], &DATA_BASE.to_le_bytes());
    }

    #[test]
    fn test_undefined_data_label() {
        let assembly = Assembler::default().run(".data\n.word missing\n");
        assert!(assembly.has_errors());
        assert!(assembly.errors().any(|d| d.message.contains("missing")));
    }

    #[test]
    fn test_run_is_best_effort() {
        let assembly = Assembler::default().run("nop\nbogus $t0\nsyscall\n");
        assert_eq!(assembly.errors().count(), 1);
        // The failed line keeps its slot
        assert_eq!(assembly.image.word_count(), 3);
        assert_eq!(assembly.image.word_at(TEXT_BASE + 8), Some(0x0000_000C));
        assert!(matches!(
            assemble("nop\nbogus $t0\n"),
            Err(AssemblerError::Failed(_))
        ));
    }

    #[test]
    fn test_warnings_as_errors() {
        let source = ".data\n.word\n";
        assert!(assemble(source).is_ok());

        let strict = Assembler::new(AssemblerConfig {
            warnings_as_errors: true,
            ..AssemblerConfig::default()
        });
        assert!(strict.assemble(source).is_err());
    }

    #[test]
    fn test_custom_bases() {
        let assembler = Assembler::new(AssemblerConfig {
            text_base: 0x0000_1000,
            ..AssemblerConfig::default()
        });
        let image = assembler.assemble("main: j main\n").unwrap();
        assert_eq!(image.text_base, 0x0000_1000);
        assert_eq!(image.words().next(), Some(0x0800_0400));
    }
}
