//! Program listing

use crate::decoder::Disassembler;
use crate::error::Result;
use crate::formatter::format_at;
use mips_spec::ProgramImage;
use std::fmt::Write;

/// Disassemble a program image into an assembly listing
///
/// Text words are rendered as `address:  word  instruction`; undecodable
/// words are listed with an error comment. The data segment follows as raw
/// words.
pub fn disassemble(image: &ProgramImage) -> Result<String> {
    image.validate()?;

    let mut disassembler = Disassembler::new();
    let mut output = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(output, "# MIPS Disassembly");
    let _ = writeln!(output, "# Entry point: 0x{:08X}", image.entry);
    let _ = writeln!(
        output,
        "# Text size: {} bytes ({} instructions)",
        image.text.len(),
        image.word_count()
    );
    output.push('\n');

    output.push_str(".text\n");
    let mut addr = image.text_base;
    for word in image.words() {
        let _ = write!(output, "0x{:08X}:  {:08X}  ", addr, word);
        match disassembler.decode(word) {
            Some(instr) => output.push_str(&format_at(instr, addr)),
            None => {
                let _ = write!(output, "# ERROR: invalid instruction 0x{:08X}", word);
            }
        }
        if addr == image.entry {
            output.push_str("  # <entry>");
        }
        output.push('\n');
        addr = addr.wrapping_add(4);
    }

    if !image.data.is_empty() {
        output.push_str("\n.data\n");
        let mut addr = image.data_base;
        for chunk in image.data.chunks(4) {
            let mut bytes = [0u8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            let _ = writeln!(output, "0x{:08X}:  {:08X}", addr, u32::from_le_bytes(bytes));
            addr = addr.wrapping_add(4);
        }
    }

    Ok(output)
}
