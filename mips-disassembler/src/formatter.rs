//! Instruction formatting to MIPS assembly text

use mips_spec::{branch_destination, jump_destination, Instruction};

/// Format instruction as assembly text
///
/// Branch offsets are printed as raw word offsets and jump targets as the
/// byte address of the target field (`target << 2`).
pub fn format(instr: &Instruction) -> String {
    instr.to_string()
}

/// Format instruction located at `pc`, with control transfer targets resolved
/// to absolute addresses
pub fn format_at(instr: &Instruction, pc: u32) -> String {
    match *instr {
        Instruction::Beq { rs, rt, offset } | Instruction::Bne { rs, rt, offset } => format!(
            "{} {}, {}, {}",
            instr.mnemonic(),
            rs,
            rt,
            format_address(branch_destination(pc, offset))
        ),
        Instruction::Bltz { rs, offset }
        | Instruction::Bgez { rs, offset }
        | Instruction::Blez { rs, offset }
        | Instruction::Bgtz { rs, offset } => format!(
            "{} {}, {}",
            instr.mnemonic(),
            rs,
            format_address(branch_destination(pc, offset))
        ),
        Instruction::Bc1f { cc, offset } | Instruction::Bc1t { cc, offset } => {
            let target = format_address(branch_destination(pc, offset));
            if cc == 0 {
                format!("{} {}", instr.mnemonic(), target)
            } else {
                format!("{} {}, {}", instr.mnemonic(), cc, target)
            }
        }
        Instruction::J { target } | Instruction::Jal { target } => format!(
            "{} {}",
            instr.mnemonic(),
            format_address(jump_destination(pc, target))
        ),
        _ => format(instr),
    }
}

fn format_address(address: u32) -> String {
    format!("0x{:08x}", address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mips_spec::Register;

    #[test]
    fn test_format_plain() {
        let instr = Instruction::Addi {
            rt: Register::T0,
            rs: Register::Zero,
            imm: 15,
        };
        assert_eq!(format(&instr), "addi $t0, $zero, 15");
    }

    #[test]
    fn test_format_branch_absolute() {
        let instr = Instruction::Beq {
            rs: Register::T0,
            rt: Register::Zero,
            offset: -2,
        };
        assert_eq!(format(&instr), "beq $t0, $zero, -2");
        assert_eq!(format_at(&instr, 0x0040_0008), "beq $t0, $zero, 0x00400004");
    }

    #[test]
    fn test_format_jump_region() {
        let instr = Instruction::Jal { target: 0x0010_0007 };
        assert_eq!(format_at(&instr, 0x0040_0000), "jal 0x0040001c");
    }

    #[test]
    fn test_format_non_control_unchanged() {
        let instr = Instruction::Lw {
            rt: Register::T0,
            base: Register::Sp,
            offset: 4,
        };
        assert_eq!(format_at(&instr, 0x0040_0000), format(&instr));
    }
}
