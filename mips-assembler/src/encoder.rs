//! # Instruction Encoder
//!
//! Turns a parsed [`InstructionValue`] into a typed [`Instruction`]:
//!
//! 1. single-word pseudo instructions are rewritten to their real form,
//! 2. every leaf whose mnemonic pattern and operand syntax accept the line is
//!    collected; exactly one must remain,
//! 3. operands are range checked and labels resolved into branch offsets or
//!    jump targets,
//! 4. the leaf is populated through the shared codec field values.

use crate::diagnostic::Diagnostic;
use crate::lexer::Token;
use crate::parser::{InstructionValue, Operand, OperandValue};
use mips_spec::{
    Condition, Field, FieldValues, FloatFormat, Instruction, InstructionKind, Register,
};
use std::collections::HashMap;

/// One operand position of an instruction syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// General purpose register written to `Field`
    Gpr(Field),
    /// Floating point register written to `Field`
    Fpr(Field),
    /// Integer written to `Field`
    Imm(Field),
    /// `offset(base)` into `Imm` and `Rs`
    Memory,
    /// Label or raw word offset into `Imm`
    Branch,
    /// Label or byte address into `Target`
    Jump,
}

use Slot::*;

const NONE: &[Slot] = &[];
const RD_RS_RT: &[Slot] = &[Gpr(Field::Rd), Gpr(Field::Rs), Gpr(Field::Rt)];
const RD_RT_RS: &[Slot] = &[Gpr(Field::Rd), Gpr(Field::Rt), Gpr(Field::Rs)];
const RD_RT_SHAMT: &[Slot] = &[Gpr(Field::Rd), Gpr(Field::Rt), Imm(Field::Shamt)];
const RD_RS: &[Slot] = &[Gpr(Field::Rd), Gpr(Field::Rs)];
const RS: &[Slot] = &[Gpr(Field::Rs)];
const RD: &[Slot] = &[Gpr(Field::Rd)];
const RS_RT: &[Slot] = &[Gpr(Field::Rs), Gpr(Field::Rt)];
const RS_RT_CODE: &[Slot] = &[Gpr(Field::Rs), Gpr(Field::Rt), Imm(Field::Code)];
const RS_IMM: &[Slot] = &[Gpr(Field::Rs), Imm(Field::Imm)];
const CODE: &[Slot] = &[Imm(Field::Code)];
const RS_BRANCH: &[Slot] = &[Gpr(Field::Rs), Branch];
const RS_RT_BRANCH: &[Slot] = &[Gpr(Field::Rs), Gpr(Field::Rt), Branch];
const JUMP: &[Slot] = &[Jump];
const RT_RS_IMM: &[Slot] = &[Gpr(Field::Rt), Gpr(Field::Rs), Imm(Field::Imm)];
const RT_IMM: &[Slot] = &[Gpr(Field::Rt), Imm(Field::Imm)];
const RT_MEM: &[Slot] = &[Gpr(Field::Rt), Memory];
const FT_MEM: &[Slot] = &[Fpr(Field::Ft), Memory];
const RT_FS: &[Slot] = &[Gpr(Field::Rt), Fpr(Field::Fs)];
const BRANCH: &[Slot] = &[Branch];
const CC_BRANCH: &[Slot] = &[Imm(Field::Cc), Branch];
const FD_FS_FT: &[Slot] = &[Fpr(Field::Fd), Fpr(Field::Fs), Fpr(Field::Ft)];
const FD_FS: &[Slot] = &[Fpr(Field::Fd), Fpr(Field::Fs)];
const FS_FT: &[Slot] = &[Fpr(Field::Fs), Fpr(Field::Ft)];
const CC_FS_FT: &[Slot] = &[Imm(Field::Cc), Fpr(Field::Fs), Fpr(Field::Ft)];

/// Accepted operand syntaxes of a leaf
fn syntaxes(kind: InstructionKind) -> &'static [&'static [Slot]] {
    use InstructionKind as K;
    match kind {
        K::Nop => &[NONE],
        K::Sll | K::Srl | K::Sra => &[RD_RT_SHAMT],
        K::Sllv | K::Srlv | K::Srav => &[RD_RT_RS],
        K::Jr | K::Mthi | K::Mtlo => &[RS],
        // `jalr $rs` links through $ra
        K::Jalr => &[RD_RS, RS],
        K::Syscall | K::Break => &[NONE, CODE],
        K::Teq => &[RS_RT, RS_RT_CODE],
        K::Teqi => &[RS_IMM],
        K::Mfhi | K::Mflo => &[RD],
        K::Mult | K::Multu | K::Div | K::Divu => &[RS_RT],
        K::Add
        | K::Addu
        | K::Sub
        | K::Subu
        | K::And
        | K::Or
        | K::Xor
        | K::Nor
        | K::Slt
        | K::Sltu => &[RD_RS_RT],
        K::Bltz | K::Bgez | K::Blez | K::Bgtz => &[RS_BRANCH],
        K::Beq | K::Bne => &[RS_RT_BRANCH],
        K::J | K::Jal => &[JUMP],
        K::Addi | K::Addiu | K::Slti | K::Sltiu | K::Andi | K::Ori | K::Xori => &[RT_RS_IMM],
        K::Lui => &[RT_IMM],
        K::Lb | K::Lh | K::Lw | K::Lbu | K::Lhu | K::Sb | K::Sh | K::Sw => &[RT_MEM],
        K::Lwc1 | K::Swc1 => &[FT_MEM],
        K::Mfc1 | K::Mtc1 => &[RT_FS],
        K::Bc1f | K::Bc1t => &[BRANCH, CC_BRANCH],
        K::FAdd | K::FSub | K::FMul | K::FDiv => &[FD_FS_FT],
        K::FSqrt | K::FAbs | K::FMov | K::FNeg | K::CvtS | K::CvtD | K::CvtW => &[FD_FS],
        K::FCompare => &[FS_FT, CC_FS_FT],
    }
}

fn slot_accepts(slot: Slot, value: &OperandValue) -> bool {
    matches!(
        (slot, value),
        (Gpr(_), OperandValue::Register(_))
            | (Fpr(_), OperandValue::FpuRegister(_))
            | (Imm(_), OperandValue::Immediate(_))
            | (Memory, OperandValue::Memory { .. })
            | (Branch | Jump, OperandValue::Immediate(_) | OperandValue::Label(_))
    )
}

fn syntax_accepts(syntax: &[Slot], operands: &[Operand]) -> bool {
    syntax.len() == operands.len()
        && syntax
            .iter()
            .zip(operands)
            .all(|(slot, operand)| slot_accepts(*slot, &operand.value))
}

/// Format and condition parsed out of a floating point mnemonic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Modifiers {
    fmt: Option<FloatFormat>,
    cond: Option<Condition>,
}

/// Match `text` against a leaf mnemonic such as `add.fmt` or `c.cond.fmt`
fn match_mnemonic(pattern: &str, text: &str) -> Option<Modifiers> {
    let mut modifiers = Modifiers::default();
    let mut pattern_parts = pattern.split('.');
    let mut text_parts = text.split('.');
    loop {
        match (pattern_parts.next(), text_parts.next()) {
            (None, None) => return Some(modifiers),
            (Some("fmt"), Some(part)) => modifiers.fmt = Some(FloatFormat::from_suffix(part)?),
            (Some("cond"), Some(part)) => modifiers.cond = Some(Condition::from_name(part)?),
            (Some(expected), Some(part)) if expected == part => {}
            _ => return None,
        }
    }
}

/// Rewrite a single-word pseudo instruction into its real form
fn expand_pseudo(
    mnemonic: &str,
    operands: &[Operand],
    at: &Token,
) -> Result<Option<(&'static str, Vec<Operand>)>, Diagnostic> {
    let zero = Operand {
        value: OperandValue::Register(Register::Zero),
        token: at.clone(),
    };
    let (real, arity) = match mnemonic {
        "move" => ("addu", 2),
        "b" => ("beq", 1),
        "beqz" => ("beq", 2),
        "bnez" => ("bne", 2),
        "not" => ("nor", 2),
        "neg" => ("sub", 2),
        "negu" => ("subu", 2),
        _ => return Ok(None),
    };
    if operands.len() != arity {
        return Err(Diagnostic::error_at(
            at,
            format!("`{}` expects {} operand(s), found {}", mnemonic, arity, operands.len()),
        ));
    }
    let ops = operands;
    let rewritten = match mnemonic {
        // move rd, rs  ->  addu rd, rs, $zero
        "move" | "not" => vec![ops[0].clone(), ops[1].clone(), zero],
        // b label  ->  beq $zero, $zero, label
        "b" => vec![zero.clone(), zero, ops[0].clone()],
        // beqz rs, label  ->  beq rs, $zero, label
        "beqz" | "bnez" => vec![ops[0].clone(), zero, ops[1].clone()],
        // neg rd, rs  ->  sub rd, $zero, rs
        _ => vec![ops[0].clone(), zero, ops[1].clone()],
    };
    Ok(Some((real, rewritten)))
}

/// Resolve and encode one instruction line
pub fn encode(
    line: &InstructionValue,
    labels: &HashMap<String, u32>,
) -> Result<Instruction, Diagnostic> {
    let text = line.mnemonic.lexeme.to_ascii_lowercase();
    let expanded = expand_pseudo(&text, &line.operands, &line.mnemonic)?;
    let (mnemonic, operands) = match &expanded {
        Some((real, operands)) => (*real, operands.as_slice()),
        None => (text.as_str(), line.operands.as_slice()),
    };

    let mut known_mnemonic = false;
    let mut candidates = Vec::new();
    for &kind in InstructionKind::ALL {
        let Some(modifiers) = match_mnemonic(kind.mnemonic(), mnemonic) else {
            continue;
        };
        known_mnemonic = true;
        for syntax in syntaxes(kind) {
            if syntax_accepts(syntax, operands) {
                candidates.push((kind, *syntax, modifiers));
            }
        }
    }

    let (kind, syntax, modifiers) = match candidates.as_slice() {
        [single] => *single,
        [] if known_mnemonic => {
            return Err(Diagnostic::error_at(
                &line.mnemonic,
                format!("invalid operands for `{}`", text),
            ))
        }
        [] => {
            return Err(Diagnostic::error_at(
                &line.mnemonic,
                format!("unknown instruction `{}`", text),
            ))
        }
        _ => {
            return Err(Diagnostic::error_at(
                &line.mnemonic,
                format!("ambiguous instruction `{}`", text),
            ))
        }
    };

    let mut values = FieldValues::new();
    if kind == InstructionKind::Jalr {
        values.set(Field::Rd, Register::Ra.index() as i64);
    }
    if let Some(fmt) = modifiers.fmt {
        values.set(Field::Fmt, fmt.code() as i64);
    }
    if let Some(cond) = modifiers.cond {
        values.set(Field::Cond, cond.code() as i64);
    }

    for (slot, operand) in syntax.iter().zip(operands) {
        fill(kind, *slot, operand, line.address, labels, &mut values)?;
    }

    let instruction = Instruction::from_fields(kind, &values).ok_or_else(|| {
        Diagnostic::error_at(&line.mnemonic, format!("invalid operands for `{}`", text))
    })?;

    let word = instruction.encode();
    if !kind.layout().matches(word) {
        // `sll $zero, $zero, 0` is the canonical nop word
        if kind == InstructionKind::Sll && word == 0 {
            return Ok(Instruction::Nop);
        }
        return Err(Diagnostic::error_at(
            &line.mnemonic,
            format!("`{}` is not a valid form of `{}`", text, kind.mnemonic()),
        ));
    }
    Ok(instruction)
}

fn check_range(
    kind: InstructionKind,
    field: Field,
    value: i64,
    token: &Token,
) -> Result<i64, Diagnostic> {
    let fits = kind
        .layout()
        .field(field)
        .map_or(false, |info| info.fits(value));
    if fits {
        Ok(value)
    } else {
        Err(Diagnostic::error_at(
            token,
            format!("value {} is out of range for {:?}", value, field),
        ))
    }
}

fn resolve(label: &str, labels: &HashMap<String, u32>, token: &Token) -> Result<u32, Diagnostic> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| Diagnostic::error_at(token, format!("undefined label `{}`", label)))
}

fn fill(
    kind: InstructionKind,
    slot: Slot,
    operand: &Operand,
    pc: u32,
    labels: &HashMap<String, u32>,
    values: &mut FieldValues,
) -> Result<(), Diagnostic> {
    let token = &operand.token;
    match (slot, &operand.value) {
        (Gpr(field), OperandValue::Register(reg)) => values.set(field, reg.index() as i64),
        (Fpr(field), OperandValue::FpuRegister(reg)) => values.set(field, reg.index() as i64),
        (Imm(field), OperandValue::Immediate(value)) => {
            values.set(field, check_range(kind, field, *value, token)?)
        }
        (Memory, OperandValue::Memory { offset, base }) => {
            values.set(Field::Imm, check_range(kind, Field::Imm, *offset, token)?);
            values.set(Field::Rs, base.index() as i64);
        }
        (Branch, OperandValue::Immediate(offset)) => {
            values.set(Field::Imm, check_range(kind, Field::Imm, *offset, token)?)
        }
        (Branch, OperandValue::Label(label)) => {
            let target = resolve(label, labels, token)?;
            let delta = target as i64 - (pc as i64 + 4);
            if delta % 4 != 0 {
                return Err(Diagnostic::error_at(
                    token,
                    format!("branch target `{}` is not word aligned", label),
                ));
            }
            let offset = check_range(kind, Field::Imm, delta >> 2, token)?;
            values.set(Field::Imm, offset);
        }
        (Jump, OperandValue::Immediate(address)) => {
            let address = u32::try_from(*address).map_err(|_| {
                Diagnostic::error_at(token, format!("jump address {} is out of range", address))
            })?;
            values.set(Field::Target, jump_target(address, pc, token)?);
        }
        (Jump, OperandValue::Label(label)) => {
            let address = resolve(label, labels, token)?;
            values.set(Field::Target, jump_target(address, pc, token)?);
        }
        // Syntax matching guarantees the operand shape
        _ => {
            return Err(Diagnostic::error_at(token, "unexpected operand"));
        }
    }
    Ok(())
}

/// `(address & 0x3FFFFFF) >> 2`, checked against the region of the delay slot
fn jump_target(address: u32, pc: u32, token: &Token) -> Result<i64, Diagnostic> {
    if address % 4 != 0 {
        return Err(Diagnostic::error_at(
            token,
            format!("jump target {:#010x} is not word aligned", address),
        ));
    }
    if address & 0xF000_0000 != pc.wrapping_add(4) & 0xF000_0000 {
        return Err(Diagnostic::error_at(
            token,
            format!("jump target {:#010x} is outside the current 256 MB region", address),
        ));
    }
    Ok(((address & 0x03FF_FFFF) >> 2) as i64)
}
