//! Instruction execution
//!
//! One exhaustive dispatch over [`Instruction`]. Effects are applied to the
//! register collection and memory; control transfers and signals are returned
//! to the CPU, which owns the delay protocol.

use crate::fpu;
use crate::memory::Memory;
use crate::registers::RegisterCollection;
use crate::signal::SignalType;
use mips_spec::{branch_destination, jump_destination, Instruction, Register};

/// Control flow requested by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fall through to the next instruction
    Next,
    /// Taken branch or jump to the address
    Jump(u32),
}

/// Signal raised while executing, before any architectural change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub kind: SignalType,
    /// Data address for address errors
    pub address: Option<u32>,
}

impl Fault {
    fn new(kind: SignalType) -> Self {
        Self {
            kind,
            address: None,
        }
    }

    fn address(address: u32) -> Self {
        Self {
            kind: SignalType::AddressError,
            address: Some(address),
        }
    }
}

impl From<SignalType> for Fault {
    fn from(kind: SignalType) -> Self {
        Fault::new(kind)
    }
}

/// State an instruction executes against
pub struct Context<'a, M: Memory + ?Sized> {
    pub regs: &'a mut RegisterCollection,
    pub memory: &'a mut M,
    /// Address of the executing instruction
    pub pc: u32,
    /// Value written by `jal`/`jalr`
    pub link: u32,
}

impl<M: Memory + ?Sized> Context<'_, M> {
    #[inline]
    fn reg(&self, reg: Register) -> u32 {
        self.regs.gpr(reg)
    }

    #[inline]
    fn signed(&self, reg: Register) -> i32 {
        self.regs.gpr(reg) as i32
    }

    #[inline]
    fn set(&mut self, reg: Register, value: u32) {
        self.regs.set_gpr(reg, value);
    }

    #[inline]
    fn address(&self, base: Register, offset: i16) -> u32 {
        self.reg(base).wrapping_add(offset as i32 as u32)
    }

    fn branch(&self, taken: bool, offset: i16) -> Flow {
        if taken {
            Flow::Jump(branch_destination(self.pc, offset))
        } else {
            Flow::Next
        }
    }

    fn load_word(&self, address: u32) -> Result<u32, Fault> {
        if address % 4 != 0 {
            return Err(Fault::address(address));
        }
        self.memory.read_word(address).map_err(|_| Fault::address(address))
    }

    fn load_half(&self, address: u32) -> Result<u16, Fault> {
        if address % 2 != 0 {
            return Err(Fault::address(address));
        }
        self.memory.read_half(address).map_err(|_| Fault::address(address))
    }

    fn load_byte(&self, address: u32) -> Result<u8, Fault> {
        self.memory.read_byte(address).map_err(|_| Fault::address(address))
    }

    fn store_word(&mut self, address: u32, value: u32) -> Result<(), Fault> {
        if address % 4 != 0 {
            return Err(Fault::address(address));
        }
        self.memory
            .write_word(address, value)
            .map_err(|_| Fault::address(address))
    }

    fn store_half(&mut self, address: u32, value: u16) -> Result<(), Fault> {
        if address % 2 != 0 {
            return Err(Fault::address(address));
        }
        self.memory
            .write_half(address, value)
            .map_err(|_| Fault::address(address))
    }

    fn store_byte(&mut self, address: u32, value: u8) -> Result<(), Fault> {
        self.memory
            .write_byte(address, value)
            .map_err(|_| Fault::address(address))
    }
}

/// Execute a single instruction
pub fn execute<M: Memory + ?Sized>(instr: &Instruction, cx: &mut Context<'_, M>) -> Result<Flow, Fault> {
    match *instr {
        Instruction::Nop => {}

        // ========== R-type ==========

        // Shifts
        // shamt is a 5-bit field
        Instruction::Sll { rd, rt, shamt } => cx.set(rd, cx.reg(rt) << (shamt & 31)),
        Instruction::Srl { rd, rt, shamt } => cx.set(rd, cx.reg(rt) >> (shamt & 31)),
        Instruction::Sra { rd, rt, shamt } => {
            cx.set(rd, (cx.signed(rt) >> (shamt & 31)) as u32)
        }
        Instruction::Sllv { rd, rt, rs } => cx.set(rd, cx.reg(rt) << (cx.reg(rs) & 31)),
        Instruction::Srlv { rd, rt, rs } => cx.set(rd, cx.reg(rt) >> (cx.reg(rs) & 31)),
        Instruction::Srav { rd, rt, rs } => {
            cx.set(rd, (cx.signed(rt) >> (cx.reg(rs) & 31)) as u32)
        }

        // Register jumps
        Instruction::Jr { rs } => return Ok(Flow::Jump(cx.reg(rs))),
        Instruction::Jalr { rd, rs } => {
            let target = cx.reg(rs);
            cx.set(rd, cx.link);
            return Ok(Flow::Jump(target));
        }

        // Requests for the operating system layer
        Instruction::Syscall { .. } => return Err(Fault::new(SignalType::SystemCall)),
        Instruction::Break { .. } => return Err(Fault::new(SignalType::Breakpoint)),
        Instruction::Teq { rs, rt, .. } => {
            if cx.reg(rs) == cx.reg(rt) {
                return Err(Fault::new(SignalType::Trap));
            }
        }

        // HI/LO
        Instruction::Mfhi { rd } => cx.set(rd, cx.regs.hi()),
        Instruction::Mthi { rs } => cx.regs.set_hi(cx.reg(rs)),
        Instruction::Mflo { rd } => cx.set(rd, cx.regs.lo()),
        Instruction::Mtlo { rs } => cx.regs.set_lo(cx.reg(rs)),
        Instruction::Mult { rs, rt } => {
            let product = cx.signed(rs) as i64 * cx.signed(rt) as i64;
            cx.regs.set_hi((product >> 32) as u32);
            cx.regs.set_lo(product as u32);
        }
        Instruction::Multu { rs, rt } => {
            let product = cx.reg(rs) as u64 * cx.reg(rt) as u64;
            cx.regs.set_hi((product >> 32) as u32);
            cx.regs.set_lo(product as u32);
        }
        // Division by zero leaves HI/LO untouched
        Instruction::Div { rs, rt } => {
            let (a, b) = (cx.signed(rs), cx.signed(rt));
            if b != 0 {
                cx.regs.set_hi(a.wrapping_rem(b) as u32);
                cx.regs.set_lo(a.wrapping_div(b) as u32);
            }
        }
        Instruction::Divu { rs, rt } => {
            let (a, b) = (cx.reg(rs), cx.reg(rt));
            if b != 0 {
                cx.regs.set_hi(a % b);
                cx.regs.set_lo(a / b);
            }
        }

        // Arithmetic
        Instruction::Add { rd, rs, rt } => {
            let sum = cx
                .signed(rs)
                .checked_add(cx.signed(rt))
                .ok_or(Fault::new(SignalType::IntegerOverflow))?;
            cx.set(rd, sum as u32);
        }
        Instruction::Addu { rd, rs, rt } => cx.set(rd, cx.reg(rs).wrapping_add(cx.reg(rt))),
        Instruction::Sub { rd, rs, rt } => {
            let difference = cx
                .signed(rs)
                .checked_sub(cx.signed(rt))
                .ok_or(Fault::new(SignalType::IntegerOverflow))?;
            cx.set(rd, difference as u32);
        }
        Instruction::Subu { rd, rs, rt } => cx.set(rd, cx.reg(rs).wrapping_sub(cx.reg(rt))),

        // Logic
        Instruction::And { rd, rs, rt } => cx.set(rd, cx.reg(rs) & cx.reg(rt)),
        Instruction::Or { rd, rs, rt } => cx.set(rd, cx.reg(rs) | cx.reg(rt)),
        Instruction::Xor { rd, rs, rt } => cx.set(rd, cx.reg(rs) ^ cx.reg(rt)),
        Instruction::Nor { rd, rs, rt } => cx.set(rd, !(cx.reg(rs) | cx.reg(rt))),

        // Comparison
        Instruction::Slt { rd, rs, rt } => cx.set(rd, (cx.signed(rs) < cx.signed(rt)) as u32),
        Instruction::Sltu { rd, rs, rt } => cx.set(rd, (cx.reg(rs) < cx.reg(rt)) as u32),

        // ========== I-type ==========

        // Branches
        Instruction::Bltz { rs, offset } => return Ok(cx.branch(cx.signed(rs) < 0, offset)),
        Instruction::Bgez { rs, offset } => return Ok(cx.branch(cx.signed(rs) >= 0, offset)),
        Instruction::Blez { rs, offset } => return Ok(cx.branch(cx.signed(rs) <= 0, offset)),
        Instruction::Bgtz { rs, offset } => return Ok(cx.branch(cx.signed(rs) > 0, offset)),
        Instruction::Beq { rs, rt, offset } => {
            return Ok(cx.branch(cx.reg(rs) == cx.reg(rt), offset))
        }
        Instruction::Bne { rs, rt, offset } => {
            return Ok(cx.branch(cx.reg(rs) != cx.reg(rt), offset))
        }

        Instruction::Teqi { rs, imm } => {
            if cx.signed(rs) == imm as i32 {
                return Err(Fault::new(SignalType::Trap));
            }
        }

        // Immediate arithmetic
        Instruction::Addi { rt, rs, imm } => {
            let sum = cx
                .signed(rs)
                .checked_add(imm as i32)
                .ok_or(Fault::new(SignalType::IntegerOverflow))?;
            cx.set(rt, sum as u32);
        }
        Instruction::Addiu { rt, rs, imm } => cx.set(rt, cx.reg(rs).wrapping_add(imm as i32 as u32)),
        Instruction::Slti { rt, rs, imm } => cx.set(rt, (cx.signed(rs) < imm as i32) as u32),
        Instruction::Sltiu { rt, rs, imm } => cx.set(rt, (cx.reg(rs) < imm as i32 as u32) as u32),

        // Immediate logic (zero-extended)
        Instruction::Andi { rt, rs, imm } => cx.set(rt, cx.reg(rs) & imm as u32),
        Instruction::Ori { rt, rs, imm } => cx.set(rt, cx.reg(rs) | imm as u32),
        Instruction::Xori { rt, rs, imm } => cx.set(rt, cx.reg(rs) ^ imm as u32),
        Instruction::Lui { rt, imm } => cx.set(rt, (imm as u32) << 16),

        // Loads
        Instruction::Lb { rt, base, offset } => {
            let value = cx.load_byte(cx.address(base, offset))?;
            cx.set(rt, value as i8 as i32 as u32);
        }
        Instruction::Lbu { rt, base, offset } => {
            let value = cx.load_byte(cx.address(base, offset))?;
            cx.set(rt, value as u32);
        }
        Instruction::Lh { rt, base, offset } => {
            let value = cx.load_half(cx.address(base, offset))?;
            cx.set(rt, value as i16 as i32 as u32);
        }
        Instruction::Lhu { rt, base, offset } => {
            let value = cx.load_half(cx.address(base, offset))?;
            cx.set(rt, value as u32);
        }
        Instruction::Lw { rt, base, offset } => {
            let value = cx.load_word(cx.address(base, offset))?;
            cx.set(rt, value);
        }

        // Stores
        Instruction::Sb { rt, base, offset } => {
            cx.store_byte(cx.address(base, offset), cx.reg(rt) as u8)?
        }
        Instruction::Sh { rt, base, offset } => {
            cx.store_half(cx.address(base, offset), cx.reg(rt) as u16)?
        }
        Instruction::Sw { rt, base, offset } => cx.store_word(cx.address(base, offset), cx.reg(rt))?,

        // Coprocessor 1 transfers
        Instruction::Lwc1 { ft, base, offset } => {
            let value = cx.load_word(cx.address(base, offset))?;
            cx.regs.set_fpr(ft, value);
        }
        Instruction::Swc1 { ft, base, offset } => {
            cx.store_word(cx.address(base, offset), cx.regs.fpr(ft))?
        }
        Instruction::Mfc1 { rt, fs } => cx.set(rt, cx.regs.fpr(fs)),
        Instruction::Mtc1 { rt, fs } => cx.regs.set_fpr(fs, cx.reg(rt)),
        Instruction::Bc1f { cc, offset } => {
            return Ok(cx.branch(!cx.regs.condition_flag(cc), offset))
        }
        Instruction::Bc1t { cc, offset } => return Ok(cx.branch(cx.regs.condition_flag(cc), offset)),

        // ========== J-type ==========
        Instruction::J { target } => return Ok(Flow::Jump(jump_destination(cx.pc, target))),
        Instruction::Jal { target } => {
            cx.set(Register::Ra, cx.link);
            return Ok(Flow::Jump(jump_destination(cx.pc, target)));
        }

        // ========== F-type ==========
        Instruction::FAdd { fmt, fd, fs, ft } => {
            fpu::binary(cx.regs, fmt, fd, fs, ft, |a, b| a + b, |a, b| a + b)?
        }
        Instruction::FSub { fmt, fd, fs, ft } => {
            fpu::binary(cx.regs, fmt, fd, fs, ft, |a, b| a - b, |a, b| a - b)?
        }
        Instruction::FMul { fmt, fd, fs, ft } => {
            fpu::binary(cx.regs, fmt, fd, fs, ft, |a, b| a * b, |a, b| a * b)?
        }
        Instruction::FDiv { fmt, fd, fs, ft } => {
            fpu::binary(cx.regs, fmt, fd, fs, ft, |a, b| a / b, |a, b| a / b)?
        }
        Instruction::FSqrt { fmt, fd, fs } => fpu::unary(cx.regs, fmt, fd, fs, f32::sqrt, f64::sqrt)?,
        Instruction::FAbs { fmt, fd, fs } => fpu::unary(cx.regs, fmt, fd, fs, f32::abs, f64::abs)?,
        Instruction::FNeg { fmt, fd, fs } => fpu::unary(cx.regs, fmt, fd, fs, |a| -a, |a| -a)?,
        Instruction::FMov { fmt, fd, fs } => fpu::unary(cx.regs, fmt, fd, fs, |a| a, |a| a)?,
        Instruction::CvtS { fmt, fd, fs } => {
            fpu::convert(cx.regs, mips_spec::FloatFormat::Single, fmt, fd, fs)?
        }
        Instruction::CvtD { fmt, fd, fs } => {
            fpu::convert(cx.regs, mips_spec::FloatFormat::Double, fmt, fd, fs)?
        }
        Instruction::CvtW { fmt, fd, fs } => {
            fpu::convert(cx.regs, mips_spec::FloatFormat::Word, fmt, fd, fs)?
        }
        Instruction::FCompare {
            fmt,
            cond,
            cc,
            fs,
            ft,
        } => fpu::compare(cx.regs, fmt, cond, cc, fs, ft)?,
    }
    Ok(Flow::Next)
}
