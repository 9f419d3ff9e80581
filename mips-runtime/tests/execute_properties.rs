//! Property tests for integer execution semantics

use mips_runtime::execute::{execute, Context, Flow};
use mips_runtime::{RegisterCollection, SignalType, SparseMemory};
use mips_spec::{Instruction, Register};
use proptest::prelude::*;

const PC: u32 = 0x0040_0100;

fn run(instr: Instruction, t0: u32, t1: u32) -> (RegisterCollection, Result<Flow, SignalType>) {
    let mut regs = RegisterCollection::new();
    let mut memory = SparseMemory::new();
    regs.set_gpr(Register::T0, t0);
    regs.set_gpr(Register::T1, t1);
    regs.set_gpr(Register::T2, 0x5A5A_5A5A);
    let result = {
        let mut cx = Context {
            regs: &mut regs,
            memory: &mut memory,
            pc: PC,
            link: PC + 8,
        };
        execute(&instr, &mut cx).map_err(|fault| fault.kind)
    };
    (regs, result)
}

const ADD: Instruction = Instruction::Add {
    rd: Register::T2,
    rs: Register::T0,
    rt: Register::T1,
};

const SUB: Instruction = Instruction::Sub {
    rd: Register::T2,
    rs: Register::T0,
    rt: Register::T1,
};

proptest! {
    #[test]
    fn add_traps_exactly_on_signed_overflow(a in any::<i32>(), b in any::<i32>()) {
        let (regs, result) = run(ADD, a as u32, b as u32);
        match a.checked_add(b) {
            Some(sum) => {
                prop_assert_eq!(result, Ok(Flow::Next));
                prop_assert_eq!(regs.gpr(Register::T2), sum as u32);
            }
            None => {
                prop_assert_eq!(result, Err(SignalType::IntegerOverflow));
                prop_assert_eq!(regs.gpr(Register::T2), 0x5A5A_5A5A);
            }
        }
    }

    #[test]
    fn sub_traps_exactly_on_signed_overflow(a in any::<i32>(), b in any::<i32>()) {
        let (regs, result) = run(SUB, a as u32, b as u32);
        prop_assert_eq!(result.is_err(), a.checked_sub(b).is_none());
        if let Some(difference) = a.checked_sub(b) {
            prop_assert_eq!(regs.gpr(Register::T2), difference as u32);
        }
    }

    #[test]
    fn mult_splits_product(a in any::<i32>(), b in any::<i32>()) {
        let (regs, _) = run(Instruction::Mult { rs: Register::T0, rt: Register::T1 }, a as u32, b as u32);
        let product = ((regs.hi() as u64) << 32 | regs.lo() as u64) as i64;
        prop_assert_eq!(product, a as i64 * b as i64);
    }

    #[test]
    fn divu_matches_host(a in any::<u32>(), b in 1u32..) {
        let (regs, _) = run(Instruction::Divu { rs: Register::T0, rt: Register::T1 }, a, b);
        prop_assert_eq!(regs.lo(), a / b);
        prop_assert_eq!(regs.hi(), a % b);
    }

    #[test]
    fn set_less_than_matches_host(a in any::<u32>(), b in any::<u32>()) {
        let slt = Instruction::Slt { rd: Register::T2, rs: Register::T0, rt: Register::T1 };
        let (regs, _) = run(slt, a, b);
        prop_assert_eq!(regs.gpr(Register::T2), ((a as i32) < (b as i32)) as u32);

        let sltu = Instruction::Sltu { rd: Register::T2, rs: Register::T0, rt: Register::T1 };
        let (regs, _) = run(sltu, a, b);
        prop_assert_eq!(regs.gpr(Register::T2), (a < b) as u32);
    }

    #[test]
    fn branch_target_follows_offset_law(offset in any::<i16>()) {
        let beq = Instruction::Beq { rs: Register::Zero, rt: Register::Zero, offset };
        let (_, result) = run(beq, 0, 0);
        let target = PC.wrapping_add(4).wrapping_add((offset as i32 * 4) as u32);
        prop_assert_eq!(result, Ok(Flow::Jump(target)));
        prop_assert_eq!((target.wrapping_sub(PC + 4) as i32) >> 2, offset as i32);
    }

    #[test]
    fn misaligned_word_access_faults(offset in any::<i16>().prop_filter("misaligned", |o| o % 4 != 0)) {
        let lw = Instruction::Lw { rt: Register::T2, base: Register::T0, offset };
        let (regs, result) = run(lw, 0x1001_0000, 0);
        prop_assert_eq!(result, Err(SignalType::AddressError));
        prop_assert_eq!(regs.gpr(Register::T2), 0x5A5A_5A5A);
    }
}
