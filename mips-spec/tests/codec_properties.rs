//! Property tests for the layout-driven codec

use mips_spec::*;
use proptest::prelude::*;

fn matching(word: u32) -> Vec<InstructionKind> {
    InstructionKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.layout().matches(word))
        .collect()
}

/// Force `raw` into the shape of `kind`: fixed bits pinned, multi-valued
/// constraints set to their `pick`-th value, excluded values nudged away.
fn conform(kind: InstructionKind, raw: u32, pick: usize) -> u32 {
    let layout = kind.layout();
    let mut word = (raw & !layout.fixed_mask()) | layout.fixed_value();
    for format in layout.formats.iter().filter(|f| !f.is_fixed()) {
        match format.kind {
            ConstraintKind::Exact => {
                let value = format.values[pick % format.values.len()];
                word = (word & !format.mask()) | (value << format.start);
            }
            ConstraintKind::Different if !format.accepts(word) => {
                let free = format.mask() & !layout.fixed_mask();
                word ^= free & free.wrapping_neg();
            }
            ConstraintKind::Different => {}
        }
    }
    word
}

fn arb_kind() -> impl Strategy<Value = InstructionKind> {
    prop::sample::select(InstructionKind::ALL)
}

/// Any instruction of any leaf, operands drawn from the full field ranges
fn arb_instruction() -> impl Strategy<Value = Instruction> {
    (arb_kind(), any::<u32>(), any::<usize>()).prop_map(|(kind, raw, pick)| {
        Instruction::decode_as(kind, conform(kind, raw, pick))
            .unwrap_or_else(|| panic!("{:?} rejects its own shape", kind))
    })
}

proptest! {
    #[test]
    fn decode_inverts_encode(inst in arb_instruction()) {
        let word = inst.encode();
        prop_assert_eq!(Instruction::decode(inst.kind(), word), Ok(inst));
        prop_assert_eq!(matching(word), vec![inst.kind()]);
    }

    #[test]
    fn encode_inverts_decode(word in any::<u32>()) {
        for kind in matching(word) {
            let inst = Instruction::decode(kind, word).unwrap();
            prop_assert_eq!(inst.encode(), word);
        }
    }

    #[test]
    fn random_words_match_at_most_one_leaf(word in any::<u32>()) {
        let kinds = matching(word);
        prop_assert!(kinds.len() <= 1, "{:#010x} matches {:?}", word, kinds);
    }

    #[test]
    fn every_leaf_round_trips(kind in arb_kind(), raw in any::<u32>(), pick in any::<usize>()) {
        let word = conform(kind, raw, pick);
        prop_assert_eq!(matching(word), vec![kind]);
        let inst = Instruction::decode(kind, word).unwrap();
        prop_assert_eq!(inst.kind(), kind);
        prop_assert_eq!(inst.encode(), word);
        prop_assert_eq!(inst.try_encode(), Ok(word));
    }
}

// ============================================================================
// Structured Exclusivity Sweeps
// ============================================================================

#[test]
fn test_opcode_funct_sweep_is_exclusive() {
    for opcode in 0u32..64 {
        for funct in 0u32..64 {
            for fmt in 0u32..32 {
                let word = (opcode << 26) | (fmt << 21) | funct;
                let kinds = matching(word);
                assert!(kinds.len() <= 1, "{:#010x} matches {:?}", word, kinds);
            }
        }
    }
}

#[test]
fn test_regimm_sweep_is_exclusive() {
    for rt in 0u32..32 {
        let word = (0x01 << 26) | (rt << 16) | 0x0004;
        assert!(matching(word).len() <= 1);
    }
}

#[test]
fn test_every_leaf_round_trips_at_its_extremes() {
    for &kind in InstructionKind::ALL {
        for raw in [0, u32::MAX, 0x5555_5555, 0xAAAA_AAAA] {
            for pick in 0..2 {
                let word = conform(kind, raw, pick);
                let inst = Instruction::decode(kind, word)
                    .unwrap_or_else(|e| panic!("{:?} {:#010x}: {}", kind, word, e));
                assert_eq!(inst.encode(), word, "{:?}", kind);
            }
        }
    }
}

#[test]
fn test_every_leaf_is_reachable() {
    // The fixed value of each leaf, adjusted to satisfy restrictions,
    // must decode as that leaf.
    let samples = [
        (InstructionKind::Nop, 0x0000_0000),
        (InstructionKind::Sll, 0x0008_4080),
        (InstructionKind::FAdd, 0x4600_0000),
        (InstructionKind::FAdd, 0x4620_0000),
        (InstructionKind::CvtS, 0x4680_0020),
        (InstructionKind::CvtW, 0x4620_0024),
        (InstructionKind::FCompare, 0x4600_003E),
        (InstructionKind::Bc1f, 0x4500_0001),
        (InstructionKind::Bc1t, 0x4501_0001),
        (InstructionKind::Syscall, 0x0000_000C),
        (InstructionKind::Teqi, 0x040C_0005),
    ];
    for (kind, word) in samples {
        assert_eq!(matching(word), vec![kind], "{:#010x}", word);
    }
}

#[test]
fn test_unassigned_words_match_nothing() {
    // opcode 0x3F is not defined
    assert!(matching(0xFC00_0000).is_empty());
    // SPECIAL funct 0x01 is not defined
    assert!(matching(0x0000_0001).is_empty());
    // cvt.s.s is not a valid conversion
    assert!(matching(0x4600_0020).is_empty());
    // sll with nonzero rs
    assert!(matching(0x0020_0040).is_empty());
}

#[test]
fn test_reference_encodings() {
    let add = Instruction::Add {
        rd: Register::T1,
        rs: Register::Zero,
        rt: Register::S0,
    };
    assert_eq!(add.encode().to_le_bytes(), [0x20, 0x48, 0x10, 0x00]);

    assert_eq!(
        Instruction::decode(InstructionKind::Addi, 0x2008_000F),
        Ok(Instruction::Addi {
            rt: Register::T0,
            rs: Register::Zero,
            imm: 0xF
        })
    );
    assert_eq!(
        Instruction::decode(InstructionKind::J, 0x0810_0007),
        Ok(Instruction::J { target: 0x0010_0007 })
    );

    let syscall = Instruction::Syscall { code: 0 };
    assert_eq!(syscall.encode(), 0x0000_000C);
    let jr = Instruction::Jr { rs: Register::Ra };
    assert_eq!(jr.encode(), 0x03E0_0008);
    let lw = Instruction::Lw {
        rt: Register::T0,
        base: Register::Sp,
        offset: 4,
    };
    assert_eq!(lw.encode(), 0x8FA8_0004);
}
