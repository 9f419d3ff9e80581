//! Register banks of the simulated machine
//!
//! Four fixed-size banks keyed by [`RegisterGroup`]. Every register written
//! since the last drain appears once in a dirty list, in order of its first
//! write, so observers can follow register changes without hooking into the
//! core. The list never holds more entries than there are registers.

use mips_spec::register::{fpu_control, special};
use mips_spec::{FpuRegister, Register, RegisterGroup, NUM_FPU_REGISTERS, NUM_REGISTERS};

/// Reset value of FIR: single, double and word formats implemented
const FIR_RESET: u32 = 0x0003_0000;

/// FCSR bit of condition flag `cc`: flag 0 is bit 23, flag n > 0 is bit 24 + n
#[inline]
pub const fn condition_bit(cc: u8) -> u32 {
    if cc == 0 {
        1 << 23
    } else {
        1 << (24 + cc as u32)
    }
}

#[inline]
const fn bank_slot(group: RegisterGroup) -> usize {
    match group {
        RegisterGroup::General => 0,
        RegisterGroup::Fpu => 1,
        RegisterGroup::FpuControl => 2,
        RegisterGroup::Special => 3,
    }
}

/// One register write, as recorded in the dirty list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterWrite {
    pub group: RegisterGroup,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterCollection {
    general: [u32; NUM_REGISTERS],
    fpu: [u32; NUM_FPU_REGISTERS],
    fpu_control: [u32; fpu_control::COUNT],
    special: [u32; special::COUNT],
    dirty: Vec<RegisterWrite>,
    /// One bit per register already in `dirty`, per bank
    dirty_mask: [u32; 4],
}

impl Default for RegisterCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterCollection {
    pub fn new() -> Self {
        let mut fpu_control = [0; fpu_control::COUNT];
        fpu_control[fpu_control::FIR] = FIR_RESET;
        Self {
            general: [0; NUM_REGISTERS],
            fpu: [0; NUM_FPU_REGISTERS],
            fpu_control,
            special: [0; special::COUNT],
            dirty: Vec::new(),
            dirty_mask: [0; 4],
        }
    }

    pub fn bank(&self, group: RegisterGroup) -> &[u32] {
        match group {
            RegisterGroup::General => &self.general,
            RegisterGroup::Fpu => &self.fpu,
            RegisterGroup::FpuControl => &self.fpu_control,
            RegisterGroup::Special => &self.special,
        }
    }

    fn bank_mut(&mut self, group: RegisterGroup) -> &mut [u32] {
        match group {
            RegisterGroup::General => &mut self.general,
            RegisterGroup::Fpu => &mut self.fpu,
            RegisterGroup::FpuControl => &mut self.fpu_control,
            RegisterGroup::Special => &mut self.special,
        }
    }

    /// Read `index` of `group`, or `None` if out of range
    pub fn get(&self, group: RegisterGroup, index: usize) -> Option<u32> {
        self.bank(group).get(index).copied()
    }

    /// Write `index` of `group`. Returns `false` if out of range.
    ///
    /// Writes to `$zero` are discarded and not recorded.
    pub fn set(&mut self, group: RegisterGroup, index: usize, value: u32) -> bool {
        if group == RegisterGroup::General && index == 0 {
            return index < NUM_REGISTERS;
        }
        match self.bank_mut(group).get_mut(index) {
            Some(slot) => {
                *slot = value;
                let bit = 1u32 << index;
                let mask = &mut self.dirty_mask[bank_slot(group)];
                if *mask & bit == 0 {
                    *mask |= bit;
                    self.dirty.push(RegisterWrite { group, index });
                }
                true
            }
            None => false,
        }
    }

    /// Registers written since the last drain, by first write
    pub fn dirty(&self) -> &[RegisterWrite] {
        &self.dirty
    }

    pub fn drain_dirty(&mut self) -> Vec<RegisterWrite> {
        self.dirty_mask = [0; 4];
        std::mem::take(&mut self.dirty)
    }

    // ========================================================================
    // General purpose and special registers
    // ========================================================================

    #[inline]
    pub fn gpr(&self, reg: Register) -> u32 {
        self.general[reg.index()]
    }

    #[inline]
    pub fn set_gpr(&mut self, reg: Register, value: u32) {
        self.set(RegisterGroup::General, reg.index(), value);
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.special[special::PC]
    }

    #[inline]
    pub fn set_pc(&mut self, value: u32) {
        self.set(RegisterGroup::Special, special::PC, value);
    }

    pub fn hi(&self) -> u32 {
        self.special[special::HI]
    }

    pub fn set_hi(&mut self, value: u32) {
        self.set(RegisterGroup::Special, special::HI, value);
    }

    pub fn lo(&self) -> u32 {
        self.special[special::LO]
    }

    pub fn set_lo(&mut self, value: u32) {
        self.set(RegisterGroup::Special, special::LO, value);
    }

    // ========================================================================
    // Coprocessor 1
    // ========================================================================

    /// Raw bits of an FPU register
    #[inline]
    pub fn fpr(&self, reg: FpuRegister) -> u32 {
        self.fpu[reg.index()]
    }

    #[inline]
    pub fn set_fpr(&mut self, reg: FpuRegister, value: u32) {
        self.set(RegisterGroup::Fpu, reg.index(), value);
    }

    pub fn single(&self, reg: FpuRegister) -> f32 {
        f32::from_bits(self.fpr(reg))
    }

    pub fn set_single(&mut self, reg: FpuRegister, value: f32) {
        self.set_fpr(reg, value.to_bits());
    }

    /// Double held in the pair starting at `reg`; the even register holds the
    /// low word. `None` for an odd register.
    pub fn double(&self, reg: FpuRegister) -> Option<f64> {
        if !reg.is_even() {
            return None;
        }
        let low = self.fpu[reg.index()] as u64;
        let high = self.fpu[reg.index() + 1] as u64;
        Some(f64::from_bits((high << 32) | low))
    }

    /// Store a double into the pair starting at `reg`. Returns `false` for an
    /// odd register.
    pub fn set_double(&mut self, reg: FpuRegister, value: f64) -> bool {
        if !reg.is_even() {
            return false;
        }
        let bits = value.to_bits();
        self.set(RegisterGroup::Fpu, reg.index(), bits as u32);
        self.set(RegisterGroup::Fpu, reg.index() + 1, (bits >> 32) as u32);
        true
    }

    pub fn fcsr(&self) -> u32 {
        self.fpu_control[fpu_control::FCSR]
    }

    pub fn condition_flag(&self, cc: u8) -> bool {
        self.fcsr() & condition_bit(cc) != 0
    }

    pub fn set_condition_flag(&mut self, cc: u8, value: bool) {
        let bit = condition_bit(cc);
        let fcsr = if value {
            self.fcsr() | bit
        } else {
            self.fcsr() & !bit
        };
        self.set(RegisterGroup::FpuControl, fpu_control::FCSR, fcsr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(index: u8) -> FpuRegister {
        FpuRegister::new(index).unwrap()
    }

    #[test]
    fn test_zero_register_is_hardwired() {
        let mut regs = RegisterCollection::new();
        regs.set_gpr(Register::Zero, 42);
        assert_eq!(regs.gpr(Register::Zero), 0);
        assert!(regs.dirty().is_empty());
    }

    #[test]
    fn test_dirty_list() {
        let mut regs = RegisterCollection::new();
        regs.set_gpr(Register::T0, 1);
        regs.set_hi(2);
        regs.set_fpr(f(3), 3);
        assert_eq!(
            regs.drain_dirty(),
            vec![
                RegisterWrite {
                    group: RegisterGroup::General,
                    index: 8
                },
                RegisterWrite {
                    group: RegisterGroup::Special,
                    index: special::HI
                },
                RegisterWrite {
                    group: RegisterGroup::Fpu,
                    index: 3
                },
            ]
        );
        assert!(regs.dirty().is_empty());
    }

    #[test]
    fn test_dirty_list_records_each_register_once() {
        let mut regs = RegisterCollection::new();
        for value in 0..1000 {
            regs.set_pc(value * 4);
            regs.set_gpr(Register::T0, value);
        }
        regs.set_gpr(Register::T1, 1);
        assert_eq!(regs.dirty().len(), 3);
        assert_eq!(regs.dirty()[0].index, special::PC);
        assert_eq!(regs.dirty()[2].index, Register::T1.index());

        regs.drain_dirty();
        regs.set_gpr(Register::T0, 5);
        assert_eq!(regs.dirty().len(), 1);
    }

    #[test]
    fn test_bank_access() {
        let mut regs = RegisterCollection::new();
        assert!(regs.set(RegisterGroup::General, 31, 7));
        assert_eq!(regs.get(RegisterGroup::General, 31), Some(7));
        assert!(!regs.set(RegisterGroup::Special, special::COUNT, 1));
        assert_eq!(regs.get(RegisterGroup::Fpu, 32), None);
        assert_eq!(regs.get(RegisterGroup::FpuControl, fpu_control::FIR), Some(FIR_RESET));
    }

    #[test]
    fn test_double_pair() {
        let mut regs = RegisterCollection::new();
        assert!(regs.set_double(f(2), 1.5));
        let bits = 1.5f64.to_bits();
        assert_eq!(regs.fpr(f(2)), bits as u32);
        assert_eq!(regs.fpr(f(3)), (bits >> 32) as u32);
        assert_eq!(regs.double(f(2)), Some(1.5));

        assert!(!regs.set_double(f(3), 1.0));
        assert_eq!(regs.double(f(3)), None);
    }

    #[test]
    fn test_condition_flags() {
        assert_eq!(condition_bit(0), 0x0080_0000);
        assert_eq!(condition_bit(1), 0x0200_0000);
        assert_eq!(condition_bit(7), 0x8000_0000);

        let mut regs = RegisterCollection::new();
        regs.set_condition_flag(0, true);
        regs.set_condition_flag(3, true);
        assert_eq!(regs.fcsr(), condition_bit(0) | condition_bit(3));
        assert!(regs.condition_flag(3));
        regs.set_condition_flag(3, false);
        assert!(!regs.condition_flag(3));
        assert!(regs.condition_flag(0));
    }
}
