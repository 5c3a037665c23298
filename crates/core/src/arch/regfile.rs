//! The register file: 32 general-purpose registers, `HI`/`LO`, and a
//! per-register valid bit acting as the scoreboard.

use crate::common::{HI, LO, NUM_GPR, NUM_SLOTS, RegNum, ZERO};

/// Holds architectural register state and the single-bit scoreboard
/// described in §4.3 of the specification. At reset, every register is 0
/// and every scoreboard bit is valid.
///
/// The scoreboard (`valid`) covers the 32 GPRs plus the `HI`/`LO` virtual
/// slots (indices [`crate::common::HI`], [`crate::common::LO`]): `mult`,
/// `div`, `mfhi`, `mflo`, `mthi`, and `mtlo` hazard against each other
/// exactly like ordinary register producers, via [`RegisterFile::is_valid`],
/// [`RegisterFile::invalidate`], and [`RegisterFile::validate`] called with
/// those slot indices instead of a GPR number.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    gpr: [u32; NUM_GPR],
    valid: [bool; NUM_SLOTS],
    hi: u32,
    lo: u32,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Builds a register file with all registers zeroed and valid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gpr: [0; NUM_GPR],
            valid: [true; NUM_SLOTS],
            hi: 0,
            lo: 0,
        }
    }

    /// Reads `r`. Register zero always reads as 0.
    #[must_use]
    pub fn read(&self, r: RegNum) -> u32 {
        if r == ZERO { 0 } else { self.gpr[r as usize] }
    }

    /// Writes `value` to `r`. A write to register zero is a no-op.
    pub fn write(&mut self, r: RegNum, value: u32) {
        if r != ZERO {
            self.gpr[r as usize] = value;
        }
    }

    /// Reads the `HI` auxiliary register.
    #[must_use]
    pub fn hi(&self) -> u32 {
        self.hi
    }

    /// Reads the `LO` auxiliary register.
    #[must_use]
    pub fn lo(&self) -> u32 {
        self.lo
    }

    /// Writes the `HI` auxiliary register.
    pub fn write_hi(&mut self, value: u32) {
        self.hi = value;
    }

    /// Writes the `LO` auxiliary register.
    pub fn write_lo(&mut self, value: u32) {
        self.lo = value;
    }

    /// Reads `r`, where `r` may be a real GPR or the virtual `HI`/`LO` slot.
    /// Decode uses this instead of [`Self::read`] for `mfhi`/`mflo`'s
    /// implicit source, since their operand lives in the auxiliary
    /// registers, not the GPR array.
    #[must_use]
    pub fn read_slot(&self, r: RegNum) -> u32 {
        match r {
            HI => self.hi,
            LO => self.lo,
            _ => self.read(r),
        }
    }

    /// True if no in-flight instruction is known to target `r`. Register
    /// zero is always valid.
    #[must_use]
    pub fn is_valid(&self, r: RegNum) -> bool {
        r == ZERO || self.valid[r as usize]
    }

    /// Marks `r` invalid: Decode calls this when it issues an instruction
    /// whose destination is `r`. A no-op for register zero. Idempotent —
    /// invalidating an already-invalid register (a second in-flight writer
    /// to the same destination) leaves the bit invalid, as documented in
    /// SPEC_FULL.md §4.3.
    pub fn invalidate(&mut self, r: RegNum) {
        if r != ZERO {
            self.valid[r as usize] = false;
        }
    }

    /// Marks `r` valid again: Writeback calls this once its result has been
    /// committed. A no-op for register zero.
    pub fn validate(&mut self, r: RegNum) {
        if r != ZERO {
            self.valid[r as usize] = true;
        }
    }

    /// Resets every scoreboard bit to valid, leaving register contents
    /// untouched. Called on a pipeline flush: the surviving architectural
    /// state has no more in-flight writers.
    pub fn revalidate_all(&mut self) {
        self.valid = [true; NUM_SLOTS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_register_always_reads_zero() {
        let mut rf = RegisterFile::new();
        rf.write(ZERO, 0xDEAD_BEEF);
        assert_eq!(rf.read(ZERO), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut rf = RegisterFile::new();
        rf.write(8, 42);
        assert_eq!(rf.read(8), 42);
    }

    #[test]
    fn reset_state_is_all_valid() {
        let rf = RegisterFile::new();
        for r in 0..32 {
            assert!(rf.is_valid(r));
        }
    }

    #[test]
    fn invalidate_then_validate_round_trips() {
        let mut rf = RegisterFile::new();
        rf.invalidate(8);
        assert!(!rf.is_valid(8));
        rf.validate(8);
        assert!(rf.is_valid(8));
    }

    #[test]
    fn zero_register_is_never_invalidated() {
        let mut rf = RegisterFile::new();
        rf.invalidate(ZERO);
        assert!(rf.is_valid(ZERO));
    }

    #[test]
    fn double_invalidate_is_idempotent() {
        let mut rf = RegisterFile::new();
        rf.invalidate(8);
        rf.invalidate(8);
        rf.validate(8);
        assert!(rf.is_valid(8));
    }

    #[test]
    fn revalidate_all_clears_every_bit() {
        let mut rf = RegisterFile::new();
        rf.invalidate(3);
        rf.invalidate(9);
        rf.revalidate_all();
        assert!(rf.is_valid(3));
        assert!(rf.is_valid(9));
    }

    #[test]
    fn hi_lo_round_trip() {
        let mut rf = RegisterFile::new();
        rf.write_hi(1);
        rf.write_lo(2);
        assert_eq!(rf.hi(), 1);
        assert_eq!(rf.lo(), 2);
    }
}
