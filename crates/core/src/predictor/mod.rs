//! Branch prediction, consulted by Fetch and corrected by Decode.
//!
//! The rest of the pipeline only ever sees [`BranchPredictor`]; which
//! concrete implementation backs it is a construction-time choice driven by
//! [`crate::config::PredictorKind`].

use crate::common::Addr;
use crate::pipeline::messages::BpInterface;

/// `predict` is consulted by Fetch every cycle; `update` is called exactly
/// once per branch/jump, by Decode, once the real outcome is known.
pub trait BranchPredictor: std::fmt::Debug {
    /// Predicts the outcome of the instruction fetched at `pc`.
    fn predict(&mut self, pc: Addr) -> BpInterface;

    /// Reports the resolved outcome of a branch/jump Decode just resolved.
    fn update(&mut self, observed: ResolvedBranch);
}

/// What Decode learned once it resolved a branch or jump: whether it was
/// actually taken and where it actually went. Fed back into the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBranch {
    /// PC of the branch/jump instruction itself.
    pub pc: Addr,
    /// Whether it was actually taken.
    pub taken: bool,
    /// The actual target PC (fall-through if not taken).
    pub target: Addr,
}

/// The simplest conforming predictor: every branch predicts not-taken,
/// falling through to `pc + 4`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysNotTaken;

impl BranchPredictor for AlwaysNotTaken {
    fn predict(&mut self, pc: Addr) -> BpInterface {
        BpInterface {
            pc,
            predicted_taken: false,
            predicted_target: pc.wrapping_add(4),
        }
    }

    fn update(&mut self, _observed: ResolvedBranch) {}
}

#[derive(Debug, Clone, Copy)]
struct BtbEntry {
    tag: Addr,
    target: Addr,
    valid: bool,
}

impl Default for BtbEntry {
    fn default() -> Self {
        Self {
            tag: 0,
            target: 0,
            valid: false,
        }
    }
}

/// Direct-mapped branch target buffer, indexed by the low bits of the PC.
#[derive(Debug, Clone)]
struct Btb {
    entries: Vec<BtbEntry>,
}

impl Btb {
    fn new(size: usize) -> Self {
        Self {
            entries: vec![BtbEntry::default(); size.max(1).next_power_of_two()],
        }
    }

    fn index(&self, pc: Addr) -> usize {
        ((pc >> 2) as usize) & (self.entries.len() - 1)
    }

    fn lookup(&self, pc: Addr) -> Option<Addr> {
        let entry = self.entries[self.index(pc)];
        (entry.valid && entry.tag == pc).then_some(entry.target)
    }

    fn update(&mut self, pc: Addr, target: Addr) {
        let idx = self.index(pc);
        self.entries[idx] = BtbEntry {
            tag: pc,
            target,
            valid: true,
        };
    }
}

const COUNTER_MAX: u8 = 3;

/// A dynamic predictor: a BTB supplies the predicted target for any PC it
/// has seen before, and a table of 2-bit saturating counters (one per BTB
/// slot) supplies the taken/not-taken guess. A counter saturates at 0
/// (strongly not-taken) and 3 (strongly taken); it nudges by one on every
/// update and only flips its taken/not-taken verdict after crossing the
/// midpoint.
#[derive(Debug, Clone)]
pub struct Dynamic {
    btb: Btb,
    counters: Vec<u8>,
}

impl Dynamic {
    /// Builds a dynamic predictor with a BTB (and counter table) of
    /// `btb_entries` slots, rounded up to a power of two.
    #[must_use]
    pub fn new(btb_entries: usize) -> Self {
        let size = btb_entries.max(1).next_power_of_two();
        Self {
            btb: Btb::new(size),
            counters: vec![1; size],
        }
    }
}

impl BranchPredictor for Dynamic {
    fn predict(&mut self, pc: Addr) -> BpInterface {
        let idx = self.btb.index(pc);
        let predicted_taken = self.counters[idx] >= 2;
        let predicted_target = self
            .btb
            .lookup(pc)
            .filter(|_| predicted_taken)
            .unwrap_or_else(|| pc.wrapping_add(4));
        BpInterface {
            pc,
            predicted_taken,
            predicted_target,
        }
    }

    fn update(&mut self, observed: ResolvedBranch) {
        let idx = self.btb.index(observed.pc);
        if observed.taken {
            self.counters[idx] = (self.counters[idx] + 1).min(COUNTER_MAX);
            self.btb.update(observed.pc, observed.target);
        } else {
            self.counters[idx] = self.counters[idx].saturating_sub(1);
        }
    }
}
