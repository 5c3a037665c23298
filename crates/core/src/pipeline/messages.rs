//! Payload types carried on the port fabric between pipeline stages.

use crate::common::{Addr, Fault, RegNum};

/// Branch-prediction record: Fetch's guess, attached to the fetched
/// instruction so Decode can compare it against the resolved outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpInterface {
    /// PC the prediction was made for.
    pub pc: Addr,
    /// Whether the branch/jump is predicted taken.
    pub predicted_taken: bool,
    /// The predicted next PC (fall-through if `predicted_taken` is false).
    pub predicted_target: Addr,
}

/// Emitted by Fetch onto `fetch_to_decode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMsg {
    /// PC this word was fetched from.
    pub pc: Addr,
    /// Raw instruction word. Meaningless if `fault` is set.
    pub word: u32,
    /// Fetch's prediction for this PC.
    pub bp: BpInterface,
    /// Set if the instruction-fetch bus access itself failed. Decode carries
    /// this straight through to a faulting placeholder instruction rather
    /// than decoding `word` — Fetch has no trap channel of its own to raise
    /// it on.
    pub fault: Option<Fault>,
}

/// This cycle's "output latch" of a producing stage: the `(register, value)`
/// pairs it produced, or `None` in either slot if it held no instruction
/// with (that) destination. Two slots, not one, because `mult`/`div` produce
/// `HI` and `LO` simultaneously. Read directly by Decode the same cycle,
/// per [`crate::bypass::BypassAnswer::BypassFrom`].
pub type Forward = [Option<(RegNum, u32)>; 2];

/// The empty forward latch: no destination register produced this cycle.
pub const NO_FORWARD: Forward = [None, None];

/// Looks up `r` among a stage's forwarded outputs.
#[must_use]
pub fn forward_lookup(forward: Forward, r: RegNum) -> Option<u32> {
    forward.into_iter().flatten().find(|(reg, _)| *reg == r).map(|(_, v)| v)
}

/// Asserted by Decode on the 0-latency `stall` port when it cannot issue
/// this cycle (a load-use hazard). Fetch, observing it, must not advance its
/// PC or emit a new [`FetchMsg`] this cycle — otherwise the un-consumed word
/// would either be lost or silently reordered behind the recycled one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall;

/// Instructs Fetch to abandon its current PC and resume from `target`,
/// starting the cycle after this message becomes visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTarget {
    /// The corrected PC Fetch must resume from.
    pub target: Addr,
}

/// A terminating event reported on the CPU's trap channel, carried on
/// `trap_out`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapEvent {
    /// Faulting (or halting) program counter.
    pub pc: Addr,
    /// The underlying fault.
    pub fault: crate::common::Fault,
}
