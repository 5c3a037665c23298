//! The data bypass (forwarding) unit described in SPEC_FULL.md §4.4.
//!
//! This is a pure per-register automaton: it tracks *where* the most
//! recent in-flight writer of each register currently sits, and answers
//! Decode's question of whether a source operand can be read from the
//! register file, forwarded from a downstream stage's output, or must
//! stall. It does not carry the forwarded *value* — that travels on
//! dedicated per-stage forwarding ports that Decode reads directly (see
//! `pipeline::messages::Forward`), keeping the automaton itself small and
//! independently testable.

use crate::common::{NUM_SLOTS, RegNum, ZERO};

/// The pipeline stage a forwarded value can be sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The producer is currently in Execute; its ALU result is available.
    Execute,
    /// The producer is currently in Memory; its (load or pass-through) value
    /// is available.
    Memory,
    /// The producer is currently in Writeback. In practice Decode's
    /// register-file-valid fast path (checked before consulting the bypass
    /// unit at all) makes this case unreachable in the reference driver,
    /// since Writeback runs before Decode within a cycle and validates the
    /// scoreboard directly — it is modeled for completeness and for
    /// alternative stage call orders.
    Writeback,
}

/// Decode's answer for a single source-register slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassAnswer {
    /// No in-flight producer; read the register file directly.
    Ok,
    /// Forward from the named stage's output this cycle.
    BypassFrom(Stage),
    /// The producer cannot supply a value yet (a load still in Execute);
    /// Decode must not issue this cycle.
    Stall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerState {
    Idle,
    InExecute { is_load: bool },
    InMemory,
    InWriteback,
}

/// Per-register forwarding automaton: `IDLE -> IN_EXECUTE -> IN_MEMORY ->
/// IN_WRITEBACK -> IDLE`, driven entirely by notifications from downstream
/// stages. Indexed over every GPR plus the `HI`/`LO` virtual slots
/// ([`crate::common::HI`], [`crate::common::LO`]) so `mult`/`div`/`mfhi`/
/// `mflo`/`mthi`/`mtlo` get the same hazard tracking as ordinary registers.
#[derive(Debug, Clone)]
pub struct BypassUnit {
    state: [ProducerState; NUM_SLOTS],
}

impl Default for BypassUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl BypassUnit {
    /// Builds a bypass unit with every register idle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: [ProducerState::Idle; NUM_SLOTS],
        }
    }

    /// Called by Decode when it issues an instruction with destination `r`.
    /// Marks `r`'s most recent producer as about to enter Execute next
    /// cycle. A no-op for the zero register.
    pub fn on_decode_issue(&mut self, r: RegNum, is_load: bool) {
        if r != ZERO {
            self.state[r as usize] = ProducerState::InExecute { is_load };
        }
    }

    /// Called by Execute while it holds the producer of `r` (refreshes the
    /// load flag in case it was not yet known at issue time).
    pub fn on_execute(&mut self, r: RegNum, is_load: bool) {
        if r != ZERO {
            self.state[r as usize] = ProducerState::InExecute { is_load };
        }
    }

    /// Called by Memory while it holds the producer of `r`: the value is
    /// now available for forwarding regardless of whether it was a load.
    pub fn on_memory(&mut self, r: RegNum) {
        if r != ZERO {
            self.state[r as usize] = ProducerState::InMemory;
        }
    }

    /// Called by Writeback while it holds the producer of `r`.
    pub fn on_writeback(&mut self, r: RegNum) {
        if r != ZERO {
            self.state[r as usize] = ProducerState::InWriteback;
        }
    }

    /// Called once Writeback has retired `r`'s producer: resets to idle.
    pub fn on_retire(&mut self, r: RegNum) {
        if r != ZERO {
            self.state[r as usize] = ProducerState::Idle;
        }
    }

    /// Answers whether `r` can be read directly, forwarded, or must stall.
    #[must_use]
    pub fn query(&self, r: RegNum) -> BypassAnswer {
        if r == ZERO {
            return BypassAnswer::Ok;
        }
        match self.state[r as usize] {
            ProducerState::Idle => BypassAnswer::Ok,
            ProducerState::InExecute { is_load: true } => BypassAnswer::Stall,
            ProducerState::InExecute { is_load: false } => BypassAnswer::BypassFrom(Stage::Execute),
            ProducerState::InMemory => BypassAnswer::BypassFrom(Stage::Memory),
            ProducerState::InWriteback => BypassAnswer::BypassFrom(Stage::Writeback),
        }
    }

    /// Resets every register's automaton to idle. Called on pipeline flush.
    pub fn flush(&mut self) {
        self.state = [ProducerState::Idle; NUM_SLOTS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_register_reads_ok() {
        let bp = BypassUnit::new();
        assert_eq!(bp.query(8), BypassAnswer::Ok);
    }

    #[test]
    fn zero_register_is_always_ok() {
        let mut bp = BypassUnit::new();
        bp.on_decode_issue(ZERO, false);
        assert_eq!(bp.query(ZERO), BypassAnswer::Ok);
    }

    #[test]
    fn alu_producer_in_execute_forwards() {
        let mut bp = BypassUnit::new();
        bp.on_decode_issue(8, false);
        assert_eq!(bp.query(8), BypassAnswer::BypassFrom(Stage::Execute));
    }

    #[test]
    fn load_producer_in_execute_stalls() {
        let mut bp = BypassUnit::new();
        bp.on_decode_issue(8, true);
        assert_eq!(bp.query(8), BypassAnswer::Stall);
    }

    #[test]
    fn load_producer_in_memory_forwards() {
        let mut bp = BypassUnit::new();
        bp.on_decode_issue(8, true);
        bp.on_memory(8);
        assert_eq!(bp.query(8), BypassAnswer::BypassFrom(Stage::Memory));
    }

    #[test]
    fn retire_returns_to_idle() {
        let mut bp = BypassUnit::new();
        bp.on_decode_issue(8, false);
        bp.on_memory(8);
        bp.on_writeback(8);
        bp.on_retire(8);
        assert_eq!(bp.query(8), BypassAnswer::Ok);
    }

    #[test]
    fn flush_resets_all_registers() {
        let mut bp = BypassUnit::new();
        bp.on_decode_issue(8, true);
        bp.on_decode_issue(9, false);
        bp.flush();
        assert_eq!(bp.query(8), BypassAnswer::Ok);
        assert_eq!(bp.query(9), BypassAnswer::Ok);
    }
}
