//! Fetch: consults the branch predictor, reads one instruction word from
//! memory, and advances the PC.

use crate::common::{Addr, MemoryBus};
use crate::pipeline::messages::{FetchMsg, FlushTarget, Stall};
use crate::port::{Fabric, PortId};
use crate::predictor::BranchPredictor;

/// Holds the only state Fetch carries across cycles: the program counter
/// itself.
#[derive(Debug)]
pub struct FetchStage {
    out: PortId<FetchMsg>,
    stall_in: PortId<Stall>,
    flush_in: PortId<FlushTarget>,
    pc: Addr,
}

impl FetchStage {
    /// Builds a Fetch stage starting from `entry_pc`.
    #[must_use]
    pub fn new(
        out: PortId<FetchMsg>,
        stall_in: PortId<Stall>,
        flush_in: PortId<FlushTarget>,
        entry_pc: Addr,
    ) -> Self {
        Self {
            out,
            stall_in,
            flush_in,
            pc: entry_pc,
        }
    }

    /// Current PC, for observability/tests only.
    #[must_use]
    pub fn pc(&self) -> Addr {
        self.pc
    }

    /// Advances Fetch by one cycle.
    pub fn clock(
        &mut self,
        fabric: &Fabric,
        memory: &dyn MemoryBus,
        predictor: &mut dyn BranchPredictor,
        cycle: u64,
    ) {
        if let Some(flush) = fabric.read(self.flush_in, cycle) {
            tracing::debug!(cycle, target = flush.target, "fetch: flushed to target");
            self.pc = flush.target;
        }

        if fabric.read(self.stall_in, cycle).is_some() {
            tracing::trace!(cycle, pc = self.pc, "fetch: frozen by stall");
            return;
        }

        let span = tracing::trace_span!("fetch", cycle, pc = self.pc);
        let _enter = span.enter();

        let pc = self.pc;
        let bp = predictor.predict(pc);

        match memory.read(pc, 4, pc) {
            Ok(word) => {
                tracing::trace!(word, "fetch: word fetched");
                let _ = fabric.write(
                    self.out,
                    FetchMsg {
                        pc,
                        word,
                        bp,
                        fault: None,
                    },
                    cycle,
                );
                self.pc = if bp.predicted_taken { bp.predicted_target } else { pc.wrapping_add(4) };
            }
            Err(fault) => {
                tracing::warn!(?fault, "fetch: bus error fetching instruction");
                let _ = fabric.write(
                    self.out,
                    FetchMsg {
                        pc,
                        word: 0,
                        bp,
                        fault: Some(fault),
                    },
                    cycle,
                );
                self.pc = pc.wrapping_add(4);
            }
        }
    }
}
