//! Writeback: commits results to the register file, clears scoreboard and
//! bypass state, and raises faults on the trap channel.

use crate::arch::RegisterFile;
use crate::bypass::BypassUnit;
use crate::isa::{FuncInstr, implicit_dsts};
use crate::pipeline::execute::produce_forward;
use crate::pipeline::messages::{Forward, TrapEvent};
use crate::port::{Fabric, PortId};
use crate::stats::SimStats;

/// Writeback carries no cross-cycle state of its own.
#[derive(Debug)]
pub struct WritebackStage {
    in_port: PortId<FuncInstr>,
    wb_forward: PortId<Forward>,
    trap_out: PortId<TrapEvent>,
    bandwidth: usize,
}

impl WritebackStage {
    /// Builds a Writeback stage wired to the given ports, retiring at most
    /// `bandwidth` instructions per cycle (per §4.4: "if more than
    /// `wb_bandwidth` writes would retire in one cycle, the oldest wins and
    /// the rest stall").
    #[must_use]
    pub fn new(
        in_port: PortId<FuncInstr>,
        wb_forward: PortId<Forward>,
        trap_out: PortId<TrapEvent>,
        bandwidth: usize,
    ) -> Self {
        Self {
            in_port,
            wb_forward,
            trap_out,
            bandwidth,
        }
    }

    /// Advances Writeback by one cycle. Returns the trap event raised this
    /// cycle, if any (also mirrored on `trap_out` for any other reader).
    ///
    /// This core's pipeline is scalar, so at most one instruction is ever
    /// visible to read in a given cycle under the default port
    /// configuration; the budget below only binds when a caller configures a
    /// wider `memory_to_writeback` port than this driver exercises.
    pub fn clock(
        &mut self,
        fabric: &Fabric,
        regfile: &mut RegisterFile,
        bypass: &mut BypassUnit,
        stats: &mut SimStats,
        cycle: u64,
    ) -> Option<TrapEvent> {
        let mut first_trap = None;
        let mut retired = 0;

        while retired < self.bandwidth {
            let Some(inst) = fabric.read(self.in_port, cycle) else {
                break;
            };

            let span = tracing::trace_span!("writeback", cycle, pc = inst.pc);
            let _enter = span.enter();

            let trap = match inst.fault.clone() {
                Some(fault) => {
                    tracing::warn!(?fault, "writeback: trap raised");
                    let event = TrapEvent { pc: inst.pc, fault };
                    let _ = fabric.write(self.trap_out, event.clone(), cycle);
                    Some(event)
                }
                None => {
                    if inst.dst_written {
                        if let Some(d) = inst.dst {
                            regfile.write(d, inst.v_dst);
                        }
                    }
                    if let Some(hi) = inst.v_hi {
                        regfile.write_hi(hi);
                    }
                    if let Some(lo) = inst.v_lo {
                        regfile.write_lo(lo);
                    }
                    stats.instructions_retired += 1;
                    tracing::trace!(pc = inst.pc, "writeback: retired");
                    None
                }
            };

            for r in inst.dst.into_iter().chain(implicit_dsts(inst.mnemonic).iter().copied()) {
                regfile.validate(r);
                bypass.on_writeback(r);
                bypass.on_retire(r);
            }

            if inst.fault.is_none() {
                let produced = produce_forward(&inst);
                let _ = fabric.write(self.wb_forward, produced, cycle);
            }

            if first_trap.is_none() {
                first_trap = trap;
            }
            retired += 1;
        }

        first_trap
    }
}
