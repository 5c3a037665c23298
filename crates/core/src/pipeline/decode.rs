//! Decode: parses the fetched word, resolves hazards against the register
//! file and bypass unit, detects branch mispredictions early, and issues to
//! Execute.

use crate::arch::RegisterFile;
use crate::bypass::{BypassAnswer, BypassUnit, Stage as BypassStage};
use crate::isa::{self, FuncInstr, resolve_branch};
use crate::pipeline::messages::{FetchMsg, FlushTarget, Forward, NO_FORWARD, Stall, forward_lookup};
use crate::port::{Fabric, PortId};
use crate::predictor::{BranchPredictor, ResolvedBranch};
use crate::stats::SimStats;

/// Decode carries no state of its own across cycles: everything it needs is
/// either on a port or in the shared register file / bypass unit.
#[derive(Debug)]
pub struct DecodeStage {
    in_fetch: PortId<FetchMsg>,
    self_stall: PortId<FetchMsg>,
    ex_forward: PortId<Forward>,
    mem_forward: PortId<Forward>,
    wb_forward: PortId<Forward>,
    out_execute: PortId<FuncInstr>,
    out_stall: PortId<Stall>,
    out_flush: PortId<FlushTarget>,
}

impl DecodeStage {
    /// Builds a Decode stage wired to the given ports.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        in_fetch: PortId<FetchMsg>,
        self_stall: PortId<FetchMsg>,
        ex_forward: PortId<Forward>,
        mem_forward: PortId<Forward>,
        wb_forward: PortId<Forward>,
        out_execute: PortId<FuncInstr>,
        out_stall: PortId<Stall>,
        out_flush: PortId<FlushTarget>,
    ) -> Self {
        Self {
            in_fetch,
            self_stall,
            ex_forward,
            mem_forward,
            wb_forward,
            out_execute,
            out_stall,
            out_flush,
        }
    }

    /// Advances Decode by one cycle. Must run after Execute, Memory, and
    /// Writeback within the same cycle (see `Cpu::step`), so that a producer
    /// sitting in any of those stages this cycle has already notified the
    /// bypass unit and written its forwarding latch before Decode consults
    /// either.
    #[allow(clippy::too_many_arguments)]
    pub fn clock(
        &mut self,
        fabric: &Fabric,
        regfile: &mut RegisterFile,
        bypass: &mut BypassUnit,
        predictor: &mut dyn BranchPredictor,
        stats: &mut SimStats,
        cycle: u64,
    ) {
        // Drained unconditionally: each is bandwidth-1, and a cycle that
        // doesn't end up using a forwarded value must still make room for
        // next cycle's write.
        let ex_fwd = fabric.read(self.ex_forward, cycle).unwrap_or(NO_FORWARD);
        let mem_fwd = fabric.read(self.mem_forward, cycle).unwrap_or(NO_FORWARD);
        let wb_fwd = fabric.read(self.wb_forward, cycle).unwrap_or(NO_FORWARD);

        let Some(msg) = fabric
            .read(self.self_stall, cycle)
            .or_else(|| fabric.read(self.in_fetch, cycle))
        else {
            return;
        };

        if let Some(fault) = msg.fault {
            // A fetch-time bus error: push a faulting placeholder straight
            // through, bypassing operand capture and hazard checks — there
            // is nothing meaningful to decode.
            let mut inst = isa::decode(0, msg.pc);
            inst.fault = Some(fault);
            let _ = fabric.write(self.out_execute, inst, cycle);
            return;
        }

        let span = tracing::trace_span!("decode", cycle, pc = msg.pc);
        let _enter = span.enter();

        let mut inst = isa::decode(msg.word, msg.pc);
        tracing::trace!(mnemonic = ?inst.mnemonic, "decode: parsed");

        let src1 = isa::implicit_src(inst.mnemonic).or(inst.src1);
        let src2 = inst.src2;
        let mut stalled = false;

        for (is_src1, r) in [(true, src1), (false, src2)] {
            let Some(r) = r else { continue };
            if regfile.is_valid(r) {
                let v = regfile.read_slot(r);
                if is_src1 {
                    inst.v_src1 = v;
                } else {
                    inst.v_src2 = v;
                }
                continue;
            }
            match bypass.query(r) {
                BypassAnswer::Ok => {
                    let v = regfile.read_slot(r);
                    if is_src1 {
                        inst.v_src1 = v;
                    } else {
                        inst.v_src2 = v;
                    }
                }
                BypassAnswer::BypassFrom(from) => {
                    let pool = match from {
                        BypassStage::Execute => ex_fwd,
                        BypassStage::Memory => mem_fwd,
                        BypassStage::Writeback => wb_fwd,
                    };
                    if let Some(v) = forward_lookup(pool, r) {
                        tracing::trace!(r, ?from, v, "decode: resolved bypass");
                        if is_src1 {
                            inst.v_src1 = v;
                        } else {
                            inst.v_src2 = v;
                        }
                    }
                }
                BypassAnswer::Stall => stalled = true,
            }
        }

        if stalled {
            tracing::debug!(pc = msg.pc, "decode: load-use stall");
            let _ = fabric.write(self.self_stall, msg, cycle);
            let _ = fabric.write(self.out_stall, Stall, cycle);
            return;
        }

        for r in inst.dst.into_iter().chain(isa::implicit_dsts(inst.mnemonic).iter().copied()) {
            regfile.invalidate(r);
            bypass.on_decode_issue(r, inst.is_load());
        }

        if let Some((taken, target)) = resolve_branch(&inst) {
            stats.num_jumps += 1;
            let predicted = msg.bp;
            let mispredicted =
                taken != predicted.predicted_taken || (taken && target != predicted.predicted_target);

            if mispredicted {
                stats.num_mispredictions += 1;
                tracing::debug!(pc = msg.pc, target, "decode: branch misprediction");
                let _ = fabric.write(self.out_flush, FlushTarget { target }, cycle);
                fabric.flush(self.in_fetch);
                fabric.flush(self.self_stall);
                bypass.flush();
                regfile.revalidate_all();
            }

            predictor.update(ResolvedBranch {
                pc: msg.pc,
                taken,
                target,
            });
            inst.new_pc = target;
        }

        let _ = fabric.write(self.out_execute, inst, cycle);
    }
}
