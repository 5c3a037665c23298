//! Memory: services loads and stores through a [`MemoryBus`]; every other
//! instruction passes through untouched.

use crate::bypass::BypassUnit;
use crate::common::{MemoryBus, sign_extend};
use crate::isa::{FuncInstr, Mnemonic, implicit_dsts};
use crate::pipeline::execute::produce_forward;
use crate::pipeline::messages::Forward;
use crate::port::{Fabric, PortId};

/// Memory carries no cross-cycle state of its own.
#[derive(Debug)]
pub struct MemoryStage {
    in_port: PortId<FuncInstr>,
    out_port: PortId<FuncInstr>,
    mem_forward: PortId<Forward>,
}

impl MemoryStage {
    /// Builds a Memory stage wired to the given ports.
    #[must_use]
    pub fn new(
        in_port: PortId<FuncInstr>,
        out_port: PortId<FuncInstr>,
        mem_forward: PortId<Forward>,
    ) -> Self {
        Self {
            in_port,
            out_port,
            mem_forward,
        }
    }

    /// Advances Memory by one cycle.
    pub fn clock(&mut self, fabric: &Fabric, bus: &mut dyn MemoryBus, bypass: &mut BypassUnit, cycle: u64) {
        let Some(mut inst) = fabric.read(self.in_port, cycle) else {
            return;
        };

        let span = tracing::trace_span!("memory", cycle, pc = inst.pc);
        let _enter = span.enter();

        if inst.fault.is_none() {
            if inst.is_load() {
                match bus.read(inst.mem_addr, inst.mem_size, inst.pc) {
                    Ok(raw) => {
                        inst.v_dst = match inst.mnemonic {
                            Mnemonic::Lb => sign_extend(raw, 8),
                            Mnemonic::Lh => sign_extend(raw, 16),
                            _ => raw,
                        };
                        tracing::trace!(addr = inst.mem_addr, value = inst.v_dst, "memory: load");
                    }
                    Err(fault) => {
                        tracing::warn!(?fault, "memory: load bus error");
                        inst.fault = Some(fault);
                    }
                }
            } else if inst.is_store() {
                if let Err(fault) = bus.write(inst.mem_addr, inst.mem_size, inst.v_src2, inst.pc) {
                    tracing::warn!(?fault, "memory: store bus error");
                    inst.fault = Some(fault);
                } else {
                    tracing::trace!(addr = inst.mem_addr, value = inst.v_src2, "memory: store");
                }
            }
        }

        if inst.fault.is_none() {
            for r in inst.dst.into_iter().chain(implicit_dsts(inst.mnemonic).iter().copied()) {
                bypass.on_memory(r);
            }
        }

        let produced = produce_forward(&inst);
        let _ = fabric.write(self.mem_forward, produced, cycle);
        let _ = fabric.write(self.out_port, inst, cycle);
    }
}
