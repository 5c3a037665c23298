//! Execute: runs the ALU/branch/address-computation semantics of §4.1 and
//! notifies the bypass unit that this instruction's result now lives at the
//! EX output latch.

use crate::bypass::BypassUnit;
use crate::common::{Fault, HI, LO, ZERO};
use crate::isa::{self, FuncInstr, Mnemonic, implicit_dsts};
use crate::pipeline::messages::{Forward, NO_FORWARD};
use crate::port::{Fabric, PortId};

/// Execute carries no cross-cycle state of its own; everything it needs
/// arrives already resolved on the instruction Decode issued.
#[derive(Debug)]
pub struct ExecuteStage {
    in_port: PortId<FuncInstr>,
    out_port: PortId<FuncInstr>,
    ex_forward: PortId<Forward>,
}

impl ExecuteStage {
    /// Builds an Execute stage wired to the given ports.
    #[must_use]
    pub fn new(in_port: PortId<FuncInstr>, out_port: PortId<FuncInstr>, ex_forward: PortId<Forward>) -> Self {
        Self {
            in_port,
            out_port,
            ex_forward,
        }
    }

    /// Advances Execute by one cycle.
    pub fn clock(&mut self, fabric: &Fabric, bypass: &mut BypassUnit, cycle: u64) {
        let Some(mut inst) = fabric.read(self.in_port, cycle) else {
            return;
        };

        let span = tracing::trace_span!("execute", cycle, pc = inst.pc);
        let _enter = span.enter();

        dispatch(&mut inst);

        if let Some(fault) = &inst.fault {
            tracing::warn!(?fault, pc = inst.pc, "execute: fault raised");
        } else {
            for r in inst.dst.into_iter().chain(implicit_dsts(inst.mnemonic).iter().copied()) {
                bypass.on_execute(r, inst.is_load());
            }
        }

        let produced = produce_forward(&inst);
        let _ = fabric.write(self.ex_forward, produced, cycle);
        let _ = fabric.write(self.out_port, inst, cycle);
    }
}

/// Builds this cycle's forwarding latch from an instruction's result. Shared
/// verbatim by Execute's own output and by Memory's (see
/// `pipeline::memory`).
pub(crate) fn produce_forward(inst: &FuncInstr) -> Forward {
    let mut produced = NO_FORWARD;
    if inst.fault.is_some() {
        return produced;
    }
    let mut i = 0;
    if inst.dst_written {
        if let Some(d) = inst.dst {
            if d != ZERO {
                produced[i] = Some((d, inst.v_dst));
                i += 1;
            }
        }
    }
    if let Some(hi) = inst.v_hi {
        if i < 2 {
            produced[i] = Some((HI, hi));
            i += 1;
        }
    }
    if let Some(lo) = inst.v_lo {
        if i < 2 {
            produced[i] = Some((LO, lo));
        }
    }
    produced
}

fn mult_product(signed: bool, a: u32, b: u32) -> (u32, u32) {
    let product: u64 = if signed {
        ((a as i32 as i64).wrapping_mul(b as i32 as i64)) as u64
    } else {
        u64::from(a) * u64::from(b)
    };
    ((product >> 32) as u32, product as u32)
}

fn dispatch(inst: &mut FuncInstr) {
    use Mnemonic as M;

    match inst.mnemonic {
        M::Add => match (inst.v_src1 as i32).checked_add(inst.v_src2 as i32) {
            Some(v) => inst.v_dst = v as u32,
            None => {
                inst.dst_written = false;
                inst.fault = Some(Fault::ArithmeticOverflow { pc: inst.pc });
            }
        },
        M::Sub => match (inst.v_src1 as i32).checked_sub(inst.v_src2 as i32) {
            Some(v) => inst.v_dst = v as u32,
            None => {
                inst.dst_written = false;
                inst.fault = Some(Fault::ArithmeticOverflow { pc: inst.pc });
            }
        },
        M::Addu => inst.v_dst = inst.v_src1.wrapping_add(inst.v_src2),
        M::Subu => inst.v_dst = inst.v_src1.wrapping_sub(inst.v_src2),
        M::And => inst.v_dst = inst.v_src1 & inst.v_src2,
        M::Or => inst.v_dst = inst.v_src1 | inst.v_src2,
        M::Xor => inst.v_dst = inst.v_src1 ^ inst.v_src2,
        M::Nor => inst.v_dst = !(inst.v_src1 | inst.v_src2),
        M::Slt => inst.v_dst = u32::from((inst.v_src1 as i32) < (inst.v_src2 as i32)),
        M::Sltu => inst.v_dst = u32::from(inst.v_src1 < inst.v_src2),
        M::Mul => {
            let (_, lo) = mult_product(true, inst.v_src1, inst.v_src2);
            inst.v_dst = lo;
        }

        M::Sll => inst.v_dst = inst.v_src1 << (inst.imm & 0x1F),
        M::Srl => inst.v_dst = inst.v_src1 >> (inst.imm & 0x1F),
        M::Sra => inst.v_dst = ((inst.v_src1 as i32) >> (inst.imm & 0x1F)) as u32,
        M::Sllv => inst.v_dst = inst.v_src1 << (inst.v_src2 & 0x1F),
        M::Srlv => inst.v_dst = inst.v_src1 >> (inst.v_src2 & 0x1F),
        M::Srav => inst.v_dst = ((inst.v_src1 as i32) >> (inst.v_src2 & 0x1F)) as u32,

        M::Addi => match (inst.v_src1 as i32).checked_add(isa::sign_extend_imm16(inst.imm) as i32) {
            Some(v) => inst.v_dst = v as u32,
            None => {
                inst.dst_written = false;
                inst.fault = Some(Fault::ArithmeticOverflow { pc: inst.pc });
            }
        },
        M::Addiu => inst.v_dst = inst.v_src1.wrapping_add(isa::sign_extend_imm16(inst.imm)),
        M::Slti => {
            inst.v_dst = u32::from((inst.v_src1 as i32) < (isa::sign_extend_imm16(inst.imm) as i32));
        }
        M::Sltiu => inst.v_dst = u32::from(inst.v_src1 < isa::sign_extend_imm16(inst.imm)),
        M::Andi => inst.v_dst = inst.v_src1 & inst.imm,
        M::Ori => inst.v_dst = inst.v_src1 | inst.imm,
        M::Xori => inst.v_dst = inst.v_src1 ^ inst.imm,

        M::Lui => inst.v_dst = inst.imm << 16,

        M::Movn => {
            if inst.v_src2 != 0 {
                inst.v_dst = inst.v_src1;
                inst.dst_written = true;
            } else {
                inst.dst_written = false;
            }
        }
        M::Movz => {
            if inst.v_src2 == 0 {
                inst.v_dst = inst.v_src1;
                inst.dst_written = true;
            } else {
                inst.dst_written = false;
            }
        }

        M::Beq | M::Bne | M::Blez | M::Bgtz => {
            if let Some((_, target)) = isa::resolve_branch(inst) {
                inst.new_pc = target;
            }
        }

        M::J | M::Jr => {
            if let Some((_, target)) = isa::resolve_branch(inst) {
                inst.new_pc = target;
            }
        }
        M::Jal | M::Jalr => {
            if let Some((_, target)) = isa::resolve_branch(inst) {
                inst.new_pc = target;
            }
            // Link value follows the standard MIPS encoding convention
            // (return address past a would-be delay slot) even though this
            // core never executes one.
            inst.v_dst = inst.pc.wrapping_add(8);
        }

        M::Lw | M::Lh | M::Lb | M::Lhu | M::Lbu => {
            inst.mem_addr = inst.v_src1.wrapping_add(isa::sign_extend_imm16(inst.imm));
        }
        M::Sw | M::Sh | M::Sb => {
            inst.mem_addr = inst.v_src1.wrapping_add(isa::sign_extend_imm16(inst.imm));
        }

        M::Mult => {
            let (hi, lo) = mult_product(true, inst.v_src1, inst.v_src2);
            inst.v_hi = Some(hi);
            inst.v_lo = Some(lo);
        }
        M::Multu => {
            let (hi, lo) = mult_product(false, inst.v_src1, inst.v_src2);
            inst.v_hi = Some(hi);
            inst.v_lo = Some(lo);
        }
        M::Div => {
            if inst.v_src2 == 0 {
                inst.v_hi = Some(inst.v_src1);
                inst.v_lo = Some(0xFFFF_FFFF);
                inst.fault = Some(Fault::DivideByZero { pc: inst.pc });
            } else {
                let a = inst.v_src1 as i32;
                let b = inst.v_src2 as i32;
                inst.v_lo = Some(a.wrapping_div(b) as u32);
                inst.v_hi = Some(a.wrapping_rem(b) as u32);
            }
        }
        M::Divu => {
            if inst.v_src2 == 0 {
                inst.v_hi = Some(inst.v_src1);
                inst.v_lo = Some(0xFFFF_FFFF);
                inst.fault = Some(Fault::DivideByZero { pc: inst.pc });
            } else {
                inst.v_lo = Some(inst.v_src1 / inst.v_src2);
                inst.v_hi = Some(inst.v_src1 % inst.v_src2);
            }
        }
        M::Mfhi => inst.v_dst = inst.v_src1,
        M::Mflo => inst.v_dst = inst.v_src1,
        M::Mthi => inst.v_hi = Some(inst.v_src1),
        M::Mtlo => inst.v_lo = Some(inst.v_src1),

        M::Syscall => inst.fault = Some(Fault::Syscall { pc: inst.pc, code: inst.imm }),
        M::Break => inst.fault = Some(Fault::Break { pc: inst.pc }),
        M::Trap => inst.fault = Some(Fault::Trap { pc: inst.pc }),
        M::Halt => inst.fault = Some(Fault::Halt { pc: inst.pc }),

        M::Unknown => inst.fault = Some(Fault::DecodeError { pc: inst.pc, word: inst.raw }),

        M::Nop => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::decode;

    fn exec(mut inst: FuncInstr) -> FuncInstr {
        dispatch(&mut inst);
        inst
    }

    #[test]
    fn add_overflow_raises_fault_and_skips_write() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Add;
        inst.dst = Some(3);
        inst.dst_written = true;
        inst.v_src1 = 0x7FFF_FFFF;
        inst.v_src2 = 1;
        let inst = exec(inst);
        assert!(matches!(inst.fault, Some(Fault::ArithmeticOverflow { .. })));
        assert!(!inst.dst_written);
    }

    #[test]
    fn addu_overflow_wraps_without_fault() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Addu;
        inst.v_src1 = 0xFFFF_FFFF;
        inst.v_src2 = 1;
        let inst = exec(inst);
        assert_eq!(inst.v_dst, 0);
        assert!(inst.fault.is_none());
    }

    #[test]
    fn signed_mult_sign_extends_both_operands() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Mult;
        inst.v_src1 = 0x1_0000; // 65536
        inst.v_src2 = 0x1_0000;
        let inst = exec(inst);
        assert_eq!(inst.v_hi, Some(1));
        assert_eq!(inst.v_lo, Some(0));
    }

    #[test]
    fn div_by_zero_defines_hi_lo_and_faults() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Div;
        inst.v_src1 = 7;
        inst.v_src2 = 0;
        let inst = exec(inst);
        assert_eq!(inst.v_hi, Some(7));
        assert_eq!(inst.v_lo, Some(0xFFFF_FFFF));
        assert!(matches!(inst.fault, Some(Fault::DivideByZero { .. })));
    }

    #[test]
    fn div_dividend_is_v_src1() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Div;
        inst.v_src1 = 10;
        inst.v_src2 = 3;
        let inst = exec(inst);
        assert_eq!(inst.v_lo, Some(3));
        assert_eq!(inst.v_hi, Some(1));
    }

    #[test]
    fn movn_skips_write_when_condition_false() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Movn;
        inst.v_src1 = 42;
        inst.v_src2 = 0;
        let inst = exec(inst);
        assert!(!inst.dst_written);
    }

    #[test]
    fn jal_links_pc_plus_eight() {
        let mut inst = decode(0, 0x1000);
        inst.mnemonic = Mnemonic::Jal;
        inst.imm = 0;
        let inst = exec(inst);
        assert_eq!(inst.v_dst, 0x1008);
    }

    #[rstest::rstest]
    #[case::shift_amount_wraps_at_32(32, 1, 1)]
    #[case::shift_amount_wraps_at_33(33, 1, 2)]
    #[case::shift_amount_top_bits_are_ignored(0xFFFF_FFE0, 1, 1)]
    fn sll_shift_amount_only_honors_the_low_five_bits(
        #[case] imm: u32,
        #[case] v_src1: u32,
        #[case] expected: u32,
    ) {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Sll;
        inst.imm = imm;
        inst.v_src1 = v_src1;
        let inst = exec(inst);
        assert_eq!(inst.v_dst, expected);
    }

    #[test]
    fn unknown_mnemonic_raises_decode_error() {
        let mut inst = decode(0, 0);
        inst.mnemonic = Mnemonic::Unknown;
        inst.raw = 0xDEAD_BEEF;
        let inst = exec(inst);
        assert!(matches!(inst.fault, Some(Fault::DecodeError { .. })));
    }
}
