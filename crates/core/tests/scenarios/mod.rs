//! The literal end-to-end scenarios of SPEC_FULL.md's testable-properties
//! section, run through the assembled `Cpu` exactly as an external caller
//! would: load a word sequence, run to completion, inspect registers.

use crate::common::asm::{self, *};
use crate::common::harness::TestContext;
use pipesim_core::{Fault, StopReason};

fn halted(reason: &StopReason) -> bool {
    matches!(
        reason,
        StopReason::Trap(event) if matches!(event.fault, Fault::Halt { .. })
    )
}

#[test]
fn basic_arithmetic() {
    // addiu $t0, $0, 5; addiu $t1, $0, 7; add $t2, $t0, $t1; halt
    let words = [
        asm::i(OP_ADDIU, ZERO, T0, 5),
        asm::i(OP_ADDIU, ZERO, T1, 7),
        asm::r(FUNCT_ADD, T0, T1, T2),
        asm::r(FUNCT_HALT, 0, 0, 0),
    ];
    let mut cpu = TestContext::load_program(&words);
    let reason = cpu.run();

    assert!(halted(&reason));
    assert_eq!(cpu.reg(T2), 12);
}

#[test]
fn load_use_stall_inserts_exactly_one_bubble() {
    // addiu $s0, $0, 0x200; addiu $t2, $0, 7; sw $t2, 0($s0);
    // lw $t0, 0($s0); add $t1, $t0, $t0; halt
    let words = [
        asm::i(OP_ADDIU, ZERO, S0, 0x200),
        asm::i(OP_ADDIU, ZERO, T2, 7),
        asm::i(OP_SW, S0, T2, 0),
        asm::i(OP_LW, S0, T0, 0),
        asm::r(FUNCT_ADD, T0, T0, T1),
        asm::r(FUNCT_HALT, 0, 0, 0),
    ];
    let mut cpu = TestContext::load_program(&words);
    let reason = cpu.run();

    assert!(halted(&reason));
    assert_eq!(cpu.reg(T1), 14);
    assert_eq!(cpu.stats().num_mispredictions, 0);
}

#[test]
fn branch_misprediction_skips_the_delay_instruction() {
    // addiu $t0, $0, 1; beq $t0, $t0, skip; addiu $t1, $0, 99; skip: halt
    let words = [
        asm::i(OP_ADDIU, ZERO, T0, 1),
        asm::i(OP_BEQ, T0, T0, 1),
        asm::i(OP_ADDIU, ZERO, T1, 99),
        asm::r(FUNCT_HALT, 0, 0, 0),
    ];
    let mut cpu = TestContext::load_program(&words);
    let reason = cpu.run();

    assert!(halted(&reason));
    assert_eq!(cpu.reg(T1), 0);
    let stats = cpu.stats();
    assert_eq!(stats.num_jumps, 1);
    assert_eq!(stats.num_mispredictions, 1);
}

#[test]
fn store_then_load_round_trips_through_memory() {
    // addiu $s0, $0, 0x200; lui $t0, 0; ori $t0, $t0, 0xABCD;
    // sw $t0, 0($s0); lw $t1, 0($s0); halt
    const OP_ORI: u32 = 0x0D;
    let words = [
        asm::i(OP_ADDIU, ZERO, S0, 0x200),
        asm::i(OP_LUI, ZERO, T0, 0),
        asm::i(OP_ORI, T0, T0, 0xABCD),
        asm::i(OP_SW, S0, T0, 0),
        asm::i(OP_LW, S0, T1, 0),
        asm::r(FUNCT_HALT, 0, 0, 0),
    ];
    let mut cpu = TestContext::load_program(&words);
    let reason = cpu.run();

    assert!(halted(&reason));
    assert_eq!(cpu.reg(T1), 0x0000_ABCD);
}

#[test]
fn multiply_populates_hi_and_lo() {
    // lui $t0, 1 ($t0 = 0x0001_0000); mult $t0, $t0; mfhi $t2; mflo $t3; halt
    let words = [
        asm::i(OP_LUI, ZERO, T0, 1),
        asm::r(FUNCT_MULT, T0, T0, 0),
        asm::r(FUNCT_MFHI, 0, 0, T2),
        asm::r(FUNCT_MFLO, 0, 0, T3),
        asm::r(FUNCT_HALT, 0, 0, 0),
    ];
    let mut cpu = TestContext::load_program(&words);
    let reason = cpu.run();

    assert!(halted(&reason));
    assert_eq!(cpu.reg(T2), 1);
    assert_eq!(cpu.reg(T3), 0);
}

#[test]
fn jump_and_link_returns_the_link_address_without_a_delay_slot() {
    // pc=0:  jal target        (target = pc 8)
    // pc=4:  addiu $v0, $0, 1  -- never fetched, this core has no delay slot
    // pc=8:  target: addiu $v0, $0, 2
    // pc=12: halt
    let jal_pc = 0;
    let target = 8;
    let words = [
        asm::j(OP_JAL, target),
        asm::i(OP_ADDIU, ZERO, V0, 1),
        asm::i(OP_ADDIU, ZERO, V0, 2),
        asm::r(FUNCT_HALT, 0, 0, 0),
    ];
    let mut cpu = TestContext::load_program(&words);
    let reason = cpu.run();

    assert!(halted(&reason));
    assert_eq!(cpu.reg(V0), 2);
    assert_eq!(cpu.reg(RA), jal_pc + 8);
}
