//! The top-level driver described in SPEC_FULL.md §4.7: constructs the port
//! fabric and the five pipeline stages, then repeatedly advances the clock.

use crate::arch::RegisterFile;
use crate::bypass::BypassUnit;
use crate::common::{Addr, Fault, MemoryBus, RegNum};
use crate::config::{Config, PredictorKind};
use crate::isa::FuncInstr;
use crate::pipeline::messages::{FetchMsg, FlushTarget, Forward, Stall, TrapEvent};
use crate::pipeline::{DecodeStage, ExecuteStage, FetchStage, MemoryStage, WritebackStage};
use crate::port::Fabric;
use crate::predictor::{AlwaysNotTaken, BranchPredictor, Dynamic};
use crate::stats::SimStats;

/// Why [`Cpu::run`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Writeback raised a trap on `trap_out` (a real fault, or a clean
    /// `halt`, which travels the same channel).
    Trap(TrapEvent),
    /// The configured step budget elapsed before any trap was raised.
    BudgetExhausted,
}

/// Owns the port fabric, the five pipeline stages, architectural state, the
/// branch predictor, and the memory bus; advances all of it one cycle at a
/// time.
///
/// Construction wires every named port in [`crate::config::PortsConfig`],
/// attaches each stage's reader, and validates the resulting graph before a
/// single cycle runs — per §7, a malformed configuration is fatal at
/// construction, not at the first cycle that happens to touch the broken
/// port.
pub struct Cpu {
    fabric: Fabric,
    fetch: FetchStage,
    decode: DecodeStage,
    execute: ExecuteStage,
    memory: MemoryStage,
    writeback: WritebackStage,
    regfile: RegisterFile,
    bypass: BypassUnit,
    predictor: Box<dyn BranchPredictor>,
    bus: Box<dyn MemoryBus>,
    trap_out: crate::port::PortId<TrapEvent>,
    stats: SimStats,
    step_budget: u64,
    cycle: u64,
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("cycle", &self.cycle)
            .field("pc", &self.fetch.pc())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Cpu {
    /// Builds a `Cpu` wired per `config`, servicing loads and stores through
    /// `bus`, with Fetch starting from `entry_pc`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Configuration`] if `config` fails
    /// [`Config::validate`], or if the resulting port graph leaves any port
    /// without a reader.
    pub fn new(config: &Config, bus: Box<dyn MemoryBus>, entry_pc: Addr) -> Result<Self, Fault> {
        config.validate()?;
        let ports = &config.ports;

        let mut fabric = Fabric::new();

        let fetch_to_decode =
            fabric.declare_port::<FetchMsg>("fetch_to_decode", ports.fetch_to_decode.bandwidth, ports.fetch_to_decode.latency);
        let fetch_to_decode = fabric.attach_reader(fetch_to_decode);

        let self_stall = fabric.declare_port::<FetchMsg>(
            "decode_self_stall",
            ports.decode_self_stall.bandwidth,
            ports.decode_self_stall.latency,
        );
        let self_stall = fabric.attach_reader(self_stall);

        let decode_to_execute = fabric.declare_port::<FuncInstr>(
            "decode_to_execute",
            ports.decode_to_execute.bandwidth,
            ports.decode_to_execute.latency,
        );
        let decode_to_execute = fabric.attach_reader(decode_to_execute);

        let execute_to_memory = fabric.declare_port::<FuncInstr>(
            "execute_to_memory",
            ports.execute_to_memory.bandwidth,
            ports.execute_to_memory.latency,
        );
        let execute_to_memory = fabric.attach_reader(execute_to_memory);

        let memory_to_writeback = fabric.declare_port::<FuncInstr>(
            "memory_to_writeback",
            ports.memory_to_writeback.bandwidth,
            ports.memory_to_writeback.latency,
        );
        let memory_to_writeback = fabric.attach_reader(memory_to_writeback);

        let flush_target =
            fabric.declare_port::<FlushTarget>("flush_target", ports.flush_target.bandwidth, ports.flush_target.latency);
        let flush_target = fabric.attach_reader(flush_target);

        let stall = fabric.declare_port::<Stall>("stall", ports.stall.bandwidth, ports.stall.latency);
        let stall = fabric.attach_reader(stall);

        let ex_forward = fabric.declare_port::<Forward>("ex_forward", ports.ex_forward.bandwidth, ports.ex_forward.latency);
        let ex_forward = fabric.attach_reader(ex_forward);

        let mem_forward =
            fabric.declare_port::<Forward>("mem_forward", ports.mem_forward.bandwidth, ports.mem_forward.latency);
        let mem_forward = fabric.attach_reader(mem_forward);

        let wb_forward = fabric.declare_port::<Forward>("wb_forward", ports.wb_forward.bandwidth, ports.wb_forward.latency);
        let wb_forward = fabric.attach_reader(wb_forward);

        let trap_out = fabric.declare_port::<TrapEvent>("trap_out", ports.trap_out.bandwidth, ports.trap_out.latency);
        let trap_out = fabric.attach_reader(trap_out);

        fabric.validate()?;

        let predictor: Box<dyn BranchPredictor> = match config.predictor {
            PredictorKind::AlwaysNotTaken => Box::new(AlwaysNotTaken),
            PredictorKind::Dynamic { btb_entries } => Box::new(Dynamic::new(btb_entries)),
        };

        Ok(Self {
            fabric,
            fetch: FetchStage::new(fetch_to_decode, stall, flush_target, entry_pc),
            decode: DecodeStage::new(
                fetch_to_decode,
                self_stall,
                ex_forward,
                mem_forward,
                wb_forward,
                decode_to_execute,
                stall,
                flush_target,
            ),
            execute: ExecuteStage::new(decode_to_execute, execute_to_memory, ex_forward),
            memory: MemoryStage::new(execute_to_memory, memory_to_writeback, mem_forward),
            writeback: WritebackStage::new(memory_to_writeback, wb_forward, trap_out, config.wb_bandwidth),
            regfile: RegisterFile::new(),
            bypass: BypassUnit::new(),
            predictor,
            bus,
            trap_out,
            stats: SimStats::default(),
            step_budget: config.step_budget,
            cycle: 0,
        })
    }

    /// Advances every stage by exactly one cycle, in the order
    /// Writeback, Memory, Execute, Fetch, Decode — backend stages run first
    /// so a producer sitting in any of them this cycle has already notified
    /// the bypass unit and published its forwarding latch before Decode
    /// reads either; Fetch still runs before Decode so a same-cycle flush
    /// from Decode is not visible to Fetch until the next cycle. Returns the
    /// trap raised this cycle, if any.
    pub fn step(&mut self) -> Option<TrapEvent> {
        let cycle = self.cycle;

        let _ = self
            .writeback
            .clock(&self.fabric, &mut self.regfile, &mut self.bypass, &mut self.stats, cycle);
        self.memory.clock(&self.fabric, &mut *self.bus, &mut self.bypass, cycle);
        self.execute.clock(&self.fabric, &mut self.bypass, cycle);
        self.fetch
            .clock(&self.fabric, &*self.bus, &mut *self.predictor, cycle);
        self.decode.clock(
            &self.fabric,
            &mut self.regfile,
            &mut self.bypass,
            &mut *self.predictor,
            &mut self.stats,
            cycle,
        );

        let trap = self.fabric.read(self.trap_out, cycle);
        self.cycle += 1;
        self.stats.cycles = self.cycle;
        trap
    }

    /// Steps until a trap is raised or the step budget elapses, per §4.7:
    /// "Terminates on trap, on an explicit halt instruction, or when the
    /// driver's step budget is exhausted."
    pub fn run(&mut self) -> StopReason {
        loop {
            if let Some(event) = self.step() {
                return StopReason::Trap(event);
            }
            if self.cycle >= self.step_budget {
                return StopReason::BudgetExhausted;
            }
        }
    }

    /// Current cycle count.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Fetch's current program counter.
    #[must_use]
    pub fn pc(&self) -> Addr {
        self.fetch.pc()
    }

    /// Reads a general-purpose register. Register 0 always reads as 0.
    #[must_use]
    pub fn register(&self, r: RegNum) -> u32 {
        self.regfile.read(r)
    }

    /// The `HI` auxiliary register.
    #[must_use]
    pub fn hi(&self) -> u32 {
        self.regfile.hi()
    }

    /// The `LO` auxiliary register.
    #[must_use]
    pub fn lo(&self) -> u32 {
        self.regfile.lo()
    }

    /// A snapshot of the running statistics counters.
    #[must_use]
    pub fn stats(&self) -> SimStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FlatMemory;

    fn assemble_r(funct: u32, rs: u32, rt: u32, rd: u32) -> u32 {
        (rs << 21) | (rt << 16) | (rd << 11) | funct
    }

    fn assemble_i(opcode: u32, rs: u32, rt: u32, imm: u16) -> u32 {
        (opcode << 26) | (rs << 21) | (rt << 16) | u32::from(imm)
    }

    const OP_ADDI: u32 = 0x08;
    const OP_LW: u32 = 0x23;
    const OP_BEQ: u32 = 0x04;
    const FUNCT_ADD: u32 = 0x20;
    const FUNCT_HALT: u32 = 0x3F;

    fn new_cpu(words: &[u32]) -> Cpu {
        let mut mem = FlatMemory::new(0, 4096);
        let mut image = Vec::with_capacity(words.len() * 4);
        for w in words {
            image.extend_from_slice(&w.to_le_bytes());
        }
        mem.load_image(&image);
        Cpu::new(&Config::default(), Box::new(mem), 0).unwrap()
    }

    #[test]
    fn halt_terminates_with_trap() {
        let mut cpu = new_cpu(&[assemble_r(FUNCT_HALT, 0, 0, 0)]);
        let reason = cpu.run();
        assert!(matches!(
            reason,
            StopReason::Trap(TrapEvent {
                fault: Fault::Halt { .. },
                ..
            })
        ));
    }

    #[test]
    fn load_use_hazard_inserts_exactly_one_bubble() {
        // lw $t0, 0($zero); add $t1, $t0, $t0; halt
        let words = [
            assemble_i(OP_LW, 0, 8, 0x100),
            assemble_r(FUNCT_ADD, 8, 8, 9),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut mem = FlatMemory::new(0, 4096);
        let mut image = Vec::new();
        for w in &words {
            image.extend_from_slice(&w.to_le_bytes());
        }
        mem.load_image(&image);
        mem.write(0x100, 4, 7, 0).unwrap();

        let mut cpu = Cpu::new(&Config::default(), Box::new(mem), 0).unwrap();
        let reason = cpu.run();
        assert!(matches!(reason, StopReason::Trap(_)));
        assert_eq!(cpu.register(9), 14);
    }

    #[test]
    fn alu_to_alu_forwarding_resolves_without_stall() {
        // addi $t0, $zero, 5; add $t1, $t0, $t0; halt
        let words = [
            assemble_i(OP_ADDI, 0, 8, 5),
            assemble_r(FUNCT_ADD, 8, 8, 9),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        cpu.run();
        assert_eq!(cpu.register(9), 10);
    }

    #[test]
    fn branch_misprediction_refetches_from_the_resolved_target() {
        // beq $t0, $t0, +1 (skips the next instruction); addi $t1, $zero, 1 (skipped); addi $t2, $zero, 2; halt
        let words = [
            assemble_i(OP_BEQ, 8, 8, 1),
            assemble_i(OP_ADDI, 0, 9, 1),
            assemble_i(OP_ADDI, 0, 10, 2),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        cpu.run();
        assert_eq!(cpu.register(9), 0);
        assert_eq!(cpu.register(10), 2);
    }

    #[test]
    fn unknown_opcode_traps_with_decode_error() {
        let mut cpu = new_cpu(&[0xFFFF_FFFF]);
        let reason = cpu.run();
        assert!(matches!(
            reason,
            StopReason::Trap(TrapEvent {
                fault: Fault::DecodeError { .. },
                ..
            })
        ));
    }

    #[test]
    fn step_budget_exhaustion_stops_a_program_that_never_halts() {
        // An infinite loop: beq $zero, $zero, -1 (branches to itself forever).
        let words = [assemble_i(OP_BEQ, 0, 0, 0xFFFF)];
        let mut cpu = Cpu::new(
            &Config {
                step_budget: 50,
                ..Config::default()
            },
            Box::new({
                let mut mem = FlatMemory::new(0, 4096);
                mem.load_image(&words[0].to_le_bytes());
                mem
            }),
            0,
        )
        .unwrap();
        let reason = cpu.run();
        assert_eq!(reason, StopReason::BudgetExhausted);
    }

    #[test]
    fn retirement_count_matches_executed_instructions() {
        let words = [
            assemble_i(OP_ADDI, 0, 8, 1),
            assemble_i(OP_ADDI, 0, 9, 2),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        cpu.run();
        assert_eq!(cpu.stats().instructions_retired, 2);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_port_is_built() {
        let config = Config {
            step_budget: 0,
            ..Config::default()
        };
        let mem = FlatMemory::new(0, 16);
        assert!(matches!(
            Cpu::new(&config, Box::new(mem), 0),
            Err(Fault::Configuration(_))
        ));
    }

    #[test]
    fn jal_then_jr_ra_returns_to_the_instruction_past_the_link_address() {
        const OP_JAL: u32 = 0x03;
        const FUNCT_JR: u32 = 0x08;
        const RA: u32 = 31;
        // pc=0:  jal target (target = pc 16)
        // pc=4:  never fetched (jal has no delay slot in this core)
        // pc=8:  addiu $v0, $0, 42   <- "the instruction after jal" ($ra = pc0 + 8)
        // pc=12: halt
        // pc=16: target: jr $ra
        let words = [
            (OP_JAL << 26) | 4, // imm26 << 2 == 16
            0,
            assemble_i(OP_ADDI, 0, 2, 42),
            assemble_r(FUNCT_HALT, 0, 0, 0),
            assemble_r(FUNCT_JR, RA, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        let reason = cpu.run();
        assert!(matches!(
            reason,
            StopReason::Trap(TrapEvent {
                fault: Fault::Halt { .. },
                ..
            })
        ));
        assert_eq!(cpu.register(2), 42);
        assert_eq!(cpu.register(RA as u8), 8);
    }

    #[test]
    fn store_then_load_round_trips_through_memory() {
        // addiu $s0, $0, 0x200; addiu $t0, $0, 0x1ABC; sw $t0, 0($s0); lw $t1, 0($s0); halt
        const RS_ZERO: u32 = 0;
        const S0: u32 = 16;
        let words = [
            assemble_i(OP_ADDI, RS_ZERO, S0, 0x200),
            assemble_i(OP_ADDI, RS_ZERO, 8, 0x1ABC),
            assemble_i(0x2B, S0, 8, 0), // sw $t0, 0($s0)
            assemble_i(OP_LW, S0, 9, 0), // lw $t1, 0($s0)
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        cpu.run();
        assert_eq!(cpu.register(9), 0x1ABC);
    }

    #[test]
    fn multiply_populates_hi_and_lo() {
        // lui $t0, 1 ($t0 = 0x0001_0000); mult $t0, $t0; mfhi $t2; mflo $t3; halt
        const FUNCT_MULT: u32 = 0x18;
        const FUNCT_MFHI: u32 = 0x10;
        const FUNCT_MFLO: u32 = 0x12;
        let words = [
            assemble_i(0x0F, 0, 8, 1), // lui $t0, 1
            assemble_r(FUNCT_MULT, 8, 8, 0),
            assemble_r(FUNCT_MFHI, 0, 0, 10),
            assemble_r(FUNCT_MFLO, 0, 0, 11),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        cpu.run();
        assert_eq!(cpu.register(10), 1);
        assert_eq!(cpu.register(11), 0);
    }

    #[rstest::rstest]
    #[case::add_signed_boundary_traps(FUNCT_ADD, true)]
    #[case::addu_unsigned_boundary_wraps(0x21, false)]
    fn signed_add_overflow_boundary_traps_but_unsigned_does_not(
        #[case] funct: u32,
        #[case] expect_fault: bool,
    ) {
        // lui $t0, 0x7FFF; ori $t0, $t0, 0xFFFF -> $t0 = 0x7FFF_FFFF
        // addiu $t1, $0, 1; {add|addu} $t2, $t0, $t1; halt
        let words = [
            assemble_i(0x0F, 0, 8, 0x7FFF),
            assemble_i(0x0D, 8, 8, 0xFFFF),
            assemble_i(OP_ADDI, 0, 9, 1),
            assemble_r(funct, 8, 9, 10),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        let reason = cpu.run();
        let trapped = matches!(
            reason,
            StopReason::Trap(TrapEvent {
                fault: Fault::ArithmeticOverflow { .. },
                ..
            })
        );
        assert_eq!(trapped, expect_fault);
        if !expect_fault {
            assert_eq!(cpu.register(10), 0x8000_0000);
        }
    }

    #[test]
    fn stats_after_a_clean_run_match_expectations_via_struct_diff() {
        let words = [
            assemble_i(OP_ADDI, 0, 8, 1),
            assemble_i(OP_ADDI, 0, 9, 2),
            assemble_r(FUNCT_HALT, 0, 0, 0),
        ];
        let mut cpu = new_cpu(&words);
        cpu.run();
        let stats = cpu.stats();
        pretty_assertions::assert_eq!(
            SimStats {
                cycles: stats.cycles,
                instructions_retired: 2,
                num_jumps: 0,
                num_mispredictions: 0,
            },
            stats
        );
    }
}
