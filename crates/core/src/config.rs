//! Microarchitectural configuration: the knobs SPEC_FULL.md §10.3 leaves to
//! the caller instead of hard-coding into the stages.
//!
//! The core never parses a file itself — building a [`Config`] from TOML,
//! JSON, or CLI flags is the caller's job. What lives here is the shape of
//! the data and the validation that must run before a single port is
//! constructed, per §7's "configuration error is fatal at construction."

use crate::common::Fault;
use serde::{Deserialize, Serialize};

/// A port's static `(bandwidth, latency)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Maximum number of in-flight messages.
    pub bandwidth: usize,
    /// Cycles from write to earliest read.
    pub latency: u64,
}

impl PortConfig {
    const fn new(bandwidth: usize, latency: u64) -> Self {
        Self { bandwidth, latency }
    }
}

/// Per-port latency/bandwidth configuration for every named channel in the
/// port fabric. Defaults model a single-issue, single-cycle-per-stage
/// pipeline: the four stage-to-stage data ports have latency 1, bandwidth 2;
/// control ports (flush, stall, trap) and the three forwarding latches are
/// latency 0, so a flush, a stall, and a bypassed value all take effect the
/// same cycle they are asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortsConfig {
    /// Fetch -> Decode.
    pub fetch_to_decode: PortConfig,
    /// Decode -> Execute.
    pub decode_to_execute: PortConfig,
    /// Execute -> Memory.
    pub execute_to_memory: PortConfig,
    /// Memory -> Writeback.
    pub memory_to_writeback: PortConfig,
    /// Decode's self-stall recycle port. Latency 1, not 0: the recycled
    /// message must not be visible to Decode's own read in the same cycle it
    /// was written, or a one-cycle stall would loop on itself indefinitely.
    pub decode_self_stall: PortConfig,
    /// Decode -> Fetch flush-target.
    pub flush_target: PortConfig,
    /// Decode -> Fetch stall signal.
    pub stall: PortConfig,
    /// Execute's own output latch, read directly by Decode the same cycle.
    /// Latency 0: Execute, Memory, and Writeback all run before Decode
    /// within a cycle (see `Cpu::step`), so a combinational-latency port is
    /// what makes same-cycle forwarding observable to Decode's query.
    pub ex_forward: PortConfig,
    /// Memory's output latch, read directly by Decode.
    pub mem_forward: PortConfig,
    /// Writeback's output latch, read directly by Decode. Unreachable in
    /// the reference stage ordering (see [`crate::bypass::Stage::Writeback`]),
    /// kept for configuration-shape completeness.
    pub wb_forward: PortConfig,
    /// Writeback -> CPU driver trap channel.
    pub trap_out: PortConfig,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            fetch_to_decode: PortConfig::new(2, 1),
            decode_to_execute: PortConfig::new(2, 1),
            execute_to_memory: PortConfig::new(2, 1),
            memory_to_writeback: PortConfig::new(2, 1),
            decode_self_stall: PortConfig::new(1, 1),
            flush_target: PortConfig::new(1, 0),
            stall: PortConfig::new(1, 0),
            ex_forward: PortConfig::new(1, 0),
            mem_forward: PortConfig::new(1, 0),
            wb_forward: PortConfig::new(1, 0),
            trap_out: PortConfig::new(1, 0),
        }
    }
}

/// Which [`crate::predictor::BranchPredictor`] backs Fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PredictorKind {
    /// [`crate::predictor::AlwaysNotTaken`].
    AlwaysNotTaken,
    /// [`crate::predictor::Dynamic`], with the given BTB/counter-table size.
    Dynamic {
        /// Number of BTB/counter-table slots (rounded up to a power of two).
        btb_entries: usize,
    },
}

impl Default for PredictorKind {
    fn default() -> Self {
        Self::Dynamic { btb_entries: 256 }
    }
}

/// Every microarchitectural parameter the core's stages are generic over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Latency/bandwidth for every named port.
    pub ports: PortsConfig,
    /// Maximum number of instructions Writeback may retire in one cycle.
    /// The spec models one stage per cycle, so this is 1 unless a caller is
    /// deliberately exploring a wider-writeback variant.
    pub wb_bandwidth: usize,
    /// Branch predictor to construct.
    pub predictor: PredictorKind,
    /// Maximum number of cycles the driver will run before giving up,
    /// guarding against a program that never halts or traps.
    pub step_budget: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ports: PortsConfig::default(),
            wb_bandwidth: 1,
            predictor: PredictorKind::default(),
            step_budget: 1_000_000,
        }
    }
}

impl Config {
    /// Checks the configuration for internal consistency before any port or
    /// stage is constructed. A malformed configuration is a
    /// [`Fault::Configuration`], fatal at construction.
    pub fn validate(&self) -> Result<(), Fault> {
        if self.wb_bandwidth == 0 {
            return Err(Fault::Configuration(
                "wb_bandwidth must be at least 1".to_owned(),
            ));
        }
        if self.step_budget == 0 {
            return Err(Fault::Configuration(
                "step_budget must be at least 1".to_owned(),
            ));
        }
        for (name, port) in [
            ("fetch_to_decode", self.ports.fetch_to_decode),
            ("decode_to_execute", self.ports.decode_to_execute),
            ("execute_to_memory", self.ports.execute_to_memory),
            ("memory_to_writeback", self.ports.memory_to_writeback),
            ("decode_self_stall", self.ports.decode_self_stall),
            ("flush_target", self.ports.flush_target),
            ("stall", self.ports.stall),
            ("ex_forward", self.ports.ex_forward),
            ("mem_forward", self.ports.mem_forward),
            ("wb_forward", self.ports.wb_forward),
            ("trap_out", self.ports.trap_out),
        ] {
            if port.bandwidth == 0 {
                return Err(Fault::Configuration(format!(
                    "port '{name}' must have bandwidth >= 1"
                )));
            }
        }
        if let PredictorKind::Dynamic { btb_entries } = self.predictor {
            if btb_entries == 0 {
                return Err(Fault::Configuration(
                    "predictor.btb_entries must be at least 1".to_owned(),
                ));
            }
        }
        Ok(())
    }
}
