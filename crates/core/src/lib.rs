//! A cycle-accurate simulator core for a classical 32-bit, in-order,
//! 5-stage (Fetch, Decode, Execute, Memory, Writeback) MIPS-style pipeline.
//!
//! The crate has no notion of an operating system, a file, or a terminal —
//! it consumes a [`config::Config`], a [`common::MemoryBus`], and an entry
//! PC, and exposes a [`cpu::Cpu`] that steps or runs to completion. Turning
//! that into a runnable program (loading a binary, printing results) is the
//! `pipesim-cli` crate's job.

pub mod arch;
pub mod bypass;
pub mod common;
pub mod config;
pub mod cpu;
pub mod isa;
pub mod pipeline;
pub mod port;
pub mod predictor;
pub mod stats;

pub use common::{Addr, Fault, FlatMemory, MemoryBus};
pub use config::Config;
pub use cpu::{Cpu, StopReason};
pub use stats::SimStats;
