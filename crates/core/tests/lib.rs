//! Integration test entry point for `pipesim-core`.
//!
//! Unit tests live next to the code they cover, in `#[cfg(test)]` modules
//! throughout `src/`. This crate is for tests that exercise the assembled
//! `Cpu` end to end: a full instruction sequence running across all five
//! stages, observed only through its public API (registers, `HI`/`LO`,
//! `StopReason`, `SimStats`) — exactly as an external caller would.

/// Shared test infrastructure: instruction assembly helpers and the CPU
/// harness built on top of `pipesim_core`'s public API.
pub mod common;

/// The literal end-to-end scenarios named in the specification: basic
/// arithmetic, load-use stalls, branch misprediction, store/load round
/// trips, multiply high/low, and jump-and-link.
pub mod scenarios;
