//! Shared test infrastructure for the end-to-end scenario suite.

/// Raw-word assembly helpers for the R/I/J instruction formats.
pub mod asm;
/// A `TestContext` harness wrapping `Cpu` with program-loading and
/// register-inspection conveniences.
pub mod harness;
