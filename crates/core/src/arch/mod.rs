//! Architectural state: the general-purpose register file, HI/LO, and the
//! single-bit scoreboard.

mod regfile;

pub use regfile::RegisterFile;
