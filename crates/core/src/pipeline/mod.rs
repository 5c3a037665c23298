//! The five classical pipeline stages and the messages passed between them.
//!
//! Every stage exposes a single `clock(cycle)` method: it reads its input
//! ports, produces at most one message per output port, and returns. No
//! stage retains hidden state across cycles beyond what its struct fields
//! document — all cross-cycle visibility is mediated by the port fabric.

pub mod decode;
pub mod execute;
pub mod fetch;
pub mod memory;
pub mod messages;
pub mod writeback;

pub use decode::DecodeStage;
pub use execute::ExecuteStage;
pub use fetch::FetchStage;
pub use memory::MemoryStage;
pub use writeback::WritebackStage;
