//! The fault taxonomy surfaced on the CPU's trap channel.

use crate::common::Addr;

/// A terminating event raised by the pipeline and reported on the trap
/// channel. Every variant but [`Fault::Configuration`] carries the faulting
/// program counter so the driver can report where execution stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// The opcode/funct combination at `pc` has no defined semantics.
    #[error("decode error at pc={pc:#010x}: word={word:#010x}")]
    DecodeError {
        /// Program counter of the offending instruction.
        pc: Addr,
        /// Raw instruction word that failed to decode.
        word: u32,
    },

    /// A load or store at `addr` was misaligned or out of range.
    #[error("bus error at pc={pc:#010x}: addr={addr:#010x}")]
    BusError {
        /// Program counter of the offending load/store.
        pc: Addr,
        /// The address that could not be accessed.
        addr: Addr,
    },

    /// Signed `add`/`sub`/`addi` overflowed. Unsigned variants never raise this.
    #[error("arithmetic overflow at pc={pc:#010x}")]
    ArithmeticOverflow {
        /// Program counter of the offending instruction.
        pc: Addr,
    },

    /// `div`/`divu` with a zero divisor.
    #[error("divide by zero at pc={pc:#010x}")]
    DivideByZero {
        /// Program counter of the offending instruction.
        pc: Addr,
    },

    /// `syscall` with its 20-bit code field.
    #[error("syscall {code} at pc={pc:#010x}")]
    Syscall {
        /// Program counter of the `syscall` instruction.
        pc: Addr,
        /// The code embedded in the instruction's immediate field.
        code: u32,
    },

    /// `break`.
    #[error("break at pc={pc:#010x}")]
    Break {
        /// Program counter of the `break` instruction.
        pc: Addr,
    },

    /// `trap`.
    #[error("trap at pc={pc:#010x}")]
    Trap {
        /// Program counter of the `trap` instruction.
        pc: Addr,
    },

    /// `halt`: the simulator-level stop instruction. Not a real fault in the
    /// architectural sense, but it travels the same trap channel since
    /// Writeback has no other way to signal the driver to stop.
    #[error("halt at pc={pc:#010x}")]
    Halt {
        /// Program counter of the `halt` instruction.
        pc: Addr,
    },

    /// The port graph is inconsistent: an unread write port, a read port
    /// with no writer, or a type mismatch between a port's writer and reader.
    /// Fatal at construction; the simulator never starts.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Fault {
    /// The program counter at which this fault was raised, if any.
    #[must_use]
    pub fn pc(&self) -> Option<Addr> {
        match *self {
            Self::DecodeError { pc, .. }
            | Self::BusError { pc, .. }
            | Self::ArithmeticOverflow { pc }
            | Self::DivideByZero { pc }
            | Self::Syscall { pc, .. }
            | Self::Break { pc }
            | Self::Trap { pc }
            | Self::Halt { pc } => Some(pc),
            Self::Configuration(_) => None,
        }
    }
}
