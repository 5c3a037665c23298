//! Instruction decoding, operand semantics, and disassembly for the
//! MIPS-style instruction set this core simulates.

mod bits;
mod decode;
mod disasm;

pub use bits::sign_extend_imm16;
pub use decode::{
    FuncInstr, Mnemonic, OpClass, decode, implicit_dsts, implicit_src, resolve_branch,
};
