//! Canonical textual disassembly, the required side-output for tracing.

use super::decode::{FuncInstr, Mnemonic};
use crate::common::sign_extend;
use std::fmt;

fn reg_name(r: u8) -> &'static str {
    const NAMES: [&str; 32] = [
        "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5",
        "t6", "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp",
        "sp", "fp", "ra",
    ];
    NAMES[r as usize & 0x1F]
}

impl fmt::Display for FuncInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nop() {
            return write!(f, "nop");
        }

        let rn = |r: Option<u8>| r.map(reg_name).unwrap_or("-");
        let simm = sign_extend(self.imm, 16) as i32;

        match self.mnemonic {
            Mnemonic::Add
            | Mnemonic::Addu
            | Mnemonic::Sub
            | Mnemonic::Subu
            | Mnemonic::And
            | Mnemonic::Or
            | Mnemonic::Xor
            | Mnemonic::Nor
            | Mnemonic::Slt
            | Mnemonic::Sltu
            | Mnemonic::Mul
            | Mnemonic::Movn
            | Mnemonic::Movz => write!(
                f,
                "{} ${}, ${}, ${}",
                mnemonic_str(self.mnemonic),
                rn(self.dst),
                rn(self.src1),
                rn(self.src2)
            ),
            Mnemonic::Sll | Mnemonic::Srl | Mnemonic::Sra => write!(
                f,
                "{} ${}, ${}, {}",
                mnemonic_str(self.mnemonic),
                rn(self.dst),
                rn(self.src1),
                self.imm
            ),
            Mnemonic::Sllv | Mnemonic::Srlv | Mnemonic::Srav => write!(
                f,
                "{} ${}, ${}, ${}",
                mnemonic_str(self.mnemonic),
                rn(self.dst),
                rn(self.src1),
                rn(self.src2)
            ),
            Mnemonic::Addi
            | Mnemonic::Addiu
            | Mnemonic::Slti
            | Mnemonic::Sltiu
            | Mnemonic::Andi
            | Mnemonic::Ori
            | Mnemonic::Xori => write!(
                f,
                "{} ${}, ${}, {}",
                mnemonic_str(self.mnemonic),
                rn(self.dst),
                rn(self.src1),
                simm
            ),
            Mnemonic::Lui => write!(f, "lui ${}, {:#x}", rn(self.dst), self.imm),
            Mnemonic::Beq | Mnemonic::Bne => write!(
                f,
                "{} ${}, ${}, {}",
                mnemonic_str(self.mnemonic),
                rn(self.src1),
                rn(self.src2),
                simm
            ),
            Mnemonic::Blez | Mnemonic::Bgtz => write!(
                f,
                "{} ${}, {}",
                mnemonic_str(self.mnemonic),
                rn(self.src1),
                simm
            ),
            Mnemonic::J | Mnemonic::Jal => {
                write!(f, "{} {:#x}", mnemonic_str(self.mnemonic), self.imm << 2)
            }
            Mnemonic::Jr => write!(f, "jr ${}", rn(self.src1)),
            Mnemonic::Jalr => write!(f, "jalr ${}, ${}", rn(self.dst), rn(self.src1)),
            Mnemonic::Lw | Mnemonic::Lh | Mnemonic::Lb | Mnemonic::Lhu | Mnemonic::Lbu => write!(
                f,
                "{} ${}, {}(${})",
                mnemonic_str(self.mnemonic),
                rn(self.dst),
                simm,
                rn(self.src1)
            ),
            Mnemonic::Sw | Mnemonic::Sh | Mnemonic::Sb => write!(
                f,
                "{} ${}, {}(${})",
                mnemonic_str(self.mnemonic),
                rn(self.src2),
                simm,
                rn(self.src1)
            ),
            Mnemonic::Mult | Mnemonic::Multu | Mnemonic::Div | Mnemonic::Divu => write!(
                f,
                "{} ${}, ${}",
                mnemonic_str(self.mnemonic),
                rn(self.src1),
                rn(self.src2)
            ),
            Mnemonic::Mfhi | Mnemonic::Mflo => {
                write!(f, "{} ${}", mnemonic_str(self.mnemonic), rn(self.dst))
            }
            Mnemonic::Mthi | Mnemonic::Mtlo => {
                write!(f, "{} ${}", mnemonic_str(self.mnemonic), rn(self.src1))
            }
            Mnemonic::Syscall | Mnemonic::Break | Mnemonic::Trap | Mnemonic::Halt => {
                write!(f, "{}", mnemonic_str(self.mnemonic))
            }
            Mnemonic::Nop => write!(f, "nop"),
            Mnemonic::Unknown => write!(f, "unknown {:#010x}", self.raw),
        }
    }
}

fn mnemonic_str(m: Mnemonic) -> &'static str {
    match m {
        Mnemonic::Add => "add",
        Mnemonic::Addu => "addu",
        Mnemonic::Sub => "sub",
        Mnemonic::Subu => "subu",
        Mnemonic::Addi => "addi",
        Mnemonic::Addiu => "addiu",
        Mnemonic::Mult => "mult",
        Mnemonic::Multu => "multu",
        Mnemonic::Mul => "mul",
        Mnemonic::Div => "div",
        Mnemonic::Divu => "divu",
        Mnemonic::Mfhi => "mfhi",
        Mnemonic::Mflo => "mflo",
        Mnemonic::Mthi => "mthi",
        Mnemonic::Mtlo => "mtlo",
        Mnemonic::Sll => "sll",
        Mnemonic::Srl => "srl",
        Mnemonic::Sra => "sra",
        Mnemonic::Sllv => "sllv",
        Mnemonic::Srlv => "srlv",
        Mnemonic::Srav => "srav",
        Mnemonic::Lui => "lui",
        Mnemonic::Slt => "slt",
        Mnemonic::Sltu => "sltu",
        Mnemonic::Slti => "slti",
        Mnemonic::Sltiu => "sltiu",
        Mnemonic::And => "and",
        Mnemonic::Or => "or",
        Mnemonic::Xor => "xor",
        Mnemonic::Nor => "nor",
        Mnemonic::Andi => "andi",
        Mnemonic::Ori => "ori",
        Mnemonic::Xori => "xori",
        Mnemonic::Movn => "movn",
        Mnemonic::Movz => "movz",
        Mnemonic::Beq => "beq",
        Mnemonic::Bne => "bne",
        Mnemonic::Blez => "blez",
        Mnemonic::Bgtz => "bgtz",
        Mnemonic::J => "j",
        Mnemonic::Jr => "jr",
        Mnemonic::Jal => "jal",
        Mnemonic::Jalr => "jalr",
        Mnemonic::Lw => "lw",
        Mnemonic::Lh => "lh",
        Mnemonic::Lb => "lb",
        Mnemonic::Lhu => "lhu",
        Mnemonic::Lbu => "lbu",
        Mnemonic::Sw => "sw",
        Mnemonic::Sh => "sh",
        Mnemonic::Sb => "sb",
        Mnemonic::Syscall => "syscall",
        Mnemonic::Break => "break",
        Mnemonic::Trap => "trap",
        Mnemonic::Halt => "halt",
        Mnemonic::Nop => "nop",
        Mnemonic::Unknown => "unknown",
    }
}
