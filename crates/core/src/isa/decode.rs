//! Instruction decode: turns a raw 32-bit word plus its PC into a
//! [`FuncInstr`] — format, operation class, operand indices, and a tagged
//! mnemonic ready for dispatch in Execute.

use super::bits::{code20, funct, imm16, imm26, opcode, rd, rs, rt, shamt, sign_extend_imm16};
use crate::common::{Addr, Fault, HI, LO, RegNum, ZERO};

/// Which of the three raw encodings produced this instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `{opcode:6, rs:5, rt:5, rd:5, shamt:5, funct:6}`
    R,
    /// `{opcode:6, rs:5, rt:5, imm:16}`
    I,
    /// `{opcode:6, imm:26}`
    J,
}

/// The coarse operation class named by the specification. Execute dispatch
/// uses [`Mnemonic`], not this; `OpClass` exists for classification queries
/// (`is_jump`, `is_load`, ...) and for disassembly grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// Register-register arithmetic/logic: add, sub, and, slt, ...
    ArithmeticR,
    /// Variable-amount shift: sllv, srlv, srav.
    ShiftR,
    /// Fixed-amount (`shamt` field) shift: sll, srl, sra.
    ShiftByAmount,
    /// `jr` — jump to a register value, no link.
    JumpR,
    /// `jalr` — jump to a register value, link `$ra`.
    JumpLinkR,
    /// Register-immediate arithmetic/logic: addi, andi, slti, ...
    ArithmeticI,
    /// Two-register equality branch: beq, bne.
    Branch,
    /// Single-register signed comparison to zero: blez, bgtz.
    BranchVsZero,
    /// Sign-extending load: lw, lh, lb.
    Load,
    /// Zero-extending load: lhu, lbu.
    LoadUnsigned,
    /// `lui` — load a constant into the upper half of a register.
    ConstLoad,
    /// Store: sw, sh, sb.
    Store,
    /// `j` — unconditional absolute jump, no link.
    JumpJ,
    /// `jal` — unconditional absolute jump, link `$ra`.
    JumpLinkJ,
    /// Everything that doesn't fit the ALU/branch/memory mold: HI/LO moves,
    /// multiply/divide, conditional moves, and software traps.
    Special,
    /// No defined semantics for this opcode/funct pair. A decode fault.
    Unknown,
}

/// A tagged enumeration of every concrete operation this core implements.
/// Execute dispatches on this directly rather than on a function-pointer
/// table, per the redesign note against pointer-to-member dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)] // mnemonics are self-explanatory; see the ISA table in SPEC_FULL.md
pub enum Mnemonic {
    Add,
    Addu,
    Sub,
    Subu,
    Addi,
    Addiu,
    Mult,
    Multu,
    Mul,
    Div,
    Divu,
    Mfhi,
    Mflo,
    Mthi,
    Mtlo,
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Lui,
    Slt,
    Sltu,
    Slti,
    Sltiu,
    And,
    Or,
    Xor,
    Nor,
    Andi,
    Ori,
    Xori,
    Movn,
    Movz,
    Beq,
    Bne,
    Blez,
    Bgtz,
    J,
    Jr,
    Jal,
    Jalr,
    Lw,
    Lh,
    Lb,
    Lhu,
    Lbu,
    Sw,
    Sh,
    Sb,
    Syscall,
    Break,
    Trap,
    /// Reserved `SPECIAL` encoding (`funct = 0x3F`) this core repurposes as a
    /// simulator-level stop instruction — no real MIPS core defines it.
    Halt,
    Nop,
    Unknown,
}

/// A fully decoded instruction, carried through every pipeline stage and
/// progressively filled in: Fetch sets `pc`/`raw`; Decode sets the operand
/// fields and `v_src1`/`v_src2`; Execute sets `v_dst`/`new_pc`/`mem_addr`;
/// Memory sets `v_dst` for loads; Writeback consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncInstr {
    /// The raw 32-bit word this was decoded from.
    pub raw: u32,
    /// Encoding format.
    pub format: Format,
    /// Coarse operation class.
    pub op_class: OpClass,
    /// Concrete operation, used for execute dispatch.
    pub mnemonic: Mnemonic,
    /// First source register, if this operation reads one.
    pub src1: Option<RegNum>,
    /// Second source register, if this operation reads one.
    pub src2: Option<RegNum>,
    /// Destination register, if this operation writes one.
    pub dst: Option<RegNum>,
    /// Raw (unextended) immediate field, shape depends on `format`.
    pub imm: u32,
    /// Value of `src1` as captured by Decode (from the register file or a
    /// bypass).
    pub v_src1: u32,
    /// Value of `src2` as captured by Decode.
    pub v_src2: u32,
    /// Computed result, set by Execute (and overwritten by Memory for loads).
    pub v_dst: u32,
    /// Effective memory address for loads/stores, set by Execute.
    pub mem_addr: u32,
    /// Access size in bytes (1, 2, or 4) for loads/stores.
    pub mem_size: u8,
    /// Program counter this instruction was fetched from.
    pub pc: Addr,
    /// Next program counter, as resolved by Execute (or Decode's branch
    /// resolution, which writes the corrected value on misprediction).
    pub new_pc: Addr,
    /// Set once Writeback has retired this instruction.
    pub complete: bool,
    /// `HI`-register result, set by Execute for `mult`/`multu`/`div`/`divu`/
    /// `mthi`. `None` for every instruction that does not write `HI`.
    pub v_hi: Option<u32>,
    /// `LO`-register result, set by Execute for `mult`/`multu`/`div`/`divu`/
    /// `mtlo`. `None` for every instruction that does not write `LO`.
    pub v_lo: Option<u32>,
    /// Whether `dst` is actually written at Writeback. True for almost every
    /// destination-producing instruction; false only for `movn`/`movz` whose
    /// condition failed (the scoreboard still clears, but no value commits).
    pub dst_written: bool,
    /// A fault Execute or Memory attached to this instruction. Propagated
    /// untouched through the remaining stages and raised on the trap channel
    /// by Writeback.
    pub fault: Option<Fault>,
}

impl FuncInstr {
    /// True if the raw encoding is all zeros — the canonical MIPS `nop`.
    #[must_use]
    pub fn is_nop(&self) -> bool {
        self.raw == 0
    }

    /// True iff this is any jump or branch variant.
    #[must_use]
    pub fn is_jump(&self) -> bool {
        matches!(
            self.op_class,
            OpClass::JumpR
                | OpClass::JumpLinkR
                | OpClass::JumpJ
                | OpClass::JumpLinkJ
                | OpClass::Branch
                | OpClass::BranchVsZero
        )
    }

    /// True iff this reads memory.
    #[must_use]
    pub fn is_load(&self) -> bool {
        matches!(self.op_class, OpClass::Load | OpClass::LoadUnsigned)
    }

    /// True iff this writes memory.
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self.op_class, OpClass::Store)
    }
}

fn nop(pc: Addr) -> FuncInstr {
    FuncInstr {
        raw: 0,
        format: Format::R,
        op_class: OpClass::Special,
        mnemonic: Mnemonic::Nop,
        src1: None,
        src2: None,
        dst: None,
        imm: 0,
        v_src1: 0,
        v_src2: 0,
        v_dst: 0,
        mem_addr: 0,
        mem_size: 0,
        pc,
        new_pc: pc.wrapping_add(4),
        complete: false,
        v_hi: None,
        v_lo: None,
        dst_written: false,
        fault: None,
    }
}

struct Shape {
    op_class: OpClass,
    mnemonic: Mnemonic,
    src1: Option<RegNum>,
    src2: Option<RegNum>,
    dst: Option<RegNum>,
}

/// Decodes a 32-bit word fetched at `pc` into a [`FuncInstr`]. Never fails:
/// an unrecognized opcode/funct pair decodes to `Mnemonic::Unknown`
/// (`OpClass::Unknown`), and the fault is raised later, at Execute, where
/// the faulting PC is attached to the trap channel.
#[must_use]
pub fn decode(word: u32, pc: Addr) -> FuncInstr {
    if word == 0 {
        return nop(pc);
    }

    let op = opcode(word);
    let shape = match op {
        0x00 => decode_special(word),
        0x1C => decode_special2(word),
        0x02 => j_shape(Mnemonic::J),
        0x03 => j_shape(Mnemonic::Jal),
        0x04 => branch_shape(Mnemonic::Beq, word),
        0x05 => branch_shape(Mnemonic::Bne, word),
        0x06 => branch_vs_zero_shape(Mnemonic::Blez, word),
        0x07 => branch_vs_zero_shape(Mnemonic::Bgtz, word),
        0x08 => arith_i_shape(Mnemonic::Addi, word),
        0x09 => arith_i_shape(Mnemonic::Addiu, word),
        0x0A => arith_i_shape(Mnemonic::Slti, word),
        0x0B => arith_i_shape(Mnemonic::Sltiu, word),
        0x0C => arith_i_shape(Mnemonic::Andi, word),
        0x0D => arith_i_shape(Mnemonic::Ori, word),
        0x0E => arith_i_shape(Mnemonic::Xori, word),
        0x0F => lui_shape(word),
        0x20 => load_shape(Mnemonic::Lb, word),
        0x21 => load_shape(Mnemonic::Lh, word),
        0x23 => load_shape(Mnemonic::Lw, word),
        0x24 => load_shape(Mnemonic::Lbu, word),
        0x25 => load_shape(Mnemonic::Lhu, word),
        0x28 => store_shape(Mnemonic::Sb, word),
        0x29 => store_shape(Mnemonic::Sh, word),
        0x2B => store_shape(Mnemonic::Sw, word),
        _ => None,
    };

    let Some(shape) = shape else {
        return FuncInstr {
            raw: word,
            format: Format::I,
            op_class: OpClass::Unknown,
            mnemonic: Mnemonic::Unknown,
            src1: None,
            src2: None,
            dst: None,
            imm: imm16(word),
            v_src1: 0,
            v_src2: 0,
            v_dst: 0,
            mem_addr: 0,
            mem_size: 0,
            pc,
            new_pc: pc.wrapping_add(4),
            complete: false,
            v_hi: None,
            v_lo: None,
            dst_written: false,
            fault: None,
        };
    };

    let format = match op {
        0x00 | 0x1C => Format::R,
        0x02 | 0x03 => Format::J,
        _ => Format::I,
    };

    let imm = match format {
        // Reused to carry the 5-bit shift amount for the fixed-shift family;
        Format::R if shape.op_class == OpClass::ShiftByAmount => shamt(word),
        // ... and to carry `syscall`/`break`'s 20-bit code field.
        Format::R if matches!(shape.mnemonic, Mnemonic::Syscall | Mnemonic::Break) => {
            code20(word)
        }
        Format::R => 0,
        Format::I => imm16(word),
        Format::J => imm26(word),
    };

    FuncInstr {
        raw: word,
        format,
        op_class: shape.op_class,
        mnemonic: shape.mnemonic,
        src1: shape.src1,
        src2: shape.src2,
        dst: shape.dst,
        imm,
        v_src1: 0,
        v_src2: 0,
        v_dst: 0,
        mem_addr: 0,
        mem_size: match shape.mnemonic {
            Mnemonic::Lb | Mnemonic::Lbu | Mnemonic::Sb => 1,
            Mnemonic::Lh | Mnemonic::Lhu | Mnemonic::Sh => 2,
            Mnemonic::Lw | Mnemonic::Sw => 4,
            _ => 0,
        },
        pc,
        new_pc: pc.wrapping_add(4),
        complete: false,
        v_hi: None,
        v_lo: None,
        dst_written: shape.dst.is_some(),
        fault: None,
    }
}

fn decode_special(word: u32) -> Option<Shape> {
    let (s, t, d) = (rs(word), rt(word), rd(word));
    let mnemonic = match funct(word) {
        0x00 => Mnemonic::Sll,
        0x02 => Mnemonic::Srl,
        0x03 => Mnemonic::Sra,
        0x04 => Mnemonic::Sllv,
        0x06 => Mnemonic::Srlv,
        0x07 => Mnemonic::Srav,
        0x08 => Mnemonic::Jr,
        0x09 => Mnemonic::Jalr,
        0x0A => Mnemonic::Movz,
        0x0B => Mnemonic::Movn,
        0x0C => Mnemonic::Syscall,
        0x0D => Mnemonic::Break,
        0x10 => Mnemonic::Mfhi,
        0x11 => Mnemonic::Mthi,
        0x12 => Mnemonic::Mflo,
        0x13 => Mnemonic::Mtlo,
        0x18 => Mnemonic::Mult,
        0x19 => Mnemonic::Multu,
        0x1A => Mnemonic::Div,
        0x1B => Mnemonic::Divu,
        0x1E => Mnemonic::Trap,
        0x3F => Mnemonic::Halt,
        0x20 => Mnemonic::Add,
        0x21 => Mnemonic::Addu,
        0x22 => Mnemonic::Sub,
        0x23 => Mnemonic::Subu,
        0x24 => Mnemonic::And,
        0x25 => Mnemonic::Or,
        0x26 => Mnemonic::Xor,
        0x27 => Mnemonic::Nor,
        0x2A => Mnemonic::Slt,
        0x2B => Mnemonic::Sltu,
        _ => return None,
    };

    Some(match mnemonic {
        Mnemonic::Sll | Mnemonic::Srl | Mnemonic::Sra => Shape {
            op_class: OpClass::ShiftByAmount,
            mnemonic,
            src1: Some(t),
            src2: None,
            dst: Some(d),
        },
        Mnemonic::Sllv | Mnemonic::Srlv | Mnemonic::Srav => Shape {
            op_class: OpClass::ShiftR,
            mnemonic,
            src1: Some(t),
            src2: Some(s),
            dst: Some(d),
        },
        Mnemonic::Jr => Shape {
            op_class: OpClass::JumpR,
            mnemonic,
            src1: Some(s),
            src2: None,
            dst: None,
        },
        Mnemonic::Jalr => Shape {
            op_class: OpClass::JumpLinkR,
            mnemonic,
            src1: Some(s),
            src2: None,
            dst: Some(if d == 0 { 31 } else { d }),
        },
        Mnemonic::Syscall | Mnemonic::Break | Mnemonic::Trap | Mnemonic::Halt => Shape {
            op_class: OpClass::Special,
            mnemonic,
            src1: None,
            src2: None,
            dst: None,
        },
        Mnemonic::Mfhi | Mnemonic::Mflo => Shape {
            op_class: OpClass::Special,
            mnemonic,
            src1: None,
            src2: None,
            dst: Some(d),
        },
        Mnemonic::Mthi | Mnemonic::Mtlo => Shape {
            op_class: OpClass::Special,
            mnemonic,
            src1: Some(s),
            src2: None,
            dst: None,
        },
        Mnemonic::Mult | Mnemonic::Multu | Mnemonic::Div | Mnemonic::Divu => Shape {
            op_class: OpClass::Special,
            mnemonic,
            src1: Some(s),
            src2: Some(t),
            dst: None,
        },
        Mnemonic::Movn | Mnemonic::Movz => Shape {
            op_class: OpClass::Special,
            mnemonic,
            src1: Some(s),
            src2: Some(t),
            dst: Some(d),
        },
        Mnemonic::Add
        | Mnemonic::Addu
        | Mnemonic::Sub
        | Mnemonic::Subu
        | Mnemonic::And
        | Mnemonic::Or
        | Mnemonic::Xor
        | Mnemonic::Nor
        | Mnemonic::Slt
        | Mnemonic::Sltu => Shape {
            op_class: OpClass::ArithmeticR,
            mnemonic,
            src1: Some(s),
            src2: Some(t),
            dst: Some(d),
        },
        _ => unreachable!("every matched mnemonic above is handled by a preceding arm"),
    })
}

/// `SPECIAL2` (opcode `0b011100`): the multiply/accumulate extension. This
/// core implements only `mul` (funct `0x02`), the 32-bit truncated-product
/// pseudo-multiply; `madd`/`maddu`/`msub`/`msubu` are not modeled.
fn decode_special2(word: u32) -> Option<Shape> {
    let (s, t, d) = (rs(word), rt(word), rd(word));
    match funct(word) {
        0x02 => Some(Shape {
            op_class: OpClass::ArithmeticR,
            mnemonic: Mnemonic::Mul,
            src1: Some(s),
            src2: Some(t),
            dst: Some(d),
        }),
        _ => None,
    }
}

fn j_shape(mnemonic: Mnemonic) -> Option<Shape> {
    Some(Shape {
        op_class: if matches!(mnemonic, Mnemonic::Jal) {
            OpClass::JumpLinkJ
        } else {
            OpClass::JumpJ
        },
        mnemonic,
        src1: None,
        src2: None,
        dst: if matches!(mnemonic, Mnemonic::Jal) {
            Some(31)
        } else {
            None
        },
    })
}

fn branch_shape(mnemonic: Mnemonic, word: u32) -> Option<Shape> {
    Some(Shape {
        op_class: OpClass::Branch,
        mnemonic,
        src1: Some(rs(word)),
        src2: Some(rt(word)),
        dst: None,
    })
}

fn branch_vs_zero_shape(mnemonic: Mnemonic, word: u32) -> Option<Shape> {
    Some(Shape {
        op_class: OpClass::BranchVsZero,
        mnemonic,
        src1: Some(rs(word)),
        src2: None,
        dst: None,
    })
}

fn arith_i_shape(mnemonic: Mnemonic, word: u32) -> Option<Shape> {
    Some(Shape {
        op_class: OpClass::ArithmeticI,
        mnemonic,
        src1: Some(rs(word)),
        src2: None,
        dst: Some(rt(word)),
    })
}

fn lui_shape(word: u32) -> Option<Shape> {
    Some(Shape {
        op_class: OpClass::ConstLoad,
        mnemonic: Mnemonic::Lui,
        src1: None,
        src2: None,
        dst: Some(rt(word)),
    })
}

fn load_shape(mnemonic: Mnemonic, word: u32) -> Option<Shape> {
    let op_class = if matches!(mnemonic, Mnemonic::Lbu | Mnemonic::Lhu) {
        OpClass::LoadUnsigned
    } else {
        OpClass::Load
    };
    Some(Shape {
        op_class,
        mnemonic,
        src1: Some(rs(word)),
        src2: None,
        dst: Some(rt(word)),
    })
}

fn store_shape(mnemonic: Mnemonic, word: u32) -> Option<Shape> {
    Some(Shape {
        op_class: OpClass::Store,
        mnemonic,
        src1: Some(rs(word)),
        src2: Some(rt(word)),
        dst: None,
    })
}

/// The `HI`/`LO` virtual slot this mnemonic reads in place of a normal
/// `src1`, if any. `mfhi`/`mflo` have no source register in their encoding;
/// their operand comes from the auxiliary register file instead.
#[must_use]
pub fn implicit_src(mnemonic: Mnemonic) -> Option<RegNum> {
    match mnemonic {
        Mnemonic::Mfhi => Some(HI),
        Mnemonic::Mflo => Some(LO),
        _ => None,
    }
}

/// The `HI`/`LO` virtual slots this mnemonic writes in place of (or in
/// addition to) `dst`. `mult`/`div` write both; `mthi`/`mtlo` write one.
#[must_use]
pub fn implicit_dsts(mnemonic: Mnemonic) -> &'static [RegNum] {
    match mnemonic {
        Mnemonic::Mult | Mnemonic::Multu | Mnemonic::Div | Mnemonic::Divu => &[HI, LO],
        Mnemonic::Mthi => &[HI],
        Mnemonic::Mtlo => &[LO],
        _ => &[],
    }
}

/// Resolves the actual taken/not-taken outcome and target of a branch or
/// jump, given its already-captured operand values. Called twice in the
/// reference pipeline: by Decode (to detect a misprediction as early as
/// possible) and by Execute (to set the canonical `new_pc`/`v_dst` fields) —
/// sharing this function keeps the two resolutions from drifting apart.
/// Returns `None` for anything that isn't a jump or branch.
#[must_use]
pub fn resolve_branch(inst: &FuncInstr) -> Option<(bool, Addr)> {
    match inst.mnemonic {
        Mnemonic::Beq => Some(inst.v_src1 == inst.v_src2),
        Mnemonic::Bne => Some(inst.v_src1 != inst.v_src2),
        Mnemonic::Blez => Some((inst.v_src1 as i32) <= 0),
        Mnemonic::Bgtz => Some((inst.v_src1 as i32) > 0),
        Mnemonic::J | Mnemonic::Jal | Mnemonic::Jr | Mnemonic::Jalr => Some(true),
        _ => None,
    }
    .map(|taken| {
        let target = if !taken {
            inst.pc.wrapping_add(4)
        } else {
            match inst.mnemonic {
                Mnemonic::Jr | Mnemonic::Jalr => inst.v_src1,
                Mnemonic::J | Mnemonic::Jal => jump_target(inst.pc, inst.imm),
                _ => branch_target(inst.pc, inst.imm),
            }
        };
        (taken, target)
    })
}

/// Computes the branch-target PC for an instruction already known to be a
/// taken branch: `PC + 4 + (sign_extend(imm) << 2)`.
#[must_use]
pub fn branch_target(pc: Addr, imm: u32) -> Addr {
    let disp = sign_extend_imm16(imm) << 2;
    pc.wrapping_add(4).wrapping_add(disp)
}

/// Computes the absolute jump target for a J-type instruction:
/// `(PC & 0xF000_0000) | (imm26 << 2)`. `pc` here is the *delay-slot-free*
/// PC of the jump itself (this core has no branch delay slot).
#[must_use]
pub fn jump_target(pc: Addr, imm26: u32) -> Addr {
    (pc & 0xF000_0000) | (imm26 << 2)
}
