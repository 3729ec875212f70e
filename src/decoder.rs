use serde::{Deserialize, Serialize};

use crate::endian::Endian;
use crate::fault::Fault;

/// Size of one instruction word in bytes.
pub const INSN_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    W32,
    W64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Or,
    And,
    Lsh,
    Rsh,
    Neg,
    Mod,
    Xor,
    Mov,
    Arsh,
}

/// Second operand of ALU and jump instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Reg,
    Imm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapOrder {
    ToLe,
    ToBe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Size {
    B,
    H,
    W,
    DW,
}

impl Size {
    pub fn bytes(self) -> usize {
        match self {
            Size::B => 1,
            Size::H => 2,
            Size::W => 4,
            Size::DW => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cond {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Sgt,
    Sge,
    Slt,
    Sle,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// `dst = dst <op> src|imm`
    Alu { op: AluOp, width: Width, source: Source },
    /// `dst = to_le|to_be(dst)` over `bits` bits
    Swap { order: SwapOrder, bits: u32 },
    /// `dst = imm64`
    LoadImm64,
    /// `r0 = packet[imm]` or `r0 = packet[src + imm]`
    LoadPacket { size: Size, indirect: bool },
    /// `dst = [src + off]`
    Load { size: Size },
    /// `[dst + off] = src|imm`
    Store { size: Size, source: Source },
    /// `[dst + off] += src`
    AtomicAdd { size: Size },
    Ja,
    Jmp { cond: Cond, width: Width, source: Source },
    Call,
    Exit,
}

/// One decoded instruction, ready for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insn {
    pub op: Op,
    pub opcode: u8,
    pub dst: u8,
    pub src: u8,
    pub off: i16,
    /// Sign-extended 32-bit immediate, or the full 64-bit wide immediate.
    pub imm: i64,
}

/// Decoder output: the instruction and how many words it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Single(Insn),
    Wide(Insn),
}

impl Slot {
    pub fn insn(&self) -> &Insn {
        match self {
            Slot::Single(i) | Slot::Wide(i) => i,
        }
    }

    pub fn words(&self) -> usize {
        match self {
            Slot::Single(_) => 1,
            Slot::Wide(_) => 2,
        }
    }
}

pub trait Decoder {
    /// Decodes the instruction at the start of `bytes`.
    fn decode(&self, endian: Endian, bytes: &[u8]) -> Result<Slot, Fault>;
}
