use serde::{Deserialize, Serialize};

use crate::decoder::{
    AluOp, Cond, Decoder, Insn, Op, Size, Slot, Source, SwapOrder, Width, INSN_SIZE,
};
use crate::endian::Endian;
use crate::fault::Fault;
use crate::regs::NUM_REGS;

// Instruction classes (bits 0..=2)
pub const BPF_LD: u8 = 0x00;
pub const BPF_LDX: u8 = 0x01;
pub const BPF_ST: u8 = 0x02;
pub const BPF_STX: u8 = 0x03;
pub const BPF_ALU: u8 = 0x04;
pub const BPF_JMP: u8 = 0x05;
pub const BPF_JMP32: u8 = 0x06;
pub const BPF_ALU64: u8 = 0x07;

// Source mode (bit 3)
pub const BPF_K: u8 = 0x00;
pub const BPF_X: u8 = 0x08;

// LD/ST size (bits 3..=4)
pub const BPF_W: u8 = 0x00;
pub const BPF_H: u8 = 0x08;
pub const BPF_B: u8 = 0x10;
pub const BPF_DW: u8 = 0x18;

// LD/ST mode (bits 5..=7)
pub const BPF_IMM: u8 = 0x00;
pub const BPF_ABS: u8 = 0x20;
pub const BPF_IND: u8 = 0x40;
pub const BPF_MEM: u8 = 0x60;
pub const BPF_XADD: u8 = 0xc0;

// ALU operations (bits 4..=7)
pub const BPF_ADD: u8 = 0x00;
pub const BPF_SUB: u8 = 0x10;
pub const BPF_MUL: u8 = 0x20;
pub const BPF_DIV: u8 = 0x30;
pub const BPF_OR: u8 = 0x40;
pub const BPF_AND: u8 = 0x50;
pub const BPF_LSH: u8 = 0x60;
pub const BPF_RSH: u8 = 0x70;
pub const BPF_NEG: u8 = 0x80;
pub const BPF_MOD: u8 = 0x90;
pub const BPF_XOR: u8 = 0xa0;
pub const BPF_MOV: u8 = 0xb0;
pub const BPF_ARSH: u8 = 0xc0;
pub const BPF_END: u8 = 0xd0;

// Jump operations (bits 4..=7)
pub const BPF_JA: u8 = 0x00;
pub const BPF_JEQ: u8 = 0x10;
pub const BPF_JGT: u8 = 0x20;
pub const BPF_JGE: u8 = 0x30;
pub const BPF_JSET: u8 = 0x40;
pub const BPF_JNE: u8 = 0x50;
pub const BPF_JSGT: u8 = 0x60;
pub const BPF_JSGE: u8 = 0x70;
pub const BPF_CALL: u8 = 0x80;
pub const BPF_EXIT: u8 = 0x90;
pub const BPF_JLT: u8 = 0xa0;
pub const BPF_JLE: u8 = 0xb0;
pub const BPF_JSLT: u8 = 0xc0;
pub const BPF_JSLE: u8 = 0xd0;

// Frequently used full opcodes
pub const ADD64_IMM: u8 = BPF_ALU64 | BPF_ADD | BPF_K; // 0x07
pub const ADD64_REG: u8 = BPF_ALU64 | BPF_ADD | BPF_X; // 0x0f
pub const SUB64_IMM: u8 = BPF_ALU64 | BPF_SUB | BPF_K; // 0x17
pub const SUB64_REG: u8 = BPF_ALU64 | BPF_SUB | BPF_X; // 0x1f
pub const LSH64_IMM: u8 = BPF_ALU64 | BPF_LSH | BPF_K; // 0x67
pub const LSH64_REG: u8 = BPF_ALU64 | BPF_LSH | BPF_X; // 0x6f
pub const RSH64_IMM: u8 = BPF_ALU64 | BPF_RSH | BPF_K; // 0x77
pub const RSH64_REG: u8 = BPF_ALU64 | BPF_RSH | BPF_X; // 0x7f
pub const ARSH64_IMM: u8 = BPF_ALU64 | BPF_ARSH | BPF_K; // 0xc7
pub const MOV64_IMM: u8 = BPF_ALU64 | BPF_MOV | BPF_K; // 0xb7
pub const MOV64_REG: u8 = BPF_ALU64 | BPF_MOV | BPF_X; // 0xbf
pub const MOV32_IMM: u8 = BPF_ALU | BPF_MOV | BPF_K; // 0xb4

pub const LE: u8 = BPF_ALU | BPF_END | BPF_K; // 0xd4
pub const BE: u8 = BPF_ALU | BPF_END | BPF_X; // 0xdc

pub const LD_DW_IMM: u8 = BPF_LD | BPF_IMM | BPF_DW; // 0x18
pub const LD_ABS_W: u8 = BPF_LD | BPF_ABS | BPF_W; // 0x20
pub const LD_ABS_H: u8 = BPF_LD | BPF_ABS | BPF_H; // 0x28
pub const LD_ABS_B: u8 = BPF_LD | BPF_ABS | BPF_B; // 0x30
pub const LD_ABS_DW: u8 = BPF_LD | BPF_ABS | BPF_DW; // 0x38
pub const LD_IND_W: u8 = BPF_LD | BPF_IND | BPF_W; // 0x40
pub const LD_IND_H: u8 = BPF_LD | BPF_IND | BPF_H; // 0x48
pub const LD_IND_B: u8 = BPF_LD | BPF_IND | BPF_B; // 0x50
pub const LD_IND_DW: u8 = BPF_LD | BPF_IND | BPF_DW; // 0x58

pub const LDX_W: u8 = BPF_LDX | BPF_MEM | BPF_W; // 0x61
pub const LDX_H: u8 = BPF_LDX | BPF_MEM | BPF_H; // 0x69
pub const LDX_B: u8 = BPF_LDX | BPF_MEM | BPF_B; // 0x71
pub const LDX_DW: u8 = BPF_LDX | BPF_MEM | BPF_DW; // 0x79
pub const ST_W: u8 = BPF_ST | BPF_MEM | BPF_W; // 0x62
pub const ST_H: u8 = BPF_ST | BPF_MEM | BPF_H; // 0x6a
pub const ST_B: u8 = BPF_ST | BPF_MEM | BPF_B; // 0x72
pub const ST_DW: u8 = BPF_ST | BPF_MEM | BPF_DW; // 0x7a
pub const STX_W: u8 = BPF_STX | BPF_MEM | BPF_W; // 0x63
pub const STX_H: u8 = BPF_STX | BPF_MEM | BPF_H; // 0x6b
pub const STX_B: u8 = BPF_STX | BPF_MEM | BPF_B; // 0x73
pub const STX_DW: u8 = BPF_STX | BPF_MEM | BPF_DW; // 0x7b
pub const XADD_W: u8 = BPF_STX | BPF_XADD | BPF_W; // 0xc3
pub const XADD_DW: u8 = BPF_STX | BPF_XADD | BPF_DW; // 0xdb

pub const JA: u8 = BPF_JMP | BPF_JA; // 0x05
pub const CALL: u8 = BPF_JMP | BPF_CALL; // 0x85
pub const EXIT: u8 = BPF_JMP | BPF_EXIT; // 0x95

/// One instruction word exactly as it sits on the wire.
///
/// ```text
/// byte 0    : opcode
/// byte 1    : dst | src      (nibble order follows the byte order)
/// bytes 2-3 : offset, i16
/// bytes 4-7 : immediate, i32
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawInsn {
    pub opcode: u8,
    pub dst: u8,
    pub src: u8,
    pub off: i16,
    pub imm: i32,
}

impl RawInsn {
    pub const fn new(opcode: u8, dst: u8, src: u8, off: i16, imm: i32) -> Self {
        Self {
            opcode,
            dst,
            src,
            off,
            imm,
        }
    }

    /// Continuation word carrying the high half of a wide immediate.
    pub const fn continuation(imm_hi: i32) -> Self {
        Self::new(0, 0, 0, 0, imm_hi)
    }

    pub fn from_bytes(endian: Endian, b: &[u8; INSN_SIZE]) -> Self {
        let (dst, src) = endian.split_regs(b[1]);
        Self {
            opcode: b[0],
            dst,
            src,
            off: endian.read_i16([b[2], b[3]]),
            imm: endian.read_i32([b[4], b[5], b[6], b[7]]),
        }
    }

    pub fn to_bytes(&self, endian: Endian) -> [u8; INSN_SIZE] {
        let off = endian.i16_bytes(self.off);
        let imm = endian.i32_bytes(self.imm);
        [
            self.opcode,
            endian.pack_regs(self.dst, self.src),
            off[0],
            off[1],
            imm[0],
            imm[1],
            imm[2],
            imm[3],
        ]
    }
}

/// Concatenates instruction words into a program image.
pub fn assemble(endian: Endian, insns: &[RawInsn]) -> Vec<u8> {
    insns.iter().flat_map(|i| i.to_bytes(endian)).collect()
}

/// Splits a 64-bit immediate into the `lddw` word pair.
pub fn lddw(dst: u8, imm: u64) -> [RawInsn; 2] {
    [
        RawInsn::new(LD_DW_IMM, dst, 0, 0, imm as u32 as i32),
        RawInsn::continuation((imm >> 32) as u32 as i32),
    ]
}

/// Decoder for the eBPF instruction set.
#[derive(Debug, Clone, Copy)]
pub struct EbpfDecoder {
    /// Byte-swap instructions with an immediate above 32 take a
    /// continuation word.
    pub wide_byteswap: bool,
}

impl Default for EbpfDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EbpfDecoder {
    pub fn new() -> Self {
        Self { wide_byteswap: true }
    }

    pub fn with_wide_byteswap(wide_byteswap: bool) -> Self {
        Self { wide_byteswap }
    }

    fn op_for(&self, raw: &RawInsn) -> Option<Op> {
        let opcode = raw.opcode;
        let class = opcode & 0x07;
        match class {
            BPF_ALU | BPF_ALU64 => {
                let width = if class == BPF_ALU64 { Width::W64 } else { Width::W32 };
                let source = if opcode & BPF_X != 0 { Source::Reg } else { Source::Imm };
                let op = match opcode & 0xf0 {
                    BPF_ADD => AluOp::Add,
                    BPF_SUB => AluOp::Sub,
                    BPF_MUL => AluOp::Mul,
                    BPF_DIV => AluOp::Div,
                    BPF_OR => AluOp::Or,
                    BPF_AND => AluOp::And,
                    BPF_LSH => AluOp::Lsh,
                    BPF_RSH => AluOp::Rsh,
                    BPF_NEG if source == Source::Imm => AluOp::Neg,
                    BPF_MOD => AluOp::Mod,
                    BPF_XOR => AluOp::Xor,
                    BPF_MOV => AluOp::Mov,
                    BPF_ARSH => AluOp::Arsh,
                    BPF_END if class == BPF_ALU => {
                        let order = if source == Source::Reg {
                            SwapOrder::ToBe
                        } else {
                            SwapOrder::ToLe
                        };
                        let bits = match raw.imm {
                            16 => 16,
                            32 => 32,
                            64 => 64,
                            _ => return None,
                        };
                        return Some(Op::Swap { order, bits });
                    }
                    _ => return None,
                };
                Some(Op::Alu { op, width, source })
            }
            BPF_JMP | BPF_JMP32 => {
                let width = if class == BPF_JMP { Width::W64 } else { Width::W32 };
                let source = if opcode & BPF_X != 0 { Source::Reg } else { Source::Imm };
                let cond = match opcode & 0xf0 {
                    BPF_JA if opcode == JA => return Some(Op::Ja),
                    BPF_CALL if opcode == CALL => return Some(Op::Call),
                    BPF_EXIT if opcode == EXIT => return Some(Op::Exit),
                    BPF_JEQ => Cond::Eq,
                    BPF_JGT => Cond::Gt,
                    BPF_JGE => Cond::Ge,
                    BPF_JSET => Cond::Set,
                    BPF_JNE => Cond::Ne,
                    BPF_JSGT => Cond::Sgt,
                    BPF_JSGE => Cond::Sge,
                    BPF_JLT => Cond::Lt,
                    BPF_JLE => Cond::Le,
                    BPF_JSLT => Cond::Slt,
                    BPF_JSLE => Cond::Sle,
                    _ => return None,
                };
                Some(Op::Jmp { cond, width, source })
            }
            BPF_LD => {
                let size = size_of(opcode);
                match opcode & 0xe0 {
                    BPF_IMM if size == Size::DW => Some(Op::LoadImm64),
                    BPF_ABS => Some(Op::LoadPacket { size, indirect: false }),
                    BPF_IND => Some(Op::LoadPacket { size, indirect: true }),
                    _ => None,
                }
            }
            BPF_LDX if opcode & 0xe0 == BPF_MEM => Some(Op::Load { size: size_of(opcode) }),
            BPF_ST if opcode & 0xe0 == BPF_MEM => Some(Op::Store {
                size: size_of(opcode),
                source: Source::Imm,
            }),
            BPF_STX => {
                let size = size_of(opcode);
                match opcode & 0xe0 {
                    BPF_MEM => Some(Op::Store {
                        size,
                        source: Source::Reg,
                    }),
                    BPF_XADD if matches!(size, Size::W | Size::DW) => {
                        Some(Op::AtomicAdd { size })
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn is_wide(&self, op: &Op, raw: &RawInsn) -> bool {
        match op {
            Op::LoadImm64 => true,
            Op::Swap { .. } => self.wide_byteswap && raw.imm > 32,
            _ => false,
        }
    }
}

fn size_of(opcode: u8) -> Size {
    match opcode & 0x18 {
        BPF_W => Size::W,
        BPF_H => Size::H,
        BPF_B => Size::B,
        _ => Size::DW,
    }
}

fn word(bytes: &[u8], at: usize) -> Option<[u8; INSN_SIZE]> {
    bytes.get(at..at + INSN_SIZE)?.try_into().ok()
}

impl Decoder for EbpfDecoder {
    fn decode(&self, endian: Endian, bytes: &[u8]) -> Result<Slot, Fault> {
        let first = word(bytes, 0).ok_or(Fault::Truncated {
            remaining: bytes.len(),
            needed: INSN_SIZE,
        })?;
        let raw = RawInsn::from_bytes(endian, &first);

        for reg in [raw.dst, raw.src] {
            if reg as usize >= NUM_REGS {
                return Err(Fault::InvalidRegister { reg });
            }
        }

        let op = self.op_for(&raw).ok_or(Fault::UnsupportedOpcode {
            opcode: raw.opcode,
        })?;
        let mut insn = Insn {
            op,
            opcode: raw.opcode,
            dst: raw.dst,
            src: raw.src,
            off: raw.off,
            imm: raw.imm as i64,
        };

        if !self.is_wide(&op, &raw) {
            return Ok(Slot::Single(insn));
        }

        let second = word(bytes, INSN_SIZE).ok_or(Fault::Truncated {
            remaining: bytes.len(),
            needed: 2 * INSN_SIZE,
        })?;
        let next = RawInsn::from_bytes(endian, &second);
        if next.opcode != 0 || next.dst != 0 || next.src != 0 || next.off != 0 {
            return Err(Fault::BadContinuation { raw: second });
        }
        insn.imm = (((next.imm as u32 as u64) << 32) | raw.imm as u32 as u64) as i64;
        Ok(Slot::Wide(insn))
    }
}
