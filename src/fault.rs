use anyhow::Error;
use serde::{Deserialize, Serialize};

use crate::cpu::RunState;

/// Coarse fault families, used for diagnostics and the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultClass {
    /// Instruction bytes could not be decoded.
    Decode,
    /// Register id out of range or write to the frame pointer.
    Register,
    /// Stack or packet access outside its region.
    Memory,
    /// Well-formed encoding with no defined operation.
    Opcode,
    /// Helper dispatch failed.
    Call,
    /// Control transfer or loop-level failure.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Stack,
    Packet,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Stack => f.write_str("stack"),
            Region::Packet => f.write_str("packet"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Fault {
    #[error("truncated instruction stream: {remaining} byte(s) left, {needed} needed")]
    Truncated { remaining: usize, needed: usize },
    #[error("malformed wide-immediate continuation word {raw:02x?}")]
    BadContinuation { raw: [u8; 8] },
    #[error("invalid register r{reg}")]
    InvalidRegister { reg: u8 },
    #[error("write to read-only frame pointer r10")]
    FrameRegisterWrite,
    #[error("{region} access out of bounds: addr {addr}, len {len}")]
    MemoryBounds { region: Region, addr: i64, len: usize },
    #[error("unsupported opcode {opcode:#04x}")]
    UnsupportedOpcode { opcode: u8 },
    #[error("call to unknown helper {id}")]
    UnknownHelper { id: u32 },
    #[error("helper {id} failed: {source}")]
    Helper {
        id: u32,
        #[source]
        source: Error,
    },
    #[error("packet load without an attached packet buffer")]
    NoPacket,
    #[error("packet read at {addr:#x} failed: {source}")]
    Packet {
        addr: u64,
        #[source]
        source: Error,
    },
    #[error("jump target {target} outside program of {len} word(s)")]
    JumpOutOfRange { target: i64, len: usize },
    #[error("instruction budget of {limit} exhausted")]
    BudgetExhausted { limit: u64 },
    #[error("machine is {state:?}, no further instructions execute")]
    Halted { state: RunState },
}

impl Fault {
    pub fn class(&self) -> FaultClass {
        match self {
            Fault::Truncated { .. } | Fault::BadContinuation { .. } => FaultClass::Decode,
            Fault::InvalidRegister { .. } | Fault::FrameRegisterWrite => FaultClass::Register,
            Fault::MemoryBounds { .. } | Fault::NoPacket | Fault::Packet { .. } => {
                FaultClass::Memory
            }
            Fault::UnsupportedOpcode { .. } => FaultClass::Opcode,
            Fault::UnknownHelper { .. } | Fault::Helper { .. } => FaultClass::Call,
            Fault::JumpOutOfRange { .. } | Fault::BudgetExhausted { .. } | Fault::Halted { .. } => {
                FaultClass::Control
            }
        }
    }
}

/// A fault pinned to the instruction that raised it.
#[derive(thiserror::Error, Debug)]
#[error("fault at pc {pc} [{}]: {fault}", fmt_raw(.raw))]
pub struct Trap {
    pub pc: usize,
    pub raw: Option<[u8; 8]>,
    #[source]
    pub fault: Fault,
}

fn fmt_raw(raw: &Option<[u8; 8]>) -> String {
    match raw {
        Some(bytes) => bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" "),
        None => "no bytes".to_string(),
    }
}
