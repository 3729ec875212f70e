use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::regs::Registers;

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFlags: u8 {
const INSN = 1 << 0; // disassembly of each instruction before it runs
const REGS = 1 << 1; // register file after each instruction
}
}

/// Observer for the fetch-execute loop. Has no effect on machine state.
pub trait TraceSink {
    fn insn(&mut self, pc: usize, text: &str);

    fn regs(&mut self, _pc: usize, _regs: &Registers) {}
}

/// Keeps every trace line in memory.
#[derive(Debug, Default, Clone)]
pub struct TraceLog {
    pub lines: Vec<String>,
}

impl TraceSink for TraceLog {
    fn insn(&mut self, pc: usize, text: &str) {
        self.lines.push(format!("{pc:04}: {text}"));
    }

    fn regs(&mut self, pc: usize, regs: &Registers) {
        self.lines.push(format!("{pc:04}: {}", fmt_regs(regs)));
    }
}

pub fn fmt_regs(regs: &Registers) -> String {
    regs.as_array()
        .iter()
        .enumerate()
        .map(|(i, v)| format!("r{i}={v:#x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
