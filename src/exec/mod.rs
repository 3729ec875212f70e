pub mod alu;
pub mod jmp;
pub mod mem;

use crate::cpu::Cpu;
use crate::decoder::{Insn, Op, Source, Width};
use crate::fault::Fault;
use crate::helpers::HelperTable;
use crate::memory::Bus;
use crate::trace::{TraceFlags, TraceSink};

/// What the loop does with the program counter after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fall through to the next instruction.
    Next,
    /// `pc = pc + 1 + off`
    Branch(i16),
    Exit,
}

/// Collaborators the core calls out to but does not own.
#[derive(Default)]
pub struct Env<'a> {
    pub helpers: Option<&'a mut HelperTable>,
    pub packet: Option<&'a mut dyn Bus>,
    pub trace: Option<(&'a mut dyn TraceSink, TraceFlags)>,
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_helpers(mut self, helpers: &'a mut HelperTable) -> Self {
        self.helpers = Some(helpers);
        self
    }

    pub fn with_packet(mut self, packet: &'a mut dyn Bus) -> Self {
        self.packet = Some(packet);
        self
    }

    pub fn with_trace(mut self, sink: &'a mut dyn TraceSink, flags: TraceFlags) -> Self {
        self.trace = Some((sink, flags));
        self
    }
}

pub trait Executor {
    fn exec(&self, cpu: &mut Cpu, env: &mut Env<'_>, d: &Insn) -> Result<Flow, Fault>;
}

pub struct IntExecutor;

impl IntExecutor {
    fn operand(cpu: &Cpu, source: Source, width: Width, d: &Insn) -> Result<u64, Fault> {
        match (source, width) {
            (Source::Reg, _) => cpu.regs.read(d.src),
            (Source::Imm, Width::W64) => Ok(d.imm as u64),
            (Source::Imm, Width::W32) => Ok(d.imm as u32 as u64),
        }
    }
}

impl Executor for IntExecutor {
    fn exec(&self, cpu: &mut Cpu, env: &mut Env<'_>, d: &Insn) -> Result<Flow, Fault> {
        match d.op {
            Op::Alu { op, width, source } => {
                let lhs = cpu.regs.read(d.dst)?;
                let rhs = Self::operand(cpu, source, width, d)?;
                cpu.regs.write(d.dst, alu::execute(op, width, lhs, rhs))?;
            }
            Op::Swap { order, bits } => {
                let v = cpu.regs.read(d.dst)?;
                cpu.regs.write(d.dst, alu::swap(cpu.cfg.endian, order, bits, v))?;
            }
            Op::LoadImm64 => cpu.regs.write(d.dst, d.imm as u64)?,
            Op::LoadPacket { size, indirect } => {
                let packet = env.packet.as_deref_mut().ok_or(Fault::NoPacket)?;
                let index = indirect.then_some(d.src);
                mem::load_packet(cpu, packet, size, index, d.imm)?;
            }
            Op::Load { size } => mem::load(cpu, size, d.dst, d.src, d.off)?,
            Op::Store { size, source } => {
                let value = mem::store_operand(cpu, source, d.src, d.imm)?;
                mem::store(cpu, size, value, d.dst, d.off)?;
            }
            Op::AtomicAdd { size } => mem::atomic_add(cpu, size, d.src, d.dst, d.off)?,
            Op::Ja => return Ok(Flow::Branch(d.off)),
            Op::Jmp { cond, width, source } => {
                let lhs = cpu.regs.read(d.dst)?;
                let rhs = Self::operand(cpu, source, width, d)?;
                if jmp::taken(cond, width, lhs, rhs) {
                    return Ok(Flow::Branch(d.off));
                }
            }
            Op::Call => {
                let id = d.imm as u32;
                let helpers = env
                    .helpers
                    .as_deref_mut()
                    .ok_or(Fault::UnknownHelper { id })?;
                let args = cpu.regs.args();
                let ret = helpers.call(id, &args, &mut cpu.stack)?;
                cpu.regs.write(0, ret)?;
            }
            Op::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Next)
    }
}
