use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::decoder::{Decoder, INSN_SIZE};
use crate::disasm::fmt_insn;
use crate::endian::Endian;
use crate::exec::{Env, Executor, Flow};
use crate::fault::{Fault, FaultClass, Trap};
use crate::memory::{Stack, STACK_SIZE};
use crate::regs::Registers;
use crate::trace::TraceFlags;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CpuConfig {
    /// Byte order of the loaded object, fixed for the run.
    pub endian: Endian,
    pub stack_size: usize,
    /// Watchdog for [`Cpu::run`]; `None` runs until exit or fault.
    pub max_steps: Option<u64>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            stack_size: STACK_SIZE,
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Running,
    Exited,
    Faulted(FaultClass),
}

/// Result of one fetch-execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    /// Program executed `exit`; carries r0.
    Exited(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub pc: usize, // in instruction words
    pub regs: Registers,
    pub stack: Stack,
    pub state: RunState,
    pub steps: u64,
    pub cfg: CpuConfig,
    program: Vec<u8>,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        let mut cpu = Self {
            pc: 0,
            regs: Registers::default(),
            stack: Stack::new(cfg.stack_size),
            state: RunState::Running,
            steps: 0,
            cfg,
            program: Vec::new(),
        };
        cpu.reset();
        cpu
    }

    /// Clears registers and stack, rewinds to the first instruction and
    /// points r10 at the top of the stack.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.regs = Registers::default();
        self.regs.set_frame_pointer(self.stack.len() as u64);
        self.stack.clear();
        self.state = RunState::Running;
        self.steps = 0;
    }

    /// Installs the bytes of one code section and resets the machine.
    pub fn load(&mut self, section: impl Into<Vec<u8>>) {
        self.program = section.into();
        self.reset();
    }

    pub fn load_from<R: Read>(&mut self, mut section: R) -> std::io::Result<()> {
        let mut program = Vec::new();
        section.read_to_end(&mut program)?;
        self.load(program);
        Ok(())
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Program length in instruction words.
    pub fn program_words(&self) -> usize {
        self.program.len() / INSN_SIZE
    }

    fn raw_at(&self, pc: usize) -> Option<[u8; INSN_SIZE]> {
        let start = pc.checked_mul(INSN_SIZE)?;
        self.program.get(start..start + INSN_SIZE)?.try_into().ok()
    }

    fn trap(&mut self, pc: usize, fault: Fault) -> Trap {
        if !matches!(fault, Fault::Halted { .. }) {
            self.state = RunState::Faulted(fault.class());
        }
        let trap = Trap {
            pc,
            raw: self.raw_at(pc),
            fault,
        };
        tracing::warn!(%trap, "fault");
        trap
    }

    pub fn step<D: Decoder, X: Executor>(
        &mut self,
        dec: &D,
        exec: &X,
        env: &mut Env<'_>,
    ) -> Result<Status, Trap> {
        let pc = self.pc;
        if self.state != RunState::Running {
            let state = self.state;
            return Err(self.trap(pc, Fault::Halted { state }));
        }

        let bytes = self
            .program
            .get(pc.saturating_mul(INSN_SIZE)..)
            .unwrap_or_default();
        let slot = match dec.decode(self.cfg.endian, bytes) {
            Ok(slot) => slot,
            Err(fault) => return Err(self.trap(pc, fault)),
        };
        let d = *slot.insn();

        tracing::trace!(pc, insn = %fmt_insn(&d), "exec");
        if let Some((sink, flags)) = env.trace.as_mut() {
            if flags.contains(TraceFlags::INSN) {
                sink.insn(pc, &fmt_insn(&d));
            }
        }

        let flow = match exec.exec(self, env, &d) {
            Ok(flow) => flow,
            Err(fault) => return Err(self.trap(pc, fault)),
        };

        if let Some((sink, flags)) = env.trace.as_mut() {
            if flags.contains(TraceFlags::REGS) {
                sink.regs(pc, &self.regs);
            }
        }

        match flow {
            Flow::Next => self.pc = pc + slot.words(),
            Flow::Branch(off) => {
                let target = pc as i64 + 1 + off as i64;
                let len = self.program_words();
                if target < 0 || target as usize >= len {
                    return Err(self.trap(pc, Fault::JumpOutOfRange { target, len }));
                }
                self.pc = target as usize;
            }
            Flow::Exit => {
                self.steps += 1;
                self.state = RunState::Exited;
                let r0 = self.regs.as_array()[0];
                tracing::debug!(pc, r0, steps = self.steps, "exit");
                return Ok(Status::Exited(r0));
            }
        }
        self.steps += 1;
        Ok(Status::Running)
    }

    /// Steps until `exit`, returning r0.
    pub fn run<D: Decoder, X: Executor>(
        &mut self,
        dec: &D,
        exec: &X,
        env: &mut Env<'_>,
    ) -> Result<u64, Trap> {
        loop {
            if let Some(limit) = self.cfg.max_steps {
                if self.steps >= limit {
                    let pc = self.pc;
                    return Err(self.trap(pc, Fault::BudgetExhausted { limit }));
                }
            }
            if let Status::Exited(r0) = self.step(dec, exec, env)? {
                return Ok(r0);
            }
        }
    }
}
