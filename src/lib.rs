pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod endian;
pub mod exec;
pub mod fault;
pub mod helpers;
pub mod loader;
pub mod memory;
pub mod regs;
pub mod trace;

pub mod isa {
    pub mod ebpf;
}

pub use cpu::{Cpu, CpuConfig, RunState, Status};
pub use endian::Endian;
pub use exec::{Env, IntExecutor};
pub use fault::{Fault, FaultClass, Trap};
pub use helpers::HelperTable;
pub use memory::{Bus, LinearMemory, Stack};
