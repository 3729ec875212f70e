use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ebpf_vm::helpers::{trace_printk, TRACE_PRINTK};
use ebpf_vm::isa::ebpf::EbpfDecoder;
use ebpf_vm::loader::{load_elf_section, load_section};
use ebpf_vm::regs::Registers;
use ebpf_vm::trace::{fmt_regs, TraceFlags, TraceSink};
use ebpf_vm::{Bus, Cpu, CpuConfig, Endian, Env, HelperTable, IntExecutor, LinearMemory};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an eBPF code section on the ebpf-vm interpreter")]
struct Opts {
    /// Compiled object (with --section) or raw section bytes
    #[arg(value_name = "FILE")]
    input: PathBuf,
    /// ELF section holding the program, e.g. `socket1`
    #[arg(long, value_name = "NAME", conflicts_with_all = ["skip", "len"])]
    section: Option<String>,
    /// Skip N bytes at start of a raw dump before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Byte order; taken from the ELF header when omitted, else little
    #[arg(long, value_enum)]
    endian: Option<ByteOrder>,
    /// Print each instruction before it runs; repeat to also dump registers
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Stop with a fault after this many instructions
    #[arg(long, default_value_t = 10_000_000u64)]
    max_steps: u64,
    #[arg(long, default_value_t = ebpf_vm::memory::STACK_SIZE)]
    stack_size: usize,
    /// Treat be64/le64 as single-word instructions
    #[arg(long)]
    narrow_byteswap: bool,
    /// File served to ld_abs/ld_ind loads
    #[arg(long, value_name = "FILE")]
    packet: Option<PathBuf>,
    /// Print the final machine state as JSON
    #[arg(long)]
    json: bool,
}

struct Stdout;

impl TraceSink for Stdout {
    fn insn(&mut self, pc: usize, text: &str) {
        println!("{pc:04}: {text}");
    }

    fn regs(&mut self, _pc: usize, regs: &Registers) {
        println!("      {}", fmt_regs(regs));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let (section, object_endian) = match &opts.section {
        Some(name) => {
            let elf = load_elf_section(&opts.input, name)
                .with_context(|| format!("loading {}", opts.input.display()))?;
            (elf.bytes, Some(elf.endian))
        }
        None => {
            let raw = load_section(&opts.input, opts.skip, opts.len)
                .with_context(|| format!("loading {}", opts.input.display()))?;
            (raw, None)
        }
    };

    let endian = match opts.endian {
        Some(ByteOrder::Little) => Endian::Little,
        Some(ByteOrder::Big) => Endian::Big,
        None => object_endian.unwrap_or_default(),
    };
    tracing::debug!(?endian, bytes = section.len(), "loaded program");

    let cfg = CpuConfig {
        endian,
        stack_size: opts.stack_size,
        max_steps: Some(opts.max_steps),
    };
    let mut cpu = Cpu::new(cfg);
    cpu.load(section);

    let dec = EbpfDecoder::with_wide_byteswap(!opts.narrow_byteswap);
    let exec = IntExecutor;

    let mut helpers = HelperTable::new();
    helpers.register(TRACE_PRINTK, "trace_printk", trace_printk);

    let mut packet = match &opts.packet {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let packet = LinearMemory::from_bytes(bytes);
            if packet.is_empty() {
                tracing::warn!(path = %path.display(), "packet file is empty; every ld_abs/ld_ind will fault");
            }
            Some(packet)
        }
        None => None,
    };

    let mut sink = Stdout;
    let flags = match opts.verbose {
        0 => TraceFlags::empty(),
        1 => TraceFlags::INSN,
        _ => TraceFlags::INSN | TraceFlags::REGS,
    };

    let mut env = Env::new().with_helpers(&mut helpers);
    if let Some(p) = packet.as_mut() {
        env = env.with_packet(p);
    }
    if !flags.is_empty() {
        env = env.with_trace(&mut sink, flags);
    }

    let result = cpu.run(&dec, &exec, &mut env);
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&cpu)?);
    }
    let r0 = result?;
    println!("r0 = {r0} ({r0:#x}) after {} instruction(s)", cpu.steps);
    Ok(())
}
