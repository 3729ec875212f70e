use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use ebpf_disasm::{analyze, sweep};
use ebpf_vm::isa::ebpf::EbpfDecoder;
use ebpf_vm::loader::{load_elf_section, load_section};
use ebpf_vm::Endian;

#[derive(Parser, Debug)]
#[command(author, version, about = "eBPF disassembler CLI", long_about = None)]
struct Cli {
    /// Compiled object (with --section) or raw section bytes
    #[arg(value_name = "FILE")]
    input: PathBuf,
    /// ELF section to disassemble; byte order comes from the object
    #[arg(long, value_name = "NAME", conflicts_with_all = ["skip", "len", "big_endian"])]
    section: Option<String>,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Decode as big-endian
    #[arg(long)]
    big_endian: bool,
    /// Treat be64/le64 as single-word instructions
    #[arg(long)]
    narrow_byteswap: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Linear listing of the whole section
    List {
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Basic blocks and control-flow edges reachable from the first instruction
    Analyze {
        /// Maximum instructions to decode before stopping
        #[arg(long, default_value_t = 100_000usize)]
        max_instr: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write analysis output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

fn emit(out: Option<PathBuf>, text: String) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (code, endian) = match &cli.section {
        Some(name) => {
            let elf = load_elf_section(&cli.input, name)?;
            (elf.bytes, elf.endian)
        }
        None => {
            let code = load_section(&cli.input, cli.skip, cli.len)?;
            (code, if cli.big_endian { Endian::Big } else { Endian::Little })
        }
    };
    let dec = EbpfDecoder::with_wide_byteswap(!cli.narrow_byteswap);

    match cli.cmd {
        Command::List { show_bytes, out } => {
            let mut buf = String::new();
            for line in sweep(&dec, endian, &code) {
                if show_bytes {
                    let _ = write!(buf, "{:04}: ", line.pc);
                    for b in &line.bytes { let _ = write!(buf, "{b:02x} "); }
                    let _ = writeln!(buf, "  {}", line.text);
                } else {
                    let _ = writeln!(buf, "{:04}: {}", line.pc, line.text);
                }
            }
            emit(out, buf)?;
        }
        Command::Analyze { max_instr, format, out } => {
            let report = analyze(&dec, endian, &code, max_instr);
            let text = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
                OutputFormat::Text => {
                    let mut buf = String::new();
                    let _ = writeln!(buf, "Analysis summary:");
                    let _ = writeln!(buf, "  blocks : {}", report.blocks.len());
                    let _ = writeln!(buf, "  edges  : {}", report.edges.len());
                    let _ = writeln!(buf, "  exits  : {:?}", report.exits);
                    if !report.out_of_range.is_empty() {
                        let _ = writeln!(buf, "  out-of-range jumps: {:?}", report.out_of_range);
                    }
                    for b in &report.blocks {
                        let _ = writeln!(buf, "\nblock_{:04} [{}, {}):", b.start, b.start, b.end);
                        for i in &b.insns { let _ = writeln!(buf, "  {i}"); }
                    }
                    let _ = writeln!(buf, "\nEdges:");
                    for e in &report.edges {
                        let _ = writeln!(buf, "  {:04} -> {:04} ({:?})", e.from, e.to, e.kind);
                    }
                    buf
                }
            };
            emit(out, text)?;
        }
    }

    Ok(())
}
