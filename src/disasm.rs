use crate::decoder::{AluOp, Cond, Insn, Op, Size, Source, SwapOrder, Width};

fn alu_mnemonic(op: AluOp) -> &'static str {
    match op {
        AluOp::Add => "add",
        AluOp::Sub => "sub",
        AluOp::Mul => "mul",
        AluOp::Div => "div",
        AluOp::Or => "or",
        AluOp::And => "and",
        AluOp::Lsh => "lsh",
        AluOp::Rsh => "rsh",
        AluOp::Neg => "neg",
        AluOp::Mod => "mod",
        AluOp::Xor => "xor",
        AluOp::Mov => "mov",
        AluOp::Arsh => "arsh",
    }
}

fn cond_mnemonic(cond: Cond) -> &'static str {
    match cond {
        Cond::Eq => "jeq",
        Cond::Ne => "jne",
        Cond::Gt => "jgt",
        Cond::Ge => "jge",
        Cond::Lt => "jlt",
        Cond::Le => "jle",
        Cond::Sgt => "jsgt",
        Cond::Sge => "jsge",
        Cond::Slt => "jslt",
        Cond::Sle => "jsle",
        Cond::Set => "jset",
    }
}

fn size_suffix(size: Size) -> &'static str {
    match size {
        Size::B => "b",
        Size::H => "h",
        Size::W => "w",
        Size::DW => "dw",
    }
}

fn suffix32(width: Width) -> &'static str {
    match width {
        Width::W32 => "32",
        Width::W64 => "",
    }
}

fn mem(base: u8, off: i16) -> String {
    format!("[r{base}{off:+}]")
}

/// Renders one decoded instruction in the usual eBPF assembly syntax.
pub fn fmt_insn(d: &Insn) -> String {
    match d.op {
        Op::Alu { op: AluOp::Neg, width, .. } => format!("neg{} r{}", suffix32(width), d.dst),
        Op::Alu { op, width, source } => {
            let mn = format!("{}{}", alu_mnemonic(op), suffix32(width));
            match source {
                Source::Reg => format!("{mn} r{}, r{}", d.dst, d.src),
                Source::Imm => format!("{mn} r{}, {}", d.dst, d.imm),
            }
        }
        Op::Swap { order, bits } => {
            let mn = match order {
                SwapOrder::ToLe => "le",
                SwapOrder::ToBe => "be",
            };
            format!("{mn}{bits} r{}", d.dst)
        }
        Op::LoadImm64 => format!("lddw r{}, {:#x}", d.dst, d.imm as u64),
        Op::LoadPacket { size, indirect: false } => {
            format!("ldabs{} {}", size_suffix(size), d.imm)
        }
        Op::LoadPacket { size, indirect: true } => {
            format!("ldind{} r{}, {}", size_suffix(size), d.src, d.imm)
        }
        Op::Load { size } => format!("ldx{} r{}, {}", size_suffix(size), d.dst, mem(d.src, d.off)),
        Op::Store { size, source: Source::Imm } => {
            format!("st{} {}, {}", size_suffix(size), mem(d.dst, d.off), d.imm)
        }
        Op::Store { size, source: Source::Reg } => {
            format!("stx{} {}, r{}", size_suffix(size), mem(d.dst, d.off), d.src)
        }
        Op::AtomicAdd { size } => {
            format!("xadd{} {}, r{}", size_suffix(size), mem(d.dst, d.off), d.src)
        }
        Op::Ja => format!("ja {:+}", d.off),
        Op::Jmp { cond, width, source } => {
            let mn = format!("{}{}", cond_mnemonic(cond), suffix32(width));
            match source {
                Source::Reg => format!("{mn} r{}, r{}, {:+}", d.dst, d.src, d.off),
                Source::Imm => format!("{mn} r{}, {}, {:+}", d.dst, d.imm, d.off),
            }
        }
        Op::Call => format!("call {}", d.imm),
        Op::Exit => "exit".to_string(),
    }
}
