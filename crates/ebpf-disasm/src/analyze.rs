use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::Serialize;

use ebpf_vm::decoder::{Decoder, Op, INSN_SIZE};
use ebpf_vm::disasm::fmt_insn;
use ebpf_vm::Endian;

/// One listing line: a decoded instruction or the fault that stopped decoding.
#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub pc: usize,
    pub words: usize,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Linear sweep over every word of the section.
pub fn sweep<D: Decoder>(dec: &D, endian: Endian, code: &[u8]) -> Vec<Line> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc * INSN_SIZE < code.len() {
        let at = pc * INSN_SIZE;
        let (words, text) = match dec.decode(endian, &code[at..]) {
            Ok(slot) => (slot.words(), fmt_insn(slot.insn())),
            Err(fault) => (1, format!(".error {fault}")),
        };
        let end = (at + words * INSN_SIZE).min(code.len());
        out.push(Line { pc, words, bytes: code[at..end].to_vec(), text });
        pc += words;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind { Fallthrough, Branch, CondBranch }

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Edge { pub from: usize, pub to: usize, pub kind: EdgeKind }

#[derive(Debug, Clone, Serialize)]
pub struct Block { pub start: usize, pub end: usize, pub insns: Vec<String> }

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub blocks: Vec<Block>,
    pub edges: Vec<Edge>,
    pub exits: Vec<usize>,
    /// Jumps whose target or fall-through lies outside the section.
    pub out_of_range: Vec<usize>,
}

/// Walks the control flow reachable from the first instruction and splits it
/// into basic blocks.
pub fn analyze<D: Decoder>(dec: &D, endian: Endian, code: &[u8], max_instr: usize) -> Report {
    let len = code.len() / INSN_SIZE;
    let mut queue = VecDeque::from([0usize]);
    let mut visited: BTreeMap<usize, (usize, String)> = BTreeMap::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut exits: BTreeSet<usize> = BTreeSet::new();
    let mut ends: HashSet<usize> = HashSet::new();
    let mut wild: BTreeSet<usize> = BTreeSet::new();

    while let Some(pc) = queue.pop_front() {
        if visited.len() >= max_instr { break; }
        if pc >= len || visited.contains_key(&pc) { continue; }
        let Ok(slot) = dec.decode(endian, &code[pc * INSN_SIZE..]) else {
            ends.insert(pc);
            continue;
        };
        let d = *slot.insn();
        visited.insert(pc, (slot.words(), fmt_insn(&d)));
        let ft = pc + slot.words();
        let target = usize::try_from(pc as i64 + 1 + d.off as i64)
            .ok()
            .filter(|&t| t < len);
        match d.op {
            Op::Ja => {
                ends.insert(pc);
                match target {
                    Some(to) => {
                        edges.push(Edge { from: pc, to, kind: EdgeKind::Branch });
                        queue.push_back(to);
                    }
                    None => { wild.insert(pc); }
                }
            }
            Op::Jmp { .. } => {
                ends.insert(pc);
                match target {
                    Some(to) => {
                        edges.push(Edge { from: pc, to, kind: EdgeKind::CondBranch });
                        queue.push_back(to);
                    }
                    None => { wild.insert(pc); }
                }
                if ft < len {
                    edges.push(Edge { from: pc, to: ft, kind: EdgeKind::Fallthrough });
                    queue.push_back(ft);
                } else {
                    wild.insert(pc);
                }
            }
            Op::Exit => {
                exits.insert(pc);
                ends.insert(pc);
            }
            _ => queue.push_back(ft),
        }
    }

    let mut starts: BTreeSet<usize> = edges.iter().map(|e| e.to).collect();
    starts.insert(0);

    let mut blocks = Vec::new();
    for &start in &starts {
        if !visited.contains_key(&start) { continue; }
        let mut insns = Vec::new();
        let mut cur = start;
        loop {
            let Some((words, text)) = visited.get(&cur) else { break };
            insns.push(format!("{cur:04}: {text}"));
            let next = cur + words;
            if ends.contains(&cur) || starts.contains(&next) || !visited.contains_key(&next) {
                blocks.push(Block { start, end: next, insns });
                break;
            }
            cur = next;
        }
    }

    Report {
        blocks,
        edges,
        exits: exits.into_iter().collect(),
        out_of_range: wild.into_iter().collect(),
    }
}
