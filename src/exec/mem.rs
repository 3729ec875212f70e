//! Loads and stores against the stack and the packet buffer.

use crate::cpu::Cpu;
use crate::decoder::{Size, Source};
use crate::fault::{Fault, Region};
use crate::memory::Bus;

fn effective(base: u64, off: i64) -> i64 {
    (base as i64).wrapping_add(off)
}

/// `dst = [base + off]`, zero-extended.
pub fn load(cpu: &mut Cpu, size: Size, dst: u8, base: u8, off: i16) -> Result<(), Fault> {
    let addr = effective(cpu.regs.read(base)?, off as i64);
    let value = cpu.stack.load(cpu.cfg.endian, addr, size.bytes())?;
    cpu.regs.write(dst, value)
}

/// `[base + off] = value`, low `size` bytes.
pub fn store(cpu: &mut Cpu, size: Size, value: u64, base: u8, off: i16) -> Result<(), Fault> {
    let addr = effective(cpu.regs.read(base)?, off as i64);
    cpu.stack.store(cpu.cfg.endian, addr, size.bytes(), value)
}

/// Resolves the value stored by `st` (immediate) or `stx` (register).
pub fn store_operand(cpu: &Cpu, source: Source, src: u8, imm: i64) -> Result<u64, Fault> {
    match source {
        Source::Reg => cpu.regs.read(src),
        Source::Imm => Ok(imm as u64),
    }
}

/// `[base + off] += value`, wrapping at the access width.
pub fn atomic_add(cpu: &mut Cpu, size: Size, src: u8, base: u8, off: i16) -> Result<(), Fault> {
    let addr = effective(cpu.regs.read(base)?, off as i64);
    let endian = cpu.cfg.endian;
    let old = cpu.stack.load(endian, addr, size.bytes())?;
    let value = old.wrapping_add(cpu.regs.read(src)?);
    cpu.stack.store(endian, addr, size.bytes(), value)
}

/// Legacy `ld_abs`/`ld_ind`: reads from the packet buffer into r0.
pub fn load_packet(
    cpu: &mut Cpu,
    packet: &mut dyn Bus,
    size: Size,
    index: Option<u8>,
    imm: i64,
) -> Result<(), Fault> {
    let base = match index {
        Some(reg) => cpu.regs.read(reg)?,
        None => 0,
    };
    let addr = effective(base, imm);
    let len = size.bytes();
    let in_bounds = usize::try_from(addr)
        .ok()
        .and_then(|start| start.checked_add(len))
        .is_some_and(|end| end <= packet.len());
    if !in_bounds {
        return Err(Fault::MemoryBounds {
            region: Region::Packet,
            addr,
            len,
        });
    }
    let addr = addr as u64;
    let mut buf = [0u8; 8];
    packet
        .read(addr, &mut buf[..len])
        .map_err(|source| Fault::Packet { addr, source })?;
    let value = cpu.cfg.endian.read_uint(&buf[..len]);
    cpu.regs.write(0, value)
}
