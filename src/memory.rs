use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::endian::Endian;
use crate::fault::{Fault, Region};

pub const STACK_SIZE: usize = 512;

/// Read-only byte source for the legacy packet loads (`ld_abs`/`ld_ind`),
/// addressed `[0, len)`.
pub trait Bus {
    fn len(&self) -> usize;
    /// Fills `buf` from `addr`; called only for spans inside `[0, len)`.
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
}

impl LinearMemory {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { mem: bytes.into() }
    }
}

impl Bus for LinearMemory {
    fn len(&self) -> usize {
        self.mem.len()
    }

    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(addr)?;
        let Some(src) = start
            .checked_add(buf.len())
            .and_then(|end| self.mem.get(start..end))
        else {
            bail!("{} byte(s) at {addr:#x} past end of {}-byte buffer", buf.len(), self.mem.len());
        };
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Fixed-size stack, addressed `[0, len)`; R10 starts at `len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    bytes: Vec<u8>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new(STACK_SIZE)
    }
}

impl Stack {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn span(&self, addr: i64, len: usize) -> Result<std::ops::Range<usize>, Fault> {
        let bounds = usize::try_from(addr)
            .ok()
            .and_then(|start| Some((start, start.checked_add(len)?)));
        match bounds {
            Some((start, end)) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(Fault::MemoryBounds {
                region: Region::Stack,
                addr,
                len,
            }),
        }
    }

    pub fn read_bytes(&self, addr: i64, len: usize) -> Result<&[u8], Fault> {
        let span = self.span(addr, len)?;
        Ok(&self.bytes[span])
    }

    pub fn write_bytes(&mut self, addr: i64, bytes: &[u8]) -> Result<(), Fault> {
        let span = self.span(addr, bytes.len())?;
        self.bytes[span].copy_from_slice(bytes);
        Ok(())
    }

    /// Zero-extended integer load of `len` bytes.
    pub fn load(&self, endian: Endian, addr: i64, len: usize) -> Result<u64, Fault> {
        Ok(endian.read_uint(self.read_bytes(addr, len)?))
    }

    /// Stores the low `len` bytes of `value`.
    pub fn store(&mut self, endian: Endian, addr: i64, len: usize, value: u64) -> Result<(), Fault> {
        let span = self.span(addr, len)?;
        endian.write_uint(value, &mut self.bytes[span]);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_rejects_spans_crossing_the_top() {
        let mut s = Stack::new(16);
        assert!(s.write_bytes(15, &[1]).is_ok());
        assert!(matches!(
            s.write_bytes(15, &[1, 2]),
            Err(Fault::MemoryBounds { addr: 15, len: 2, .. })
        ));
        assert!(matches!(s.read_bytes(-1, 1), Err(Fault::MemoryBounds { .. })));
        assert_eq!(s.as_slice()[15], 1);
    }

    #[test]
    fn linear_memory_reads_inside_the_buffer() {
        let mut m = LinearMemory::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(m.len(), 4);
        assert!(!m.is_empty());
        let mut buf = [0u8; 2];
        m.read(2, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        assert!(m.read(3, &mut buf).is_err());
        assert!(LinearMemory::from_bytes(Vec::new()).is_empty());
    }
}
