//! Byte-order handling for the wire format and for stack memory.
//!
//! Everything that depends on the configured byte order goes through here;
//! the rest of the machine works on native integers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Reads an unsigned integer of `bytes.len()` bytes (at most 8).
    pub fn read_uint(self, bytes: &[u8]) -> u64 {
        debug_assert!(bytes.len() <= 8);
        match self {
            Endian::Little => bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64),
            Endian::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        }
    }

    /// Writes the low `out.len()` bytes of `value`.
    pub fn write_uint(self, value: u64, out: &mut [u8]) {
        debug_assert!(out.len() <= 8);
        let n = out.len();
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = match self {
                Endian::Little => i * 8,
                Endian::Big => (n - 1 - i) * 8,
            };
            *slot = (value >> shift) as u8;
        }
    }

    pub fn read_i16(self, b: [u8; 2]) -> i16 {
        match self {
            Endian::Little => i16::from_le_bytes(b),
            Endian::Big => i16::from_be_bytes(b),
        }
    }

    pub fn read_i32(self, b: [u8; 4]) -> i32 {
        match self {
            Endian::Little => i32::from_le_bytes(b),
            Endian::Big => i32::from_be_bytes(b),
        }
    }

    pub fn i16_bytes(self, v: i16) -> [u8; 2] {
        match self {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        }
    }

    pub fn i32_bytes(self, v: i32) -> [u8; 4] {
        match self {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        }
    }

    /// Splits the register byte into `(dst, src)`.
    ///
    /// Little-endian objects keep dst in the low nibble, big-endian ones in
    /// the high nibble.
    pub fn split_regs(self, byte: u8) -> (u8, u8) {
        let (lo, hi) = (byte & 0x0f, byte >> 4);
        match self {
            Endian::Little => (lo, hi),
            Endian::Big => (hi, lo),
        }
    }

    pub fn pack_regs(self, dst: u8, src: u8) -> u8 {
        match self {
            Endian::Little => (src << 4) | (dst & 0x0f),
            Endian::Big => (dst << 4) | (src & 0x0f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Endian;

    #[test]
    fn uint_roundtrip_per_width() {
        let mut buf = [0u8; 4];
        Endian::Little.write_uint(0x1122_3344, &mut buf);
        assert_eq!(buf, [0x44, 0x33, 0x22, 0x11]);
        assert_eq!(Endian::Little.read_uint(&buf), 0x1122_3344);

        Endian::Big.write_uint(0x1122_3344, &mut buf);
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(Endian::Big.read_uint(&buf), 0x1122_3344);
    }

    #[test]
    fn write_uint_truncates_to_slice() {
        let mut buf = [0u8; 2];
        Endian::Big.write_uint(0xdead_beef, &mut buf);
        assert_eq!(buf, [0xbe, 0xef]);
    }

    #[test]
    fn register_nibbles_flip_with_order() {
        assert_eq!(Endian::Little.split_regs(0x1a), (0xa, 0x1));
        assert_eq!(Endian::Big.split_regs(0x1a), (0x1, 0xa));
        assert_eq!(Endian::Big.pack_regs(1, 0xa), 0x1a);
        assert_eq!(Endian::Little.pack_regs(0xa, 1), 0x1a);
    }
}
