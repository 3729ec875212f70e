use serde::{Deserialize, Serialize};

use crate::fault::Fault;

pub const NUM_REGS: usize = 11;
/// Frame pointer, read-only to programs.
pub const FP: u8 = 10;

/// R0..R10. R0 holds return values, R1..R5 carry helper arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    r: [u64; NUM_REGS],
}

impl Registers {
    pub fn read(&self, reg: u8) -> Result<u64, Fault> {
        self.r
            .get(reg as usize)
            .copied()
            .ok_or(Fault::InvalidRegister { reg })
    }

    pub fn write(&mut self, reg: u8, value: u64) -> Result<(), Fault> {
        if reg == FP {
            return Err(Fault::FrameRegisterWrite);
        }
        let slot = self
            .r
            .get_mut(reg as usize)
            .ok_or(Fault::InvalidRegister { reg })?;
        *slot = value;
        Ok(())
    }

    pub(crate) fn set_frame_pointer(&mut self, value: u64) {
        self.r[FP as usize] = value;
    }

    pub fn args(&self) -> [u64; 5] {
        [self.r[1], self.r[2], self.r[3], self.r[4], self.r[5]]
    }

    pub fn as_array(&self) -> &[u64; NUM_REGS] {
        &self.r
    }
}
