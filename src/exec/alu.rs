//! Arithmetic and logic unit.
//!
//! Operands arrive as raw 64-bit register patterns; 32-bit operations work on
//! the low halves and zero the upper half of the result.

use num_traits::{PrimInt, WrappingAdd, WrappingMul, WrappingNeg, WrappingSub};

use crate::decoder::{AluOp, SwapOrder, Width};
use crate::endian::Endian;

pub fn execute(op: AluOp, width: Width, dst: u64, src: u64) -> u64 {
    match width {
        Width::W64 => apply::<u64>(op, dst, src),
        Width::W32 => apply::<u32>(op, dst as u32, src as u32) as u64,
    }
}

fn apply<T>(op: AluOp, dst: T, src: T) -> T
where
    T: PrimInt + WrappingAdd + WrappingSub + WrappingMul + WrappingNeg,
{
    let bits = T::zero().count_zeros();
    // Shift counts wrap at the operand width.
    let amount = || (src.to_u64().unwrap_or(0) as u32) & (bits - 1);
    match op {
        AluOp::Add => dst.wrapping_add(&src),
        AluOp::Sub => dst.wrapping_sub(&src),
        AluOp::Mul => dst.wrapping_mul(&src),
        AluOp::Div if src.is_zero() => T::zero(),
        AluOp::Div => dst / src,
        AluOp::Mod if src.is_zero() => T::zero(),
        AluOp::Mod => dst % src,
        AluOp::Or => dst | src,
        AluOp::And => dst & src,
        AluOp::Xor => dst ^ src,
        AluOp::Lsh => dst << amount() as usize,
        AluOp::Rsh => dst >> amount() as usize,
        AluOp::Arsh => dst.signed_shr(amount()),
        AluOp::Neg => dst.wrapping_neg(),
        AluOp::Mov => src,
    }
}

/// `le16/le32/le64` and `be16/be32/be64`.
///
/// `native` is the machine byte order: converting to it only truncates,
/// converting to the other order reverses the bytes within the width.
pub fn swap(native: Endian, order: SwapOrder, bits: u32, value: u64) -> u64 {
    let target = match order {
        SwapOrder::ToLe => Endian::Little,
        SwapOrder::ToBe => Endian::Big,
    };
    let reverse = target != native;
    match bits {
        16 if reverse => (value as u16).swap_bytes() as u64,
        16 => value as u16 as u64,
        32 if reverse => (value as u32).swap_bytes() as u64,
        32 => value as u32 as u64,
        _ if reverse => value.swap_bytes(),
        _ => value,
    }
}
