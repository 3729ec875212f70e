use crate::decoder::{Cond, Width};

/// Evaluates a conditional jump; operands are raw register patterns.
pub fn taken(cond: Cond, width: Width, lhs: u64, rhs: u64) -> bool {
    match width {
        Width::W64 => compare(cond, lhs, rhs, lhs as i64, rhs as i64),
        Width::W32 => {
            let (l, r) = (lhs as u32, rhs as u32);
            compare(cond, l as u64, r as u64, l as i32 as i64, r as i32 as i64)
        }
    }
}

fn compare(cond: Cond, lu: u64, ru: u64, ls: i64, rs: i64) -> bool {
    match cond {
        Cond::Eq => lu == ru,
        Cond::Ne => lu != ru,
        Cond::Gt => lu > ru,
        Cond::Ge => lu >= ru,
        Cond::Lt => lu < ru,
        Cond::Le => lu <= ru,
        Cond::Sgt => ls > rs,
        Cond::Sge => ls >= rs,
        Cond::Slt => ls < rs,
        Cond::Sle => ls <= rs,
        Cond::Set => lu & ru != 0,
    }
}
