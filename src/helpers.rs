//! Helper-call dispatch.
//!
//! `call imm` looks `imm` up in a [`HelperTable`]. Arguments come from r1..r5
//! and the result lands in r0; what a helper does is up to the embedder.

use std::collections::HashMap;

use anyhow::Result;

use crate::fault::Fault;
use crate::memory::Stack;

pub type HelperFn = Box<dyn FnMut(&[u64; 5], &mut Stack) -> Result<u64> + Send>;

/// Kernel helper id of `bpf_trace_printk`.
pub const TRACE_PRINTK: u32 = 6;

struct Helper {
    name: String,
    f: HelperFn,
}

#[derive(Default)]
pub struct HelperTable {
    fns: HashMap<u32, Helper>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: u32, name: impl Into<String>, f: F) -> &mut Self
    where
        F: FnMut(&[u64; 5], &mut Stack) -> Result<u64> + Send + 'static,
    {
        self.fns.insert(
            id,
            Helper {
                name: name.into(),
                f: Box::new(f),
            },
        );
        self
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.fns.get(&id).map(|h| h.name.as_str())
    }

    pub fn call(&mut self, id: u32, args: &[u64; 5], stack: &mut Stack) -> Result<u64, Fault> {
        let helper = self.fns.get_mut(&id).ok_or(Fault::UnknownHelper { id })?;
        tracing::debug!(id, name = %helper.name, ?args, "helper call");
        (helper.f)(args, stack).map_err(|source| Fault::Helper { id, source })
    }
}

impl std::fmt::Debug for HelperTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.fns.iter().map(|(id, h)| (*id, h.name.as_str())).collect();
        ids.sort_unstable();
        f.debug_struct("HelperTable").field("fns", &ids).finish()
    }
}

/// `bpf_trace_printk(fmt, fmt_size, a, b, c)`: logs the NUL-terminated format
/// string found on the stack followed by the three value arguments.
pub fn trace_printk(args: &[u64; 5], stack: &mut Stack) -> Result<u64> {
    let bytes = stack.read_bytes(args[0] as i64, args[1] as usize)?;
    let text = bytes.split(|&b| b == 0).next().unwrap_or_default();
    let text = String::from_utf8_lossy(text);
    tracing::info!(target: "ebpf::printk", a = args[2], b = args[3], c = args[4], "{}", text.trim_end());
    Ok(text.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_is_reported() {
        let mut t = HelperTable::new();
        let mut stack = Stack::default();
        let err = t.call(7, &[0; 5], &mut stack).unwrap_err();
        assert!(matches!(err, Fault::UnknownHelper { id: 7 }));
    }

    #[test]
    fn printk_reads_format_from_stack() {
        let mut stack = Stack::new(16);
        stack.write_bytes(8, b"hi\0\0\0\0\0\0").unwrap();
        let n = trace_printk(&[8, 8, 0, 0, 0], &mut stack).unwrap();
        assert_eq!(n, 2);
        assert!(trace_printk(&[12, 8, 0, 0, 0], &mut stack).is_err());
    }
}
