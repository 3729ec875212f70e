use std::path::Path;

use anyhow::{Context, Result};
use object::{Object, ObjectSection};

use crate::endian::Endian;

/// Reads a raw section dump, optionally skipping a header and bounding the
/// length, e.g. the output of `llvm-objcopy -O binary --only-section=...`.
pub fn load_section(path: &Path, skip: usize, len: Option<usize>) -> Result<Vec<u8>> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    Ok(payload.to_vec())
}

/// Code pulled out of a compiled object, with the object's byte order.
#[derive(Debug, Clone)]
pub struct ElfSection {
    pub bytes: Vec<u8>,
    pub endian: Endian,
}

/// Looks up `name` (e.g. `socket1`, `xdp`) in an ELF object image.
pub fn elf_section(image: &[u8], name: &str) -> Result<ElfSection> {
    let file = object::File::parse(image).context("parsing ELF object")?;
    let section = file
        .section_by_name(name)
        .with_context(|| format!("cannot find section {name}"))?;
    let bytes = section
        .data()
        .with_context(|| format!("reading section {name}"))?
        .to_vec();
    let endian = if file.is_little_endian() {
        Endian::Little
    } else {
        Endian::Big
    };
    Ok(ElfSection { bytes, endian })
}

pub fn load_elf_section(path: &Path, name: &str) -> Result<ElfSection> {
    let image = std::fs::read(path)?;
    elf_section(&image, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_applies_skip_and_len() {
        let path = std::env::temp_dir().join("ebpf_vm_loader_test.bin");
        std::fs::write(&path, [0u8, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(load_section(&path, 2, Some(3)).unwrap(), vec![2, 3, 4]);
        assert_eq!(load_section(&path, 4, None).unwrap(), vec![4, 5]);
        assert!(load_section(&path, 7, None).is_err());
        assert!(load_section(&path, 2, Some(5)).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn garbage_is_not_an_object() {
        let err = elf_section(&[0u8; 16], "xdp").unwrap_err();
        assert!(err.to_string().contains("parsing ELF"), "{err}");
    }
}
