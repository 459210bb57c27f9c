//! Mach-O image loading.
//!
//! Only a single-slice, 64-bit little-endian image (`MH_MAGIC_64`) is
//! accepted; universal binaries are rejected before parsing. Mach-O has one
//! symbol table and no sentinel machinery. Chained-fixup processing is not
//! implemented, so relocation fixup contributes no patches and vtable slots
//! are read as they appear on disk.

use std::collections::BTreeSet;

use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol};
use tracing::warn;

use crate::error::{Error, Result};

use super::{Arch, ImageFormat, Loaded, SectionInfo, SegmentInfo, SymbolCache, MACHO_CONSTANTS};

pub(crate) fn load(file: &object::File, data: &[u8], arch: Arch) -> Result<Loaded> {
    let constants = &MACHO_CONSTANTS;

    let magic = data
        .get(0..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0);
    if magic != object::macho::MH_MAGIC_64 {
        return Err(Error::UnsupportedFormat(format!(
            "Mach-O magic {magic:#x}; only MH_MAGIC_64 images are supported"
        )));
    }

    let sections: Vec<SectionInfo> = file
        .sections()
        .filter_map(|s| {
            let name = s.name().ok()?.to_string();
            Some(SectionInfo {
                name,
                address: s.address(),
                size: s.size(),
            })
        })
        .collect();

    // __PAGEZERO and other unbacked segments have no bytes to read from.
    let segments: Vec<SegmentInfo> = file
        .segments()
        .filter_map(|seg| {
            let (file_offset, file_size) = seg.file_range();
            if file_size == 0 {
                return None;
            }
            Some(SegmentInfo {
                address: seg.address(),
                mem_size: seg.size(),
                file_offset,
            })
        })
        .collect();

    let end_of_sections = sections
        .iter()
        .map(|s| s.address.saturating_add(s.size))
        .max()
        .unwrap_or(0);

    let mut symtab = SymbolCache::default();
    if file.symbol_table().is_none() {
        warn!("symbol table not found in this image!");
    }
    for sym in file.symbols() {
        if let Ok(name) = sym.name() {
            if !name.is_empty() {
                symtab.insert(name, sym.address(), sym.address());
            }
        }
    }

    let mut vtable_begins = BTreeSet::new();
    let mut typeinfo_begins = BTreeSet::new();
    for sym in file.symbols() {
        if sym.is_undefined() {
            continue;
        }
        let Ok(name) = sym.name() else { continue };
        if name.starts_with(constants.vtable_prefix) {
            vtable_begins.insert(sym.address());
        } else if name.starts_with(constants.typeinfo_prefix) {
            typeinfo_begins.insert(sym.address());
        }
    }

    Ok(Loaded {
        format: ImageFormat::MachO,
        arch,
        constants,
        sections,
        segments,
        symtab,
        dynsym: SymbolCache::default(),
        end_of_sections,
        vtable_begins,
        typeinfo_begins,
        patches: Vec::new(),
    })
}
