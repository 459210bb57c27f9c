//! ELF image loading.
//!
//! Extracts sections, load segments and both symbol tables, simulates the
//! dynamic linker over `.data.rel.ro` (see [`relocate_readonly_data`]), and
//! seeds the vtable/typeinfo discovery sets from symbol prefixes and from
//! dynamic relocations that bind to one of the Itanium RTTI class vtables.

use std::collections::BTreeSet;

use object::{
    Object, ObjectSection, ObjectSegment, ObjectSymbol, ObjectSymbolTable, RelocationFlags,
    RelocationTarget,
};
use tracing::{debug, error, warn};

use crate::error::Result;

use super::{
    Arch, ImageFormat, Loaded, SectionInfo, SegmentInfo, SymbolCache, ELF_CONSTANTS, WORD,
};

pub(crate) fn load(file: &object::File, arch: Arch) -> Result<Loaded> {
    let constants = &ELF_CONSTANTS;

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

    let segments: Vec<SegmentInfo> = file
        .segments()
        .map(|seg| {
            let (file_offset, _) = seg.file_range();
            SegmentInfo {
                address: seg.address(),
                mem_size: seg.size(),
                file_offset,
            }
        })
        .collect();

    let end_of_sections = sections
        .iter()
        .map(|s| s.address.saturating_add(s.size))
        .max()
        .unwrap_or(0);

    let mut symtab = SymbolCache::default();
    if file.symbol_table().is_none() {
        warn!(".symtab not found in this image!");
    }
    for sym in file.symbols() {
        if let Ok(name) = sym.name() {
            if !name.is_empty() {
                symtab.insert(name, sym.address(), sym.address());
            }
        }
    }

    // Dynamic symbols are keyed by a sentinel VA past the end of sections,
    // one pointer-wide slot per dynsym index. Relocation fixup writes the
    // same sentinel for unresolved external references, so the rest of the
    // pipeline can keep using a single VA-keyed lookup.
    let mut dynsym = SymbolCache::default();
    if file.dynamic_symbol_table().is_none() {
        warn!(".dynsym not found in this image!");
    }
    for sym in file.dynamic_symbols() {
        if let Ok(name) = sym.name() {
            if !name.is_empty() {
                let key = sentinel_va(end_of_sections, sym.index().0);
                dynsym.insert(name, sym.address(), key);
            }
        }
    }

    let patches = relocate_readonly_data(file, &sections, &segments, end_of_sections);

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
    for sym in file.dynamic_symbols() {
        if sym.is_undefined() {
            continue;
        }
        let Ok(name) = sym.name() else { continue };
        if name.starts_with(constants.vtable_prefix) {
            vtable_begins.insert(sym.address());
        }
    }
    discover_typeinfo_relocations(file, &mut typeinfo_begins);

    Ok(Loaded {
        format: ImageFormat::Elf,
        arch,
        constants,
        sections,
        segments,
        symtab,
        dynsym,
        end_of_sections,
        vtable_begins,
        typeinfo_begins,
        patches,
    })
}

fn sentinel_va(end_of_sections: u64, dynsym_idx: usize) -> u64 {
    end_of_sections.saturating_add((dynsym_idx * WORD) as u64)
}

fn va_to_offset(segments: &[SegmentInfo], va: u64) -> Option<usize> {
    for seg in segments {
        if va >= seg.address && va < seg.address.saturating_add(seg.mem_size) {
            let off = seg.file_offset.saturating_add(va - seg.address);
            return usize::try_from(off).ok();
        }
    }
    None
}

/// Compute the patch list that makes `.data.rel.ro` look the way the dynamic
/// linker would have left it.
///
/// Absolute relocations against an internal symbol resolve to
/// `symbol.value + addend`; against an external (zero-value) symbol they
/// resolve to that symbol's sentinel VA so the slot stays resolvable by
/// address lookup. Relative relocations resolve to the addend.
fn relocate_readonly_data(
    file: &object::File,
    sections: &[SectionInfo],
    segments: &[SegmentInfo],
    end_of_sections: u64,
) -> Vec<(usize, u64)> {
    let mut patches = Vec::new();
    let Some(ro_data) = sections.iter().find(|s| s.name == ELF_CONSTANTS.data_section) else {
        return patches;
    };
    let begin = ro_data.address;
    let end = begin.saturating_add(ro_data.size);
    let Some(relocations) = file.dynamic_relocations() else {
        return patches;
    };

    for (address, relocation) in relocations {
        if address < begin || address >= end {
            continue;
        }
        let Some(offset) = va_to_offset(segments, address) else {
            error!("No load segment maps relocation target {address:#x}!");
            continue;
        };
        let RelocationFlags::Elf { r_type } = relocation.flags() else {
            continue;
        };
        match r_type {
            object::elf::R_X86_64_64 | object::elf::R_AARCH64_ABS64 => {
                let symbol = match relocation.target() {
                    RelocationTarget::Symbol(idx) => file
                        .dynamic_symbol_table()
                        .and_then(|table| table.symbol_by_index(idx).ok())
                        .map(|sym| (idx.0, sym.address())),
                    _ => None,
                };
                let Some((dynsym_idx, sym_value)) = symbol else {
                    error!("Get dynamic symbol failed!");
                    continue;
                };
                let value = if sym_value != 0 {
                    // internal symbol
                    sym_value.wrapping_add_signed(relocation.addend())
                } else {
                    // external symbol
                    sentinel_va(end_of_sections, dynsym_idx)
                        .wrapping_add_signed(relocation.addend())
                };
                patches.push((offset, value));
            }
            object::elf::R_X86_64_RELATIVE | object::elf::R_AARCH64_RELATIVE => {
                if relocation.addend() == 0 {
                    warn!("Unknown type of ADDEND detected.");
                }
                patches.push((offset, relocation.addend() as u64));
            }
            other => {
                warn!("Unhandled relocation type: {other}.");
            }
        }
    }
    patches
}

/// Seed typeinfo discovery from dynamic relocations whose symbol is one of
/// the three Itanium RTTI class vtables. Catches typeinfo records whose own
/// symbol was stripped. A relocation with no symbol ends the scan.
fn discover_typeinfo_relocations(file: &object::File, typeinfo_begins: &mut BTreeSet<u64>) {
    let constants = &ELF_CONSTANTS;
    let Some(table) = file.dynamic_symbol_table() else {
        return;
    };
    let Some(relocations) = file.dynamic_relocations() else {
        return;
    };
    for (address, relocation) in relocations {
        let RelocationTarget::Symbol(idx) = relocation.target() else {
            debug!("dynamic relocation at {address:#x} has no symbol; stopping typeinfo scan");
            return;
        };
        let Ok(sym) = table.symbol_by_index(idx) else {
            debug!("dynamic relocation at {address:#x} has no symbol; stopping typeinfo scan");
            return;
        };
        let Ok(name) = sym.name() else { continue };
        if name == constants.class_info_sym
            || name == constants.si_class_info_sym
            || name == constants.vmi_class_info_sym
        {
            typeinfo_begins.insert(address);
        }
    }
}
