//! Itanium C++ ABI vtable and RTTI reconstruction.
//!
//! A vtable is a run of pointer-wide words: offset-to-top, typeinfo pointer,
//! then function pointers, with the header repeating at negative
//! offsets-to-top for secondary subtables under multiple inheritance. RTTI
//! records come in three shapes, told apart by which `__cxxabiv1` class
//! vtable their first word points into.
//!
//! Reference: <https://itanium-cxx-abi.github.io/cxx-abi/abi.html#rtti-layout>

use std::fmt;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::image::{Cursor, FormatConstants, Image, WORD};

use super::types::{
    BaseClassInfo, DumpTypeInfoResult, DumpVFTableResult, Inherit, TypeInfo, VTable, VTableColumn,
};

/// Upper bound on an inline mangled type name.
const MAX_TYPE_NAME_LEN: usize = 2048;

/// Offset of an RTTI class vtable's first function pointer from its symbol
/// value: one offset-to-top word plus one typeinfo pointer. A typeinfo
/// record's first word points there, not at the vtable symbol itself.
const TYPEINFO_VTABLE_ADJUST: u64 = 0x10;

/// Diagnostic codes for records that fail to decode. These are not errors in
/// the `Result` sense; they are logged and the record is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseFailure {
    CurrentIsNotVtable,
    AbnormalThisOffset,
    TypeinfoMismatch,
    NameNotFound,
    CurrentIsNotTypeinfo,
    AbnormalSymbolValue,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ParseFailure::CurrentIsNotVtable => "CURRENT_IS_NOT_VTABLE",
            ParseFailure::AbnormalThisOffset => "ABNORMAL_THIS_OFFSET",
            ParseFailure::TypeinfoMismatch => "TYPEINFO_MISMATCH",
            ParseFailure::NameNotFound => "NAME_NOT_FOUND",
            ParseFailure::CurrentIsNotTypeinfo => "CURRENT_IS_NOT_TYPEINFO",
            ParseFailure::AbnormalSymbolValue => "ABNORMAL_SYMBOL_VALUE",
        };
        f.write_str(code)
    }
}

/// Reconstructs vtables and typeinfo records from one image.
pub struct ItaniumReader<'a> {
    image: &'a Image,
}

impl<'a> ItaniumReader<'a> {
    pub fn new(image: &'a Image) -> Self {
        ItaniumReader { image }
    }

    fn constants(&self) -> &FormatConstants {
        self.image.constants()
    }

    /// Decode every vtable in the image.
    ///
    /// With a populated discovery set this walks the known `_ZTV` start
    /// addresses. Without one (stripped image) it scans the data section for
    /// the structural signature of a vtable head: a zero offset-to-top, a
    /// typeinfo pointer that is null or a known typeinfo start, and a first
    /// slot pointing into the text section.
    pub fn dump_vftables(&self) -> DumpVFTableResult {
        let mut result = DumpVFTableResult::default();
        let mut cursor = self.image.cursor();

        if !self.image.vtable_begins().is_empty() {
            for &address in self.image.vtable_begins() {
                cursor.seek(address);
                result.total += 1;
                if let Some(vtable) = self.read_vtable(&mut cursor) {
                    result.vftable.push(vtable);
                    result.parsed += 1;
                }
            }
            return result;
        }

        let constants = self.constants();
        if !cursor.move_to_section(constants.data_section) {
            error!("Unable to find data section.");
            return result;
        }
        while self.image.is_in_section(cursor.cur(), constants.data_section) {
            let back = cursor.cur();
            let head = cursor.read_word();
            let type_ptr = cursor.read_word();
            let first_slot = cursor.read_word();
            cursor.seek(back);
            let candidate = match (head, type_ptr, first_slot) {
                (Ok(head), Ok(type_ptr), Ok(first_slot)) => {
                    head == 0
                        && (type_ptr == 0
                            || self.image.typeinfo_begins().contains(&(type_ptr as u64)))
                        && self
                            .image
                            .is_in_section(first_slot as u64, constants.text_section)
                }
                _ => false,
            };
            if candidate {
                result.total += 1;
                if let Some(vtable) = self.read_vtable(&mut cursor) {
                    result.vftable.push(vtable);
                    result.parsed += 1;
                }
                if cursor.cur() == back {
                    // the reader bailed without consuming anything
                    cursor.skip(WORD as i64);
                }
            } else {
                cursor.skip(WORD as i64);
            }
        }
        result
    }

    /// Decode every discovered typeinfo record.
    pub fn dump_typeinfo(&self) -> DumpTypeInfoResult {
        let mut result = DumpTypeInfoResult {
            total: self.image.typeinfo_begins().len(),
            ..DumpTypeInfoResult::default()
        };
        let mut cursor = self.image.cursor();
        for &address in self.image.typeinfo_begins() {
            cursor.seek(address);
            match self.read_typeinfo(&mut cursor) {
                Ok(Some(type_info)) => {
                    result.type_info.push(type_info);
                    result.parsed += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    error!("{err}");
                    break;
                }
            }
        }
        result
    }

    /// Decode one vtable at the cursor. Returns `None` (after logging) when
    /// the bytes do not form a coherent vtable.
    pub fn read_vtable(&self, cursor: &mut Cursor) -> Option<VTable> {
        let constants = self.constants();
        let mut result = VTable::default();
        let mut symbol: Option<String> = None;
        let mut offset: i64 = 0;

        if let Some(sym) = self.image.lookup_symbol_at(cursor.cur()) {
            if !sym.name.starts_with(constants.vtable_prefix) {
                error!(
                    "Failed to read vtable at {:#x}. [{}]",
                    cursor.cur(),
                    ParseFailure::CurrentIsNotVtable
                );
                return None;
            }
            symbol = Some(sym.name.clone());
        }

        loop {
            let Ok(value) = cursor.read_word() else {
                break;
            };
            if !self
                .image
                .is_in_section(value as u64, constants.text_section)
            {
                // header word
                if value > 0 {
                    break;
                }
                if result.subtables.is_empty() {
                    // primary subtable: offset-to-top must be zero
                    if value != 0 {
                        error!(
                            "Failed to read vtable at {:#x} in {}. [{}]",
                            cursor.last(),
                            symbol.as_deref().unwrap_or("<unknown>"),
                            ParseFailure::AbnormalThisOffset
                        );
                        return None;
                    }
                    let type_name = self.read_zti(cursor);
                    if !type_name.is_empty() {
                        if symbol.is_none() {
                            let stem = type_name
                                .strip_prefix(constants.typeinfo_prefix)
                                .unwrap_or(&type_name);
                            symbol = Some(format!("{}{}", constants.vtable_prefix, stem));
                        }
                        result.type_name = type_name;
                    }
                } else {
                    // a zero header after the first subtable is the next vtable
                    if value == 0 {
                        break;
                    }
                    offset = value;
                    if self.read_zti(cursor) != result.type_name {
                        error!(
                            "Failed to read vtable at {:#x} in {}. [{}]",
                            cursor.last(),
                            symbol.as_deref().unwrap_or("<unknown>"),
                            ParseFailure::TypeinfoMismatch
                        );
                        return None;
                    }
                }
                continue;
            }
            // function slot
            let column_symbol = self
                .image
                .lookup_symbol_at(value as u64)
                .map(|sym| sym.name.clone());
            result.subtables.entry(offset).or_default().push(VTableColumn {
                symbol: column_symbol,
                rva: value as u64,
            });
        }

        let Some(name) = symbol else {
            error!(
                "Failed to read vtable at {:#x} in <unknown>. [{}]",
                cursor.last(),
                ParseFailure::NameNotFound
            );
            return None;
        };
        result.name = name;
        Some(result)
    }

    /// Decode one typeinfo record at the cursor.
    ///
    /// `Ok(None)` means the record was dropped (logged) or its inheritance
    /// kind is unrecognized (silently skipped). The only hard error is the
    /// all-ones cursor, which marks a corrupt image and stops the dump.
    pub fn read_typeinfo(&self, cursor: &mut Cursor) -> Result<Option<TypeInfo>> {
        let begin = cursor.cur();
        if begin == u64::MAX {
            return Err(Error::CorruptImage);
        }

        let constants = self.constants();
        let indicator = cursor
            .read_word()
            .ok()
            .map(|word| (word as u64).wrapping_sub(TYPEINFO_VTABLE_ADJUST))
            .and_then(|va| self.image.lookup_symbol_at(va));
        let Some(indicator) = indicator else {
            error!(
                "Failed to read type info at {begin:#x}. [{}]",
                ParseFailure::CurrentIsNotTypeinfo
            );
            return Ok(None);
        };

        if indicator.name == constants.class_info_sym {
            let name = self.read_zts(cursor);
            if name.is_empty() {
                error!(
                    "Failed to read type info at {:#x}. [{}]",
                    cursor.last(),
                    ParseFailure::AbnormalSymbolValue
                );
                return Ok(None);
            }
            return Ok(Some(TypeInfo {
                name,
                inherit: Inherit::None,
            }));
        }
        if indicator.name == constants.si_class_info_sym {
            let name = self.read_zts(cursor);
            let parent_type = self.read_zti(cursor);
            if name.is_empty() || parent_type.is_empty() {
                error!(
                    "Failed to read type info at {:#x}. [{}]",
                    cursor.last(),
                    ParseFailure::AbnormalSymbolValue
                );
                return Ok(None);
            }
            return Ok(Some(TypeInfo {
                name,
                inherit: Inherit::Single {
                    parent_type,
                    offset: 0,
                },
            }));
        }
        if indicator.name == constants.vmi_class_info_sym {
            let name = self.read_zts(cursor);
            if name.is_empty() {
                error!(
                    "Failed to read type info at {:#x}. [{}]",
                    cursor.last(),
                    ParseFailure::AbnormalSymbolValue
                );
                return Ok(None);
            }
            let (Ok(attribute), Ok(base_count)) = (cursor.read_u32(), cursor.read_u32()) else {
                error!(
                    "Failed to read type info at {:#x}. [{}]",
                    cursor.last(),
                    ParseFailure::AbnormalSymbolValue
                );
                return Ok(None);
            };
            let mut base_classes = Vec::with_capacity(base_count as usize);
            for _ in 0..base_count {
                let base_name = self.read_zti(cursor);
                if base_name.is_empty() {
                    error!(
                        "Failed to read type info at {:#x}. [{}]",
                        cursor.last(),
                        ParseFailure::AbnormalSymbolValue
                    );
                    return Ok(None);
                }
                let Ok(flag) = cursor.read_word() else {
                    error!(
                        "Failed to read type info at {:#x}. [{}]",
                        cursor.last(),
                        ParseFailure::AbnormalSymbolValue
                    );
                    return Ok(None);
                };
                base_classes.push(BaseClassInfo {
                    name: base_name,
                    offset: ((flag >> 8) & 0xFF) as u8,
                    mask: (flag & 0xFF) as u8,
                });
            }
            return Ok(Some(TypeInfo {
                name,
                inherit: Inherit::Multiple {
                    attribute,
                    base_classes,
                },
            }));
        }
        // unrecognized inheritance kind: skip without reporting
        Ok(None)
    }

    /// Read an inline mangled name: the current word is the VA of a
    /// NUL-terminated string, returned with the typeinfo prefix prepended.
    fn read_zts(&self, cursor: &mut Cursor) -> String {
        let Ok(value) = cursor.read_word() else {
            return String::new();
        };
        let name = self.image.read_cstring_at(value as u64, MAX_TYPE_NAME_LEN);
        if name.is_empty() {
            name
        } else {
            format!("{}{}", self.constants().typeinfo_prefix, name)
        }
    }

    /// Read a typeinfo pointer and resolve it to a `_ZTI` name.
    ///
    /// A pointer outside the data section is an external reference and is
    /// resolved through the symbol tables. An internal pointer is followed:
    /// skip the record's own RTTI class pointer, then read its inline name.
    /// The cursor ends just past the pointer either way.
    fn read_zti(&self, cursor: &mut Cursor) -> String {
        let back = cursor.cur().wrapping_add(WORD as u64);
        let Ok(value) = cursor.read_word() else {
            return String::new();
        };
        let value = value as u64;
        if !self
            .image
            .is_in_section(value, self.constants().data_section)
        {
            return self
                .image
                .lookup_symbol_at(value)
                .map(|sym| sym.name.clone())
                .unwrap_or_default();
        }
        cursor.seek(value);
        cursor.skip(WORD as i64);
        let name = self.read_zts(cursor);
        cursor.seek(back);
        name
    }
}

/// Render a recovered vtable at info level.
pub fn log_vtable(vtable: &VTable) {
    info!("VTable: {}", vtable.name);
    for (offset, columns) in &vtable.subtables {
        info!("\tOffset: {offset}");
        for column in columns {
            info!(
                "\t\t{} ({:#x})",
                column.symbol.as_deref().unwrap_or("<unknown>"),
                column.rva
            );
        }
    }
}

/// Render a recovered typeinfo record at info level.
pub fn log_typeinfo(type_info: &TypeInfo) {
    info!("TypeInfo: {}", type_info.name);
    match &type_info.inherit {
        Inherit::None => info!("\tInherit: None"),
        Inherit::Single {
            parent_type,
            offset,
        } => {
            info!("\tInherit: Single");
            info!("\tParentType: {parent_type}");
            info!("\tOffset: {offset:#x}");
        }
        Inherit::Multiple {
            attribute,
            base_classes,
        } => {
            info!("\tInherit: Multiple");
            info!("\tAttribute: {attribute:#x}");
            info!("\tBase classes ({}):", base_classes.len());
            for base in base_classes {
                info!("\t\tOffset: {:#x}", base.offset);
                info!("\t\t\tName: {}", base.name);
                info!("\t\t\tMask: {:#x}", base.mask);
            }
        }
    }
}
