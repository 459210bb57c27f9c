//! Recovered vtable and RTTI records, and the aggregates the dump drivers
//! produce.
//!
//! The aggregates serialize to JSON objects keyed by mangled symbol:
//!
//! ```text
//! { "_ZTV1B": { "typeName": "_ZTI1B",
//!               "subtables": { "0": [ {"symbol": "_ZN1B1fEv", "rva": 4096} ] } } }
//! { "_ZTI1B": { "kind": "Single", "parentType": "_ZTI1A", "offset": 0 } }
//! ```

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// One function-pointer slot inside a subtable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VTableColumn {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub rva: u64,
}

/// One complete vtable: the primary subtable at offset 0 plus any secondary
/// subtables at negative offsets-to-top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VTable {
    /// Mangled vtable symbol (`_ZTV...`)
    pub name: String,
    /// Mangled typeinfo symbol (`_ZTI...`) shared by every subtable
    pub type_name: String,
    pub subtables: BTreeMap<i64, Vec<VTableColumn>>,
}

impl Serialize for VTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("typeName", &self.type_name)?;
        let subtables: BTreeMap<String, &Vec<VTableColumn>> = self
            .subtables
            .iter()
            .map(|(offset, columns)| (offset.to_string(), columns))
            .collect();
        map.serialize_entry("subtables", &subtables)?;
        map.end()
    }
}

/// One entry of a multi-inherit RTTI record's base array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseClassInfo {
    /// Mangled typeinfo symbol of the base (`_ZTI...`)
    pub name: String,
    /// Bits [15:8] of the base's 64-bit flag word
    pub offset: u8,
    /// Low byte of the flag word
    pub mask: u8,
}

/// Inheritance shape of an RTTI record, tagged by the RTTI class vtable the
/// record was constructed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Inherit {
    None,
    Single {
        #[serde(rename = "parentType")]
        parent_type: String,
        offset: u64,
    },
    Multiple {
        attribute: u32,
        #[serde(rename = "baseClasses")]
        base_classes: Vec<BaseClassInfo>,
    },
}

/// One recovered RTTI record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Mangled typeinfo symbol (`_ZTI...`)
    pub name: String,
    pub inherit: Inherit,
}

impl Serialize for TypeInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // the name is the document key; the body is the inheritance shape
        self.inherit.serialize(serializer)
    }
}

/// Outcome of a vtable dump pass.
#[derive(Debug, Default)]
pub struct DumpVFTableResult {
    /// Candidates attempted
    pub total: usize,
    /// Candidates that decoded cleanly
    pub parsed: usize,
    pub vftable: Vec<VTable>,
}

impl Serialize for DumpVFTableResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.vftable.len()))?;
        for vtable in &self.vftable {
            map.serialize_entry(&vtable.name, vtable)?;
        }
        map.end()
    }
}

/// Outcome of a typeinfo dump pass.
#[derive(Debug, Default)]
pub struct DumpTypeInfoResult {
    pub total: usize,
    pub parsed: usize,
    pub type_info: Vec<TypeInfo>,
}

impl Serialize for DumpTypeInfoResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.type_info.len()))?;
        for type_info in &self.type_info {
            map.serialize_entry(&type_info.name, type_info)?;
        }
        map.end()
    }
}
