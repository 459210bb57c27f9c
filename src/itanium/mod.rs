//! Itanium C++ ABI metadata: record types and the reconstruction readers.

pub mod reader;
pub mod types;

pub use reader::{log_typeinfo, log_vtable, ItaniumReader};
pub use types::{
    BaseClassInfo, DumpTypeInfoResult, DumpVFTableResult, Inherit, TypeInfo, VTable, VTableColumn,
};
