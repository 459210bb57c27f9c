//! vtdump recovers Itanium C++ ABI runtime type metadata (vtables and RTTI
//! records) from ELF and Mach-O executable images.
//!
//! The pipeline is short: [`image::Image`] loads the file, patches dynamic
//! relocations in the read-only data so pointers look the way the dynamic
//! linker would have left them, and indexes symbols; [`itanium::ItaniumReader`]
//! then decodes vtables and typeinfo records and assembles the dump results,
//! which serialize to a JSON document keyed by mangled class symbol.

/// Error types and error handling
pub mod error;

/// Loaded-image view: VA-addressed bytes, sections, symbols
pub mod image;

/// Itanium vtable/RTTI record types and readers
pub mod itanium;

/// Logging and tracing infrastructure
pub mod logging;

pub use error::{Error, Result};
pub use image::Image;
pub use itanium::ItaniumReader;
