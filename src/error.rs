//! Error types for vtdump.
//!
//! Fatal conditions (a dump cannot start or must stop) are modeled here.
//! Per-record parse failures are not errors: the readers log them with a
//! bracketed diagnostic code and drop the record.

use thiserror::Error;

/// Main error type for vtdump operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The binary-format loader rejected the image
    #[error("failed to parse image: {0}")]
    Parse(#[from] object::Error),

    /// Image format not supported
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Architecture not supported
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// A virtual address with no backing load segment
    #[error("address {0:#x} is not mapped by any load segment")]
    UnmappedAddress(u64),

    /// Reading stopped at the all-ones cursor sentinel
    #[error("for some unknown reason, the reading process stopped")]
    CorruptImage,
}

/// Result type alias for vtdump operations
pub type Result<T> = std::result::Result<T, Error>;
