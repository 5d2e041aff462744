//! Error kinds shared by every stage of the adapter pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that the adapter pipeline can throw.
///
/// Every stage (readers, decoder, classifier, resolver, deduplicator, pipeline) returns
/// this same closed set of error kinds. None of them are recoverable internally; all
/// surface to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Failure opening or reading a file, or a missing/invalid `BASE_PATH`.
    #[error("io error at {path}: {cause}")]
    Io {
        /// The path that was being read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        cause: std::io::Error,
    },

    /// Fewer bytes remained in the file than one fixed-size record requires.
    #[error("truncated record in {path} at byte offset {offset}")]
    TruncatedRecord {
        /// The file being read.
        path: PathBuf,
        /// The byte offset at which the truncated record begins.
        offset: u64,
    },

    /// A declared `u32` field exceeded `2^32 - 1` when read from its 64-bit on-disk slot.
    #[error("field {field} overflowed u32 at row {row}: {value}")]
    OverflowError {
        /// The name of the field that overflowed.
        field: &'static str,
        /// The row index at which the overflow occurred.
        row: usize,
        /// The out-of-range value that was read.
        value: u64,
    },

    /// `opcode_extension` decoded to a value greater than 3.
    #[error("invalid opcode_extension {value} at row {row} (must be <= 3)")]
    InvalidOpcodeExtension {
        /// The row index at which the invalid extension occurred.
        row: usize,
        /// The offending value.
        value: u64,
    },

    /// The pipeline observed a cancellation signal between chunks.
    #[error("pipeline cancelled")]
    Cancelled,
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
