//! Reads the one environment variable the adapter needs to locate its input files.

use std::path::PathBuf;

use crate::error::{Error, Result};

const BASE_PATH_VAR: &str = "BASE_PATH";
const TRACE_FILE_NAME: &str = "trace.bin";
const MEMORY_FILE_NAME: &str = "memory.bin";

/// The resolved paths to `trace.bin` and `memory.bin`, derived from `BASE_PATH`.
///
/// This is deliberately minimal: one environment variable, joined with two fixed file names.
/// No richer configuration format, no candidate-directory search, no defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path to `trace.bin` under `BASE_PATH`.
    pub trace_path: PathBuf,
    /// Path to `memory.bin` under `BASE_PATH`.
    pub memory_path: PathBuf,
}

impl Config {
    /// Reads `BASE_PATH` from the environment and joins it with the two fixed file names.
    ///
    /// A missing or non-UTF8 `BASE_PATH` is a fatal [`Error::Io`] at startup, since no further
    /// I/O can proceed without it.
    pub fn from_env() -> Result<Self> {
        let base_path = std::env::var(BASE_PATH_VAR).map_err(|_| Error::Io {
            path: PathBuf::from(BASE_PATH_VAR),
            cause: std::io::Error::new(std::io::ErrorKind::NotFound, "BASE_PATH is not set"),
        })?;
        let base_path = PathBuf::from(base_path);
        Ok(Self {
            trace_path: base_path.join(TRACE_FILE_NAME),
            memory_path: base_path.join(MEMORY_FILE_NAME),
        })
    }
}
