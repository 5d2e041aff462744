//! Streams `trace.bin` into a columnar table of `(ap, fp, pc)` register snapshots.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io_util::{read_fixed_records, read_u32_field, CancelSignal, NeverCancel};

/// Record size of one trace entry: three little-endian `u64`s (`ap`, `fp`, `pc`).
pub const TRACE_RECORD_SIZE: usize = 24;

/// A single register snapshot taken at one execution step.
///
/// Row index within [`TraceTable`] is the execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Allocation pointer register.
    pub ap: u32,
    /// Frame pointer register.
    pub fp: u32,
    /// Program counter register.
    pub pc: u32,
}

/// The columnar trace table: one column per register, row order equal to file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceTable {
    /// Allocation pointer column.
    pub ap: Vec<u32>,
    /// Frame pointer column.
    pub fp: Vec<u32>,
    /// Program counter column.
    pub pc: Vec<u32>,
}

impl TraceTable {
    /// Number of execution steps (rows) in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ap.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ap.is_empty()
    }

    /// Returns the `(ap, fp, pc)` snapshot at `step`, if in range.
    #[must_use]
    pub fn row(&self, step: usize) -> Option<TraceRow> {
        Some(TraceRow { ap: *self.ap.get(step)?, fp: *self.fp.get(step)?, pc: *self.pc.get(step)? })
    }

    fn from_rows(rows: Vec<TraceRow>) -> Self {
        let mut table = Self {
            ap: Vec::with_capacity(rows.len()),
            fp: Vec::with_capacity(rows.len()),
            pc: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.ap.push(row.ap);
            table.fp.push(row.fp);
            table.pc.push(row.pc);
        }
        table
    }
}

/// Streams `trace.bin` from `path` into a [`TraceTable`], preserving file order.
pub fn read_trace(path: &Path) -> Result<TraceTable> {
    read_trace_cancellable(path, &NeverCancel)
}

/// As [`read_trace`], but aborts with [`crate::error::Error::Cancelled`] if `cancel` is
/// observed between chunks.
pub fn read_trace_cancellable(path: &Path, cancel: &dyn CancelSignal) -> Result<TraceTable> {
    let rows = read_fixed_records(path, "TraceReader", TRACE_RECORD_SIZE, cancel, |bytes, row| {
        let ap = read_u32_field(bytes[0..8].try_into().unwrap(), "ap", row)?;
        let fp = read_u32_field(bytes[8..16].try_into().unwrap(), "fp", row)?;
        let pc = read_u32_field(bytes[16..24].try_into().unwrap(), "pc", row)?;
        Ok(TraceRow { ap, fp, pc })
    })?;
    Ok(TraceTable::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    fn write_trace(path: &Path, rows: &[(u64, u64, u64)]) {
        let mut file = std::fs::File::create(path).unwrap();
        for (ap, fp, pc) in rows {
            file.write_all(&ap.to_le_bytes()).unwrap();
            file.write_all(&fp.to_le_bytes()).unwrap();
            file.write_all(&pc.to_le_bytes()).unwrap();
        }
    }

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("cairo-trace-adapter-trace-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn reads_rows_in_file_order() {
        let path = scratch_path("trace_order.bin");
        write_trace(&path, &[(1, 2, 3), (4, 5, 6), (7, 8, 9)]);

        let table = read_trace(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.row(0), Some(TraceRow { ap: 1, fp: 2, pc: 3 }));
        assert_eq!(table.row(1), Some(TraceRow { ap: 4, fp: 5, pc: 6 }));
        assert_eq!(table.row(2), Some(TraceRow { ap: 7, fp: 8, pc: 9 }));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_file_yields_empty_table() {
        let path = scratch_path("trace_empty.bin");
        std::fs::File::create(&path).unwrap();

        let table = read_trace(&path).unwrap();

        assert!(table.is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn overflowing_register_is_an_overflow_error() {
        let path = scratch_path("trace_overflow.bin");
        write_trace(&path, &[(u64::from(u32::MAX) + 1, 0, 0)]);

        let err = read_trace(&path).unwrap_err();

        assert!(matches!(err, Error::OverflowError { field: "ap", row: 0, .. }));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn truncated_file_of_length_25_fails_at_offset_24() {
        let path = scratch_path("trace_truncated.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0u8; 25]).unwrap();
        drop(file);

        let err = read_trace(&path).unwrap_err();

        assert!(matches!(err, Error::TruncatedRecord { offset: 24, .. }));
        std::fs::remove_file(&path).unwrap();
    }
}
