//! Shared chunked-reading discipline for the two fixed-record binary formats.
//!
//! Both [`crate::trace::TraceReader`] and [`crate::memory::MemoryReader`] stream their input
//! file in chunks of whole records, decode each record with a small per-format callback, and
//! emit one `tracing::info!` record per chunk. This module factors that discipline out so the
//! two readers differ only in record size and decode logic.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Default chunk size, expressed as a byte budget rather than a record count so readers with
/// different record sizes land on roughly the same ~1 MiB I/O granularity.
pub const DEFAULT_CHUNK_BYTES: usize = 1 << 20;

/// Cooperative cancellation, checked between chunks (§5: "cooperative at chunk boundaries").
pub trait CancelSignal {
    /// Returns `true` once cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

impl CancelSignal for std::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// A [`CancelSignal`] that never cancels, for callers that don't need cooperative cancellation.
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Stream `path` as a sequence of fixed-size `record_size`-byte records, decoding each with
/// `decode` into a `T` and collecting all of them in file order.
///
/// `reader_name` is used only for the per-chunk log line. A trailing partial record (fewer
/// than `record_size` bytes remaining at EOF) is a fatal [`Error::TruncatedRecord`].
pub fn read_fixed_records<T>(
    path: &Path,
    reader_name: &str,
    record_size: usize,
    cancel: &dyn CancelSignal,
    mut decode: impl FnMut(&[u8], usize) -> Result<T>,
) -> Result<Vec<T>> {
    let mut file = File::open(path).map_err(|cause| Error::Io { path: path.to_path_buf(), cause })?;

    let records_per_chunk = (DEFAULT_CHUNK_BYTES / record_size).max(1);
    let chunk_bytes = records_per_chunk * record_size;
    let mut buf = vec![0u8; chunk_bytes];

    let mut rows = Vec::new();
    let mut byte_offset: u64 = 0;
    let mut chunk_index = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let filled = read_up_to(&mut file, &mut buf, path)?;
        if filled == 0 {
            break;
        }
        if filled % record_size != 0 {
            return Err(Error::TruncatedRecord {
                path: path.to_path_buf(),
                offset: byte_offset + (filled - filled % record_size) as u64,
            });
        }

        let record_count = filled / record_size;
        for i in 0..record_count {
            let start = i * record_size;
            let row = decode(&buf[start..start + record_size], rows.len())?;
            rows.push(row);
        }

        tracing::info!(
            reader = reader_name,
            chunk = chunk_index,
            records = record_count,
            "chunk processed"
        );
        chunk_index += 1;
        byte_offset += filled as u64;

        if filled < chunk_bytes {
            break;
        }
    }

    Ok(rows)
}

/// Fill `buf` with as many bytes as are available up to `buf.len()`, short of EOF. Returns the
/// number of bytes actually read. A read that stops mid-record (not aligned to `buf.len()` and
/// not exactly at EOF) is reported as the caller's problem via the returned byte count; the
/// caller decides whether that count is a valid record boundary.
fn read_up_to(file: &mut File, buf: &mut [u8], path: &Path) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(cause) if cause.kind() == ErrorKind::Interrupted => continue,
            Err(cause) => return Err(Error::Io { path: path.to_path_buf(), cause }),
        }
    }
    Ok(total)
}

/// Read a little-endian `u64` out of an 8-byte slice, then assert it fits in `u32`.
///
/// Every on-disk register and address field is declared as a 64-bit little-endian integer but
/// is domain-bounded to `u32`; this is the one conversion point all readers funnel through.
pub fn read_u32_field(bytes: &[u8; 8], field: &'static str, row: usize) -> Result<u32> {
    let value = u64::from_le_bytes(*bytes);
    u32::try_from(value).map_err(|_| Error::OverflowError { field, row, value })
}
