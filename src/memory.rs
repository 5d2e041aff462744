//! Streams `memory.bin` into a columnar table of `(address, value)` memory cells, and builds
//! the address-keyed lookup used by the operand resolver.

use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::felt::Felt256;
use crate::io_util::{read_fixed_records, read_u32_field, CancelSignal, NeverCancel};

/// Record size of one memory entry: one little-endian `u64` address plus four little-endian
/// `u64` value limbs.
pub const MEMORY_RECORD_SIZE: usize = 40;

/// A single `(address, value)` memory cell as read from `memory.bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCell {
    /// The memory address.
    pub address: u32,
    /// The 256-bit field element stored at that address.
    pub value: Felt256,
}

/// The columnar memory table, preserving file order. Duplicate addresses are tolerated here;
/// they are resolved only when building a [`MemoryLookup`] (§4.2, §9: last-wins).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTable {
    /// Address column.
    pub address: Vec<u32>,
    /// Value column.
    pub value: Vec<Felt256>,
}

impl MemoryTable {
    /// Number of memory cells read, including duplicate addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.address.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    /// Returns the cell at row `i`, if in range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<MemoryCell> {
        Some(MemoryCell { address: *self.address.get(i)?, value: *self.value.get(i)? })
    }

    /// Builds an `address -> value` lookup. When `memory.bin` contains duplicate addresses,
    /// the record that appears later in file order wins, per the documented last-wins policy.
    #[must_use]
    pub fn to_lookup(&self) -> MemoryLookup {
        let mut map = HashMap::with_capacity(self.len());
        for i in 0..self.len() {
            map.insert(self.address[i], self.value[i]);
        }
        MemoryLookup { map }
    }

    fn from_rows(rows: Vec<MemoryCell>) -> Self {
        let mut table =
            Self { address: Vec::with_capacity(rows.len()), value: Vec::with_capacity(rows.len()) };
        for row in rows {
            table.address.push(row.address);
            table.value.push(row.value);
        }
        table
    }
}

/// An `address -> value` lookup built from a [`MemoryTable`], used by the operand resolver to
/// join computed addresses against memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    map: HashMap<u32, Felt256>,
}

impl MemoryLookup {
    /// Looks up the value at `address`, returning `None` if the address was never written.
    #[must_use]
    pub fn get(&self, address: u32) -> Option<Felt256> {
        self.map.get(&address).copied()
    }

    /// Number of distinct addresses in the lookup.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the lookup has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Streams `memory.bin` from `path` into a [`MemoryTable`], preserving file order.
pub fn read_memory(path: &Path) -> Result<MemoryTable> {
    read_memory_cancellable(path, &NeverCancel)
}

/// As [`read_memory`], but aborts with [`crate::error::Error::Cancelled`] if `cancel` is
/// observed between chunks.
pub fn read_memory_cancellable(path: &Path, cancel: &dyn CancelSignal) -> Result<MemoryTable> {
    let rows = read_fixed_records(path, "MemoryReader", MEMORY_RECORD_SIZE, cancel, |bytes, row| {
        let address = read_u32_field(bytes[0..8].try_into().unwrap(), "address", row)?;
        let limb_0 = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let limb_1 = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let limb_2 = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        let limb_3 = u64::from_le_bytes(bytes[32..40].try_into().unwrap());
        Ok(MemoryCell { address, value: Felt256::from_limbs([limb_0, limb_1, limb_2, limb_3]) })
    })?;
    Ok(MemoryTable::from_rows(rows))
}
