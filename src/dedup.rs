//! Assigns a dense integer `id` to each distinct memory value, and builds the `address -> id`
//! table consistent with [`crate::memory::MemoryLookup`]'s last-wins duplicate-address policy.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::felt::Felt256;
use crate::memory::MemoryTable;

/// `id -> value`: the unique multiset of observed memory values, one entry per distinct value,
/// ordered by first appearance in `memory.bin`. `id` is a bijection onto `[0, N)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryIdToValue {
    /// `values[id]` is the value assigned to `id`.
    pub values: Vec<Felt256>,
}

impl MemoryIdToValue {
    /// Number of distinct values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values were observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `address -> id`: the inner join of memory with [`MemoryIdToValue`] on value, built with the
/// same last-wins duplicate-address policy as [`crate::memory::MemoryReader`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryAddressToId {
    /// Addresses present, in ascending insertion order (arbitrary but stable within a run).
    pub address: Vec<u32>,
    /// `id[i]` is the id assigned to `address[i]`.
    pub id: Vec<u32>,
}

impl MemoryAddressToId {
    /// Number of distinct addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.address.len()
    }

    /// Returns `true` if no addresses were observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }
}

/// Deduplicates `memory`'s values and builds the resulting `id -> value` and `address -> id`
/// tables.
///
/// Value ids are assigned by first-appearance order in file order. Duplicate addresses resolve
/// last-wins, the same policy [`crate::memory::MemoryTable::to_lookup`] uses, so the two stay
/// mutually consistent for any given address.
pub fn deduplicate(memory: &MemoryTable) -> Result<(MemoryIdToValue, MemoryAddressToId)> {
    let mut value_to_id: HashMap<[u64; 4], u32> = HashMap::new();
    let mut id_to_value = MemoryIdToValue::default();

    for i in 0..memory.len() {
        let key = memory.value[i].limbs;
        if !value_to_id.contains_key(&key) {
            let id = u32::try_from(id_to_value.values.len()).map_err(|_| Error::OverflowError {
                field: "id",
                row: i,
                value: id_to_value.values.len() as u64,
            })?;
            value_to_id.insert(key, id);
            id_to_value.values.push(memory.value[i]);
        }
    }

    let mut address_to_id_map: HashMap<u32, u32> = HashMap::with_capacity(memory.len());
    for i in 0..memory.len() {
        let id = value_to_id[&memory.value[i].limbs];
        address_to_id_map.insert(memory.address[i], id);
    }

    let mut address_to_id = MemoryAddressToId::default();
    for (address, id) in address_to_id_map {
        address_to_id.address.push(address);
        address_to_id.id.push(id);
    }

    Ok((id_to_value, address_to_id))
}
