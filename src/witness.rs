//! Projects `state_transitions` rows down to the column subset a given opcode family's
//! downstream prover stage needs.
//!
//! This is intentionally the thinnest component in the crate (§1, §4.8): a declarative
//! `(Opcode, columns)` registry plus one generic filter-and-select function, rather than a
//! hand-written projection per opcode family.

use crate::opcode::Opcode;
use crate::pipeline::{StateTransitionRow, StateTransitionTable};

/// Identifies one column of [`StateTransitionRow`] that a witness projection can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnId {
    /// `ap`.
    Ap,
    /// `fp`.
    Fp,
    /// `pc`.
    Pc,
    /// `op0_addr`.
    Op0Addr,
    /// `op0`.
    Op0,
    /// `op1_addr`.
    Op1Addr,
    /// `op1`.
    Op1,
    /// `dst_addr`.
    DstAddr,
    /// `dst`.
    Dst,
}

/// One selected value from a [`StateTransitionRow`], tagged by which column it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue {
    /// A `u32`-valued column (`ap`, `fp`, `pc`, or an address column).
    U32(u32),
    /// A `Felt256`-valued column (`op0`, `op1`, or `dst`), nullable.
    Felt(Option<crate::felt::Felt256>),
}

fn select(row: &StateTransitionRow, column: ColumnId) -> ColumnValue {
    match column {
        ColumnId::Ap => ColumnValue::U32(row.ap),
        ColumnId::Fp => ColumnValue::U32(row.fp),
        ColumnId::Pc => ColumnValue::U32(row.pc),
        ColumnId::Op0Addr => ColumnValue::U32(row.op0_addr),
        ColumnId::Op0 => ColumnValue::Felt(row.op0),
        ColumnId::Op1Addr => ColumnValue::U32(row.op1_addr),
        ColumnId::Op1 => ColumnValue::Felt(row.op1),
        ColumnId::DstAddr => ColumnValue::U32(row.dst_addr),
        ColumnId::Dst => ColumnValue::Felt(row.dst),
    }
}

/// The declarative `(opcode, columns)` registry. Each entry names the columns a downstream
/// witness stage for that opcode family consumes, in the order it expects them.
pub static WITNESS_COLUMNS: &[(Opcode, &[ColumnId])] = &[
    (Opcode::Add, &[ColumnId::Op0, ColumnId::Op1, ColumnId::Dst]),
    (Opcode::Mul, &[ColumnId::Op0, ColumnId::Op1, ColumnId::Dst]),
    (Opcode::AssertEq, &[ColumnId::Op0Addr, ColumnId::Dst]),
    (Opcode::Jnz, &[ColumnId::Dst, ColumnId::Pc]),
    (Opcode::JnzTaken, &[ColumnId::Dst, ColumnId::Pc]),
    (Opcode::Ret, &[ColumnId::Fp, ColumnId::Pc]),
    (Opcode::Blake, &[ColumnId::Op0, ColumnId::Op1]),
    (Opcode::Qm31AddMul, &[ColumnId::Op0, ColumnId::Op1, ColumnId::Dst]),
];

/// Looks up the declared column tuple for `opcode`, if the registry names one.
#[must_use]
pub fn columns_for(opcode: Opcode) -> Option<&'static [ColumnId]> {
    WITNESS_COLUMNS.iter().find(|(o, _)| *o == opcode).map(|(_, cols)| *cols)
}

/// Filters `table` down to rows labeled `opcode`, selecting the columns the registry declares
/// for that opcode. Rows are returned in their original `state_transitions` order.
///
/// Returns `None` if `opcode` has no registry entry — every opcode family with a downstream
/// witness stage is expected to be registered in [`WITNESS_COLUMNS`].
#[must_use]
pub fn project(table: &StateTransitionTable, opcode: Opcode) -> Option<Vec<Vec<ColumnValue>>> {
    let columns = columns_for(opcode)?;
    Some(
        (0..table.len())
            .filter_map(|step| table.row(step))
            .filter(|row| row.opcode == opcode)
            .map(|row| columns.iter().map(|&c| select(&row, c)).collect())
            .collect(),
    )
}
