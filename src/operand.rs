//! Computes the three operand addresses (`op0`, `op1`, `dst`) for each row and joins them
//! against memory.

use crate::felt::Felt256;
use crate::instruction::InstructionFields;
use crate::memory::MemoryLookup;

/// The three resolved operand addresses and their joined memory values for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOperands {
    /// Effective address of `op0`.
    pub op0_addr: u32,
    /// Value at `op0_addr`, or `None` if that address was never written.
    pub op0: Option<Felt256>,
    /// Effective address of `op1`.
    pub op1_addr: u32,
    /// Value at `op1_addr`, or `None` if that address was never written.
    pub op1: Option<Felt256>,
    /// Effective address of `dst`.
    pub dst_addr: u32,
    /// Value at `dst_addr`, or `None` if that address was never written.
    pub dst: Option<Felt256>,
}

/// Resolves the operand addresses for one row's `(ap, fp, pc)` snapshot and decoded fields,
/// then joins each against `memory`.
///
/// `op0` must be resolved before `op1`, since `op1_addr`'s double-deref form (none of
/// `op_1_base_fp`, `op_1_base_ap`, `op_1_imm` set) uses `op0`'s looked-up value as its base.
#[must_use]
pub fn resolve_operands(
    ap: u32,
    fp: u32,
    pc: u32,
    fields: &InstructionFields,
    memory: &MemoryLookup,
) -> ResolvedOperands {
    let op0_base = if fields.op0_base_fp { fp } else { ap };
    let op0_addr = op0_base.wrapping_add_signed(i32::from(fields.offset1));
    let op0 = memory.get(op0_addr);

    // In the double-deref form (none of the three base flags set), `op1_base` is `op0`'s
    // looked-up value. A null `op0` makes `op1_base` null too, and a null-keyed memory join
    // yields no match — so `op1` must stay `None` even though some address is still reported.
    let (op1_base, op1_base_defined) = if fields.op_1_base_fp {
        (fp, true)
    } else if fields.op_1_base_ap {
        (ap, true)
    } else if fields.op_1_imm {
        (pc.wrapping_add(1), true)
    } else {
        match op0 {
            Some(v) => (v.limb_0() as u32, true),
            None => (0, false),
        }
    };
    let op1_addr = op1_base.wrapping_add_signed(i32::from(fields.offset2));
    let op1 = if op1_base_defined { memory.get(op1_addr) } else { None };

    let dst_base = if fields.dst_base_fp { fp } else { ap };
    let dst_addr = dst_base.wrapping_add_signed(i32::from(fields.offset0));
    let dst = memory.get(dst_addr);

    ResolvedOperands { op0_addr, op0, op1_addr, op1, dst_addr, dst }
}

/// Resolves operands for a whole column of rows, in parallel.
#[must_use]
pub fn resolve_instructions(
    ap: &[u32],
    fp: &[u32],
    pc: &[u32],
    fields: &[InstructionFields],
    memory: &MemoryLookup,
) -> Vec<ResolvedOperands> {
    use rayon::prelude::*;
    (0..fields.len())
        .into_par_iter()
        .map(|i| resolve_operands(ap[i], fp[i], pc[i], &fields[i], memory))
        .collect()
}
