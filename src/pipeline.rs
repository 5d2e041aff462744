//! Composes the readers, decoder, classifier, resolver, and deduplicator into the end-to-end
//! `trace.bin` + `memory.bin` -> `state_transitions` dataset.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dedup::{deduplicate, MemoryAddressToId, MemoryIdToValue};
use crate::error::Result;
use crate::felt::Felt256;
use crate::instruction::{decode_instructions, InstructionFields};
use crate::io_util::{CancelSignal, NeverCancel};
use crate::memory::{read_memory_cancellable, MemoryTable};
use crate::opcode::{classify_instructions, Opcode};
use crate::operand::resolve_instructions;
use crate::trace::{read_trace_cancellable, TraceTable};

/// One fully-resolved execution step: the original `(ap, fp, pc)` snapshot, its decoded
/// instruction fields, classified opcode, and resolved operand addresses/values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionRow {
    /// Allocation pointer at this step.
    pub ap: u32,
    /// Frame pointer at this step.
    pub fp: u32,
    /// Program counter at this step.
    pub pc: u32,
    /// The raw 64-bit word decoded at `pc`.
    pub encoded_instruction: u64,
    /// The 19 decoded instruction fields.
    pub fields: InstructionFields,
    /// The classified opcode, after `jnz` refinement.
    pub opcode: Opcode,
    /// Effective address of `op0`.
    pub op0_addr: u32,
    /// Value at `op0_addr`, if written.
    pub op0: Option<Felt256>,
    /// Effective address of `op1`.
    pub op1_addr: u32,
    /// Value at `op1_addr`, if written.
    pub op1: Option<Felt256>,
    /// Effective address of `dst`.
    pub dst_addr: u32,
    /// Value at `dst_addr`, if written.
    pub dst: Option<Felt256>,
}

/// The columnar `state_transitions` table: one column per field of [`StateTransitionRow`], row
/// order equal to execution step order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateTransitionTable {
    /// Allocation pointer column.
    pub ap: Vec<u32>,
    /// Frame pointer column.
    pub fp: Vec<u32>,
    /// Program counter column.
    pub pc: Vec<u32>,
    /// Encoded instruction word column.
    pub encoded_instruction: Vec<u64>,
    /// Decoded instruction fields column.
    pub fields: Vec<InstructionFields>,
    /// Classified opcode column, after `jnz` refinement.
    pub opcode: Vec<Opcode>,
    /// `op0` address column.
    pub op0_addr: Vec<u32>,
    /// `op0` value column.
    pub op0: Vec<Option<Felt256>>,
    /// `op1` address column.
    pub op1_addr: Vec<u32>,
    /// `op1` value column.
    pub op1: Vec<Option<Felt256>>,
    /// `dst` address column.
    pub dst_addr: Vec<u32>,
    /// `dst` value column.
    pub dst: Vec<Option<Felt256>>,
}

impl StateTransitionTable {
    /// Number of execution steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ap.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ap.is_empty()
    }

    /// Returns the row at `step`, if in range.
    #[must_use]
    pub fn row(&self, step: usize) -> Option<StateTransitionRow> {
        Some(StateTransitionRow {
            ap: *self.ap.get(step)?,
            fp: *self.fp.get(step)?,
            pc: *self.pc.get(step)?,
            encoded_instruction: *self.encoded_instruction.get(step)?,
            fields: *self.fields.get(step)?,
            opcode: *self.opcode.get(step)?,
            op0_addr: *self.op0_addr.get(step)?,
            op0: *self.op0.get(step)?,
            op1_addr: *self.op1_addr.get(step)?,
            op1: *self.op1.get(step)?,
            dst_addr: *self.dst_addr.get(step)?,
            dst: *self.dst.get(step)?,
        })
    }
}

/// Distinct `(pc, encoded_instruction)` pairs observed across the trace, in first-appearance
/// order. A given `pc` is expected to decode to the same word on every visit, since program
/// text is immutable for the duration of a run; this table exists so a consumer can look up an
/// instruction by `pc` without re-scanning `state_transitions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionsByPc {
    /// Program counter column.
    pub pc: Vec<u32>,
    /// Encoded instruction word column.
    pub encoded_instruction: Vec<u64>,
}

/// The full output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The `state_transitions` table, in execution-step order.
    pub state_transitions: StateTransitionTable,
    /// `id -> value` for every distinct memory value observed.
    pub memory_id_to_value: MemoryIdToValue,
    /// `address -> id` for every address observed in memory.
    pub memory_address_to_id: MemoryAddressToId,
    /// Distinct `(pc, encoded_instruction)` pairs observed across the trace.
    pub instructions_by_pc: InstructionsByPc,
}

/// Runs the full pipeline against `trace.bin` and `memory.bin` under `base_path`.
pub fn run(trace_path: &Path, memory_path: &Path) -> Result<PipelineOutput> {
    run_cancellable(trace_path, memory_path, &NeverCancel)
}

/// As [`run`], but aborts with [`crate::error::Error::Cancelled`] if `cancel` is observed
/// between reader chunks.
pub fn run_cancellable(
    trace_path: &Path,
    memory_path: &Path,
    cancel: &dyn CancelSignal,
) -> Result<PipelineOutput> {
    let trace = read_trace_cancellable(trace_path, cancel)?;
    let memory = read_memory_cancellable(memory_path, cancel)?;
    tracing::info!(steps = trace.len(), cells = memory.len(), "readers complete");

    let lookup = memory.to_lookup();

    let encoded_instruction = encode_instruction_column(&trace, &lookup);
    let fields = decode_instructions(&encoded_instruction)?;
    tracing::info!(rows = fields.len(), "decode complete");

    let opcode = classify_instructions(&fields);
    tracing::info!(rows = opcode.len(), "classify complete");

    let resolved = resolve_instructions(&trace.ap, &trace.fp, &trace.pc, &fields, &lookup);
    tracing::info!(rows = resolved.len(), "resolve complete");

    let mut state_transitions = StateTransitionTable::default();
    for step in 0..trace.len() {
        let r = &resolved[step];
        let label = refine_jnz(opcode[step], r.dst);
        state_transitions.ap.push(trace.ap[step]);
        state_transitions.fp.push(trace.fp[step]);
        state_transitions.pc.push(trace.pc[step]);
        state_transitions.encoded_instruction.push(encoded_instruction[step]);
        state_transitions.fields.push(fields[step]);
        state_transitions.opcode.push(label);
        state_transitions.op0_addr.push(r.op0_addr);
        state_transitions.op0.push(r.op0);
        state_transitions.op1_addr.push(r.op1_addr);
        state_transitions.op1.push(r.op1);
        state_transitions.dst_addr.push(r.dst_addr);
        state_transitions.dst.push(r.dst);
    }

    let (memory_id_to_value, memory_address_to_id) = deduplicate(&memory)?;
    tracing::info!(distinct_values = memory_id_to_value.len(), "dedup complete");

    let instructions_by_pc = build_instructions_by_pc(&trace.pc, &encoded_instruction);

    Ok(PipelineOutput {
        state_transitions,
        memory_id_to_value,
        memory_address_to_id,
        instructions_by_pc,
    })
}

/// Looks up `value_limb_0` of the memory cell at each row's `pc`, yielding that row's encoded
/// instruction word. A `pc` with no memory cell yields `0`, which decodes to an all-don't-care
/// instruction rather than failing the pipeline; `pc` is always expected to be populated by a
/// well-formed trace.
fn encode_instruction_column(trace: &TraceTable, lookup: &crate::memory::MemoryLookup) -> Vec<u64> {
    (0..trace.len()).map(|i| lookup.get(trace.pc[i]).map_or(0, |v| v.limb_0())).collect()
}

fn refine_jnz(label: Opcode, dst: Option<Felt256>) -> Opcode {
    if label == Opcode::Jnz && dst.is_some_and(|v| v.is_zero()) {
        Opcode::JnzTaken
    } else {
        label
    }
}

fn build_instructions_by_pc(pc: &[u32], encoded_instruction: &[u64]) -> InstructionsByPc {
    use hashbrown::HashSet;

    let mut seen = HashSet::with_capacity(pc.len());
    let mut table = InstructionsByPc::default();
    for i in 0..pc.len() {
        if seen.insert(pc[i]) {
            table.pc.push(pc[i]);
            table.encoded_instruction.push(encoded_instruction[i]);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir =
            std::env::temp_dir().join(format!("cairo-trace-adapter-pipeline-test-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_trace(path: &Path, rows: &[(u64, u64, u64)]) {
        let mut file = std::fs::File::create(path).unwrap();
        for (ap, fp, pc) in rows {
            file.write_all(&ap.to_le_bytes()).unwrap();
            file.write_all(&fp.to_le_bytes()).unwrap();
            file.write_all(&pc.to_le_bytes()).unwrap();
        }
    }

    fn write_memory(path: &Path, rows: &[(u64, [u64; 4])]) {
        let mut file = std::fs::File::create(path).unwrap();
        for (address, limbs) in rows {
            file.write_all(&address.to_le_bytes()).unwrap();
            for limb in limbs {
                file.write_all(&limb.to_le_bytes()).unwrap();
            }
        }
    }

    #[test]
    fn ret_step_runs_end_to_end() {
        let dir = scratch_dir("ret");
        let trace_path = dir.join("trace.bin");
        let memory_path = dir.join("memory.bin");
        write_trace(&trace_path, &[(100, 100, 10)]);
        write_memory(&memory_path, &[(10, [0x208b_7fff_7fff_7ffe, 0, 0, 0])]);

        let output = run(&trace_path, &memory_path).unwrap();

        assert_eq!(output.state_transitions.len(), 1);
        assert_eq!(output.state_transitions.row(0).unwrap().opcode, Opcode::Ret);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn jnz_with_zero_dst_is_refined_to_taken() {
        let dir = scratch_dir("jnz");
        let trace_path = dir.join("trace.bin");
        let memory_path = dir.join("memory.bin");

        let mut fields = crate::instruction::decode_instruction(0, 0).unwrap();
        fields.offset0 = 5;
        fields.offset1 = -1;
        fields.offset2 = 1;
        fields.op0_base_fp = true;
        fields.op_1_imm = true;
        fields.pc_update_jnz = true;
        let encoded = crate::instruction::encode_instruction(&fields);

        write_trace(&trace_path, &[(0, 0, 0)]);
        write_memory(&memory_path, &[(0, [encoded, 0, 0, 0]), (5, [0, 0, 0, 0])]);

        let output = run(&trace_path, &memory_path).unwrap();
        let row = output.state_transitions.row(0).unwrap();

        assert_eq!(row.dst, Some(Felt256::ZERO));
        assert_eq!(row.opcode, Opcode::JnzTaken);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_opcode_extension_fails_the_pipeline() {
        let dir = scratch_dir("invalid-ext");
        let trace_path = dir.join("trace.bin");
        let memory_path = dir.join("memory.bin");
        write_trace(&trace_path, &[(0, 0, 0)]);
        write_memory(&memory_path, &[(0, [4u64 << 63, 0, 0, 0])]);

        let err = run(&trace_path, &memory_path).unwrap_err();

        assert!(matches!(err, crate::error::Error::InvalidOpcodeExtension { row: 0, value: 4 }));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn instructions_by_pc_deduplicates_by_first_appearance() {
        let dir = scratch_dir("by-pc");
        let trace_path = dir.join("trace.bin");
        let memory_path = dir.join("memory.bin");
        write_trace(&trace_path, &[(0, 0, 10), (0, 0, 10), (0, 0, 11)]);
        write_memory(&memory_path, &[(10, [1, 0, 0, 0]), (11, [2, 0, 0, 0])]);

        let output = run(&trace_path, &memory_path).unwrap();

        assert_eq!(output.instructions_by_pc.pc, vec![10, 11]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
