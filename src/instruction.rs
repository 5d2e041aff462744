//! Decodes a column of 64-bit encoded instruction words into their 19 typed fields.
//!
//! The bit layout is fixed and authoritative (§3 of the design document): three biased 16-bit
//! offsets, sixteen single-bit flags, and a trailing `opcode_extension` occupying everything
//! from bit 63 upward. Decoding is pure bit-twiddling — right shifts, masks, and a bias
//! subtraction — with no data-dependent branching.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const OFFSET_BIAS: i32 = 1 << 15;

/// The 19 fields decoded from one `encoded_instruction: u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionFields {
    /// Biased offset bits 0–15, debiased to a signed 16-bit value.
    pub offset0: i16,
    /// Biased offset bits 16–31, debiased to a signed 16-bit value.
    pub offset1: i16,
    /// Biased offset bits 32–47, debiased to a signed 16-bit value.
    pub offset2: i16,
    /// Bit 48.
    pub dst_base_fp: bool,
    /// Bit 49.
    pub op0_base_fp: bool,
    /// Bit 50.
    pub op_1_imm: bool,
    /// Bit 51.
    pub op_1_base_fp: bool,
    /// Bit 52.
    pub op_1_base_ap: bool,
    /// Bit 53.
    pub res_add: bool,
    /// Bit 54.
    pub res_mul: bool,
    /// Bit 55.
    pub pc_update_jump: bool,
    /// Bit 56.
    pub pc_update_jump_rel: bool,
    /// Bit 57.
    pub pc_update_jnz: bool,
    /// Bit 58.
    pub ap_update_add: bool,
    /// Bit 59.
    pub ap_update_add_1: bool,
    /// Bit 60.
    pub opcode_call: bool,
    /// Bit 61.
    pub opcode_ret: bool,
    /// Bit 62.
    pub opcode_assert_eq: bool,
    /// Bits 63 and above. Validated to be in `{0, 1, 2, 3}` at decode time.
    pub opcode_extension: u8,
}

fn bit(word: u64, index: u32) -> bool {
    (word >> index) & 1 == 1
}

fn debias(raw: u16) -> i16 {
    (i32::from(raw) - OFFSET_BIAS) as i16
}

fn rebias(offset: i16) -> u16 {
    (i32::from(offset) + OFFSET_BIAS) as u16
}

/// Decodes a single encoded instruction word into its 19 fields.
///
/// Fails with [`Error::InvalidOpcodeExtension`] if `opcode_extension` decodes to anything
/// outside `{0, 1, 2, 3}`.
pub fn decode_instruction(encoded: u64, row: usize) -> Result<InstructionFields> {
    let opcode_extension_raw = encoded >> 63;
    if opcode_extension_raw > 3 {
        return Err(Error::InvalidOpcodeExtension { row, value: opcode_extension_raw });
    }

    Ok(InstructionFields {
        offset0: debias((encoded & 0xffff) as u16),
        offset1: debias(((encoded >> 16) & 0xffff) as u16),
        offset2: debias(((encoded >> 32) & 0xffff) as u16),
        dst_base_fp: bit(encoded, 48),
        op0_base_fp: bit(encoded, 49),
        op_1_imm: bit(encoded, 50),
        op_1_base_fp: bit(encoded, 51),
        op_1_base_ap: bit(encoded, 52),
        res_add: bit(encoded, 53),
        res_mul: bit(encoded, 54),
        pc_update_jump: bit(encoded, 55),
        pc_update_jump_rel: bit(encoded, 56),
        pc_update_jnz: bit(encoded, 57),
        ap_update_add: bit(encoded, 58),
        ap_update_add_1: bit(encoded, 59),
        opcode_call: bit(encoded, 60),
        opcode_ret: bit(encoded, 61),
        opcode_assert_eq: bit(encoded, 62),
        opcode_extension: opcode_extension_raw as u8,
    })
}

/// Decodes a whole column of encoded instruction words, in parallel.
///
/// This is the vectorized entry point the pipeline uses: one `rayon` pass over the column,
/// with no branching beyond the per-field mask-and-shift sequence in [`decode_instruction`].
pub fn decode_instructions(encoded: &[u64]) -> Result<Vec<InstructionFields>> {
    use rayon::prelude::*;
    encoded.par_iter().enumerate().map(|(row, &word)| decode_instruction(word, row)).collect()
}

/// Re-encodes a decoded [`InstructionFields`] back into its `u64` word, reversing the layout in
/// §3. Used only to assert the decoder round-trips; not part of the adapter's forward pipeline.
#[must_use]
pub fn encode_instruction(fields: &InstructionFields) -> u64 {
    let mut word = u64::from(rebias(fields.offset0));
    word |= u64::from(rebias(fields.offset1)) << 16;
    word |= u64::from(rebias(fields.offset2)) << 32;
    word |= u64::from(fields.dst_base_fp) << 48;
    word |= u64::from(fields.op0_base_fp) << 49;
    word |= u64::from(fields.op_1_imm) << 50;
    word |= u64::from(fields.op_1_base_fp) << 51;
    word |= u64::from(fields.op_1_base_ap) << 52;
    word |= u64::from(fields.res_add) << 53;
    word |= u64::from(fields.res_mul) << 54;
    word |= u64::from(fields.pc_update_jump) << 55;
    word |= u64::from(fields.pc_update_jump_rel) << 56;
    word |= u64::from(fields.pc_update_jnz) << 57;
    word |= u64::from(fields.ap_update_add) << 58;
    word |= u64::from(fields.ap_update_add_1) << 59;
    word |= u64::from(fields.opcode_call) << 60;
    word |= u64::from(fields.opcode_ret) << 61;
    word |= u64::from(fields.opcode_assert_eq) << 62;
    word |= u64::from(fields.opcode_extension) << 63;
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ret_instruction_decodes_to_expected_offsets() {
        let fields = decode_instruction(0x208b_7fff_7fff_7ffe, 0).unwrap();
        assert_eq!(fields.offset0, -2);
        assert_eq!(fields.offset1, -1);
        assert_eq!(fields.offset2, -1);
        assert!(fields.dst_base_fp);
        assert!(fields.op0_base_fp);
        assert!(!fields.op_1_imm);
        assert!(fields.op_1_base_fp);
        assert!(fields.pc_update_jump);
        assert!(fields.opcode_ret);
        assert_eq!(fields.opcode_extension, 0);
    }

    #[test]
    fn call_rel_imm_instruction_decodes_to_expected_offsets() {
        let fields = decode_instruction(0x1104_8001_8001_8000, 0).unwrap();
        assert_eq!(fields.offset0, 0);
        assert_eq!(fields.offset1, 1);
        assert_eq!(fields.offset2, 1);
        assert!(fields.op_1_imm);
        assert!(fields.pc_update_jump_rel);
        assert!(fields.opcode_call);
    }

    #[test]
    fn add_with_immediate_decodes_to_expected_offsets() {
        let fields = decode_instruction(0x4806_8001_7fff_8000, 0).unwrap();
        assert_eq!(fields.offset0, 0);
        assert_eq!(fields.offset1, -1);
        assert_eq!(fields.offset2, 1);
        assert!(fields.op_1_imm);
        assert!(fields.res_add);
        assert!(fields.opcode_assert_eq);
    }

    #[test]
    fn opcode_extension_above_three_is_rejected() {
        let encoded = 4u64 << 63;
        let err = decode_instruction(encoded, 7).unwrap_err();
        assert!(matches!(err, Error::InvalidOpcodeExtension { row: 7, value: 4 }));
    }

    #[test]
    fn vectorized_decode_matches_scalar_decode() {
        let words = [0x208b_7fff_7fff_7ffeu64, 0x1104_8001_8001_8000, 0x4806_8001_7fff_8000];
        let decoded = decode_instructions(&words).unwrap();
        for (row, &word) in words.iter().enumerate() {
            assert_eq!(decoded[row], decode_instruction(word, row).unwrap());
        }
    }

    #[test]
    fn vectorized_decode_surfaces_first_invalid_extension() {
        let words = [0u64, 4u64 << 63];
        let err = decode_instructions(&words).unwrap_err();
        assert!(matches!(err, Error::InvalidOpcodeExtension { row: 1, value: 4 }));
    }

    proptest! {
        #[test]
        fn decode_then_encode_round_trips(
            offset0_raw in 0u16..=u16::MAX,
            offset1_raw in 0u16..=u16::MAX,
            offset2_raw in 0u16..=u16::MAX,
            flags in 0u16..=0x7fff,
            opcode_extension in 0u64..=3,
        ) {
            let mut encoded = u64::from(offset0_raw);
            encoded |= u64::from(offset1_raw) << 16;
            encoded |= u64::from(offset2_raw) << 32;
            encoded |= u64::from(flags) << 48;
            encoded |= opcode_extension << 63;

            let fields = decode_instruction(encoded, 0).unwrap();
            let re_encoded = encode_instruction(&fields);
            prop_assert_eq!(re_encoded, encoded);
        }

        #[test]
        fn decoded_offsets_and_extension_stay_in_range(encoded in any::<u64>()) {
            if let Ok(fields) = decode_instruction(encoded, 0) {
                prop_assert!(fields.offset0 >= -32768 && fields.offset0 <= 32767);
                prop_assert!(fields.offset1 >= -32768 && fields.offset1 <= 32767);
                prop_assert!(fields.offset2 >= -32768 && fields.offset2 <= 32767);
                prop_assert!(fields.opcode_extension <= 3);
            }
        }
    }
}
