//! Opcode categories and the precedence-cascade classifier that assigns them.
//!
//! The cascade in [`classify`] is the authoritative ordering: each row receives the label of
//! the first predicate it satisfies, and a row matching none falls through to
//! [`Opcode::Generic`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instruction::InstructionFields;

/// The closed set of opcode categories a decoded instruction can be classified into.
///
/// Mirrors a fieldless, `#[repr(u8)]` enum in the executor-crate style: a stable discriminant,
/// a [`Opcode::mnemonic`] accessor, and a [`fmt::Display`] impl, rather than a plain string.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Opcode {
    /// `ret`.
    Ret = 0,
    /// `add_ap`.
    AddAp = 1,
    /// `jump_rel_imm`.
    JumpRelImm = 2,
    /// `jump_rel`.
    JumpRel = 3,
    /// `jump_double_deref`.
    JumpDoubleDeref = 4,
    /// `jump_abs`.
    Jump = 5,
    /// `call_rel`.
    CallRel = 6,
    /// `call_abs_fp`.
    CallOp1BaseFp = 7,
    /// `call_abs_ap`.
    Call = 8,
    /// `jnz`, before the post-classification refinement.
    Jnz = 9,
    /// `jnz`, refined: the branch is taken (`dst == 0`).
    JnzTaken = 10,
    /// `assert_eq_imm`.
    AssertEqImm = 11,
    /// `assert_eq_double_deref`.
    AssertEqDoubleDeref = 12,
    /// `assert_eq`.
    AssertEq = 13,
    /// `mul`.
    Mul = 14,
    /// `add`.
    Add = 15,
    /// `blake`.
    Blake = 16,
    /// `qm31`.
    Qm31AddMul = 17,
    /// The default sink: no predicate matched.
    Generic = 18,
}

impl Opcode {
    /// The stable, lowercase mnemonic used in logs and serialized output.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Ret => "ret_opcode",
            Opcode::AddAp => "add_ap_opcode",
            Opcode::JumpRelImm => "jump_opcode_rel_imm",
            Opcode::JumpRel => "jump_opcode_rel",
            Opcode::JumpDoubleDeref => "jump_opcode_double_deref",
            Opcode::Jump => "jump_opcode",
            Opcode::CallRel => "call_opcode_rel",
            Opcode::CallOp1BaseFp => "call_opcode_op_1_base_fp",
            Opcode::Call => "call_opcode",
            Opcode::Jnz => "jnz_opcode",
            Opcode::JnzTaken => "jnz_opcode_taken",
            Opcode::AssertEqImm => "assert_eq_opcode_imm",
            Opcode::AssertEqDoubleDeref => "assert_eq_opcode_double_deref",
            Opcode::AssertEq => "assert_eq_opcode",
            Opcode::Mul => "mul_opcode",
            Opcode::Add => "add_opcode",
            Opcode::Blake => "blake_opcode",
            Opcode::Qm31AddMul => "qm31_add_mul_opcode",
            Opcode::Generic => "generic_opcode",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

fn exactly_one_op1_base(f: &InstructionFields) -> bool {
    u8::from(f.op_1_imm) + u8::from(f.op_1_base_fp) + u8::from(f.op_1_base_ap) == 1
}

fn imm_implies_off2_1(f: &InstructionFields) -> bool {
    !f.op_1_imm || f.offset2 == 1
}

fn is_ret(f: &InstructionFields) -> bool {
    f.offset0 == -2
        && f.offset1 == -1
        && f.offset2 == -1
        && f.dst_base_fp
        && f.op0_base_fp
        && !f.op_1_imm
        && f.op_1_base_fp
        && !f.op_1_base_ap
        && !f.res_add
        && !f.res_mul
        && f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.ap_update_add_1
        && !f.opcode_call
        && f.opcode_ret
        && !f.opcode_assert_eq
        && f.opcode_extension == 0
}

fn is_add_ap(f: &InstructionFields) -> bool {
    f.offset0 == -1
        && f.offset1 == -1
        && f.dst_base_fp
        && f.op0_base_fp
        && !f.res_add
        && !f.res_mul
        && !f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && f.ap_update_add
        && !f.ap_update_add_1
        && !f.opcode_call
        && !f.opcode_ret
        && !f.opcode_assert_eq
        && f.opcode_extension == 0
        && exactly_one_op1_base(f)
        && imm_implies_off2_1(f)
}

fn is_jump_base(f: &InstructionFields) -> bool {
    f.offset0 == -1
        && f.dst_base_fp
        && !f.res_add
        && !f.res_mul
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && !f.opcode_assert_eq
        && f.opcode_extension == 0
}

fn is_jump_rel_imm(f: &InstructionFields) -> bool {
    is_jump_base(f)
        && f.op_1_imm
        && f.pc_update_jump_rel
        && !f.pc_update_jump
        && !f.op_1_base_fp
        && !f.op_1_base_ap
        && f.op0_base_fp
        && f.offset1 == -1
        && f.offset2 == 1
}

fn is_jump_rel(f: &InstructionFields) -> bool {
    is_jump_base(f)
        && !f.op_1_imm
        && f.pc_update_jump_rel
        && !f.pc_update_jump
        && (f.op_1_base_fp || f.op_1_base_ap)
        && f.op0_base_fp
        && f.offset1 == -1
}

fn is_jump_double_deref(f: &InstructionFields) -> bool {
    is_jump_base(f)
        && !f.op_1_imm
        && !f.pc_update_jump_rel
        && !f.op_1_base_fp
        && !f.op_1_base_ap
        && f.pc_update_jump
}

fn is_jump_abs(f: &InstructionFields) -> bool {
    is_jump_base(f)
        && !f.op_1_imm
        && !f.pc_update_jump_rel
        && (f.op_1_base_fp || f.op_1_base_ap)
        && f.op0_base_fp
        && f.pc_update_jump
        && f.offset1 == -1
}

fn is_call_base(f: &InstructionFields) -> bool {
    f.offset0 == 0
        && f.offset1 == 1
        && !f.dst_base_fp
        && !f.op0_base_fp
        && !f.res_add
        && !f.res_mul
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.ap_update_add_1
        && f.opcode_call
        && !f.opcode_ret
        && !f.opcode_assert_eq
        && f.opcode_extension == 0
}

fn is_call_rel(f: &InstructionFields) -> bool {
    is_call_base(f)
        && f.pc_update_jump_rel
        && f.op_1_imm
        && !f.op_1_base_fp
        && !f.op_1_base_ap
        && f.offset2 == 1
        && !f.pc_update_jump
}

fn is_call_abs_fp(f: &InstructionFields) -> bool {
    is_call_base(f)
        && !f.pc_update_jump_rel
        && f.op_1_base_fp
        && !f.op_1_base_ap
        && !f.op_1_imm
        && f.pc_update_jump
}

fn is_call_abs_ap(f: &InstructionFields) -> bool {
    is_call_base(f) && !f.pc_update_jump_rel && f.op_1_base_ap && !f.op_1_imm && f.pc_update_jump
}

fn is_jnz(f: &InstructionFields) -> bool {
    f.offset1 == -1
        && f.offset2 == 1
        && f.op0_base_fp
        && f.op_1_imm
        && !f.op_1_base_fp
        && !f.op_1_base_ap
        && !f.res_add
        && !f.res_mul
        && !f.pc_update_jump
        && !f.pc_update_jump_rel
        && f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && !f.opcode_assert_eq
        && f.opcode_extension == 0
}

fn is_assert_eq_base(f: &InstructionFields) -> bool {
    !f.res_add
        && !f.res_mul
        && !f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && f.opcode_assert_eq
        && f.opcode_extension == 0
}

fn is_assert_eq_imm(f: &InstructionFields) -> bool {
    is_assert_eq_base(f)
        && f.op_1_imm
        && !f.op_1_base_fp
        && !f.op_1_base_ap
        && f.offset2 == 1
        && f.op0_base_fp
        && f.offset1 == -1
}

fn is_assert_eq_double_deref(f: &InstructionFields) -> bool {
    is_assert_eq_base(f) && !f.op_1_imm && !f.op_1_base_fp && !f.op_1_base_ap
}

fn is_assert_eq(f: &InstructionFields) -> bool {
    is_assert_eq_base(f)
        && !f.op_1_imm
        && (f.op_1_base_fp || f.op_1_base_ap)
        && f.offset1 == -1
        && f.op0_base_fp
}

fn is_mul(f: &InstructionFields) -> bool {
    !f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && f.opcode_assert_eq
        && f.opcode_extension == 0
        && !f.res_add
        && f.res_mul
        && exactly_one_op1_base(f)
        && imm_implies_off2_1(f)
}

fn is_add(f: &InstructionFields) -> bool {
    !f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && f.opcode_assert_eq
        && f.opcode_extension == 0
        && f.res_add
        && !f.res_mul
        && exactly_one_op1_base(f)
        && imm_implies_off2_1(f)
}

fn is_blake(f: &InstructionFields) -> bool {
    !f.op_1_imm
        && (f.op_1_base_fp ^ f.op_1_base_ap)
        && !f.res_add
        && !f.res_mul
        && !f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && !f.opcode_assert_eq
        && (f.opcode_extension == 1 || f.opcode_extension == 2)
}

fn is_qm31(f: &InstructionFields) -> bool {
    !f.pc_update_jump
        && !f.pc_update_jump_rel
        && !f.pc_update_jnz
        && !f.ap_update_add
        && !f.opcode_call
        && !f.opcode_ret
        && f.opcode_assert_eq
        && f.opcode_extension == 3
        && (f.res_add ^ f.res_mul)
        && exactly_one_op1_base(f)
        && imm_implies_off2_1(f)
}

/// Classifies a single decoded instruction into its opcode, via the precedence cascade.
///
/// The order of these checks is the contract: the first predicate that matches wins, and a row
/// matching none of them falls through to [`Opcode::Generic`].
#[must_use]
pub fn classify(f: &InstructionFields) -> Opcode {
    if is_ret(f) {
        Opcode::Ret
    } else if is_add_ap(f) {
        Opcode::AddAp
    } else if is_jump_rel_imm(f) {
        Opcode::JumpRelImm
    } else if is_jump_rel(f) {
        Opcode::JumpRel
    } else if is_jump_double_deref(f) {
        Opcode::JumpDoubleDeref
    } else if is_jump_abs(f) {
        Opcode::Jump
    } else if is_call_rel(f) {
        Opcode::CallRel
    } else if is_call_abs_fp(f) {
        Opcode::CallOp1BaseFp
    } else if is_call_abs_ap(f) {
        Opcode::Call
    } else if is_jnz(f) {
        Opcode::Jnz
    } else if is_assert_eq_imm(f) {
        Opcode::AssertEqImm
    } else if is_assert_eq_double_deref(f) {
        Opcode::AssertEqDoubleDeref
    } else if is_assert_eq(f) {
        Opcode::AssertEq
    } else if is_mul(f) {
        Opcode::Mul
    } else if is_add(f) {
        Opcode::Add
    } else if is_blake(f) {
        Opcode::Blake
    } else if is_qm31(f) {
        Opcode::Qm31AddMul
    } else {
        Opcode::Generic
    }
}

/// Classifies a whole column of decoded instructions, in parallel.
#[must_use]
pub fn classify_instructions(fields: &[InstructionFields]) -> Vec<Opcode> {
    use rayon::prelude::*;
    fields.par_iter().map(classify).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::decode_instruction;
    use proptest::prelude::*;

    #[test]
    fn ret_encoding_classifies_as_ret() {
        let fields = decode_instruction(0x208b_7fff_7fff_7ffe, 0).unwrap();
        assert_eq!(classify(&fields), Opcode::Ret);
    }

    #[test]
    fn call_rel_imm_encoding_classifies_as_call_rel() {
        let fields = decode_instruction(0x1104_8001_8001_8000, 0).unwrap();
        assert_eq!(classify(&fields), Opcode::CallRel);
    }

    #[test]
    fn add_with_immediate_classifies_as_add() {
        let fields = decode_instruction(0x4806_8001_7fff_8000, 0).unwrap();
        assert_eq!(classify(&fields), Opcode::Add);
    }

    #[test]
    fn all_zero_word_is_generic() {
        let fields = decode_instruction(0, 0).unwrap();
        assert_eq!(classify(&fields), Opcode::Generic);
    }

    #[test]
    fn mnemonics_are_stable() {
        assert_eq!(Opcode::Ret.mnemonic(), "ret_opcode");
        assert_eq!(Opcode::Generic.mnemonic(), "generic_opcode");
        assert_eq!(Opcode::JnzTaken.to_string(), "jnz_opcode_taken");
    }

    /// All 17 named predicates, in cascade order, excluding the `Generic` default sink.
    fn named_predicates() -> [fn(&InstructionFields) -> bool; 17] {
        [
            is_ret,
            is_add_ap,
            is_jump_rel_imm,
            is_jump_rel,
            is_jump_double_deref,
            is_jump_abs,
            is_call_rel,
            is_call_abs_fp,
            is_call_abs_ap,
            is_jnz,
            is_assert_eq_imm,
            is_assert_eq_double_deref,
            is_assert_eq,
            is_mul,
            is_add,
            is_blake,
            is_qm31,
        ]
    }

    proptest! {
        /// §8 invariant 2: for any decodable instruction word, at most one of the 17 named
        /// cascade predicates matches (a row matching none falls through to `generic_opcode`).
        /// This asserts the predicates are mutually exclusive by construction, not merely that
        /// the cascade's first-match evaluation is deterministic.
        #[test]
        fn at_most_one_predicate_matches(encoded in any::<u64>()) {
            if let Ok(fields) = decode_instruction(encoded, 0) {
                let matches = named_predicates().iter().filter(|p| p(&fields)).count();
                prop_assert!(matches <= 1, "fields {:?} matched {} predicates", fields, matches);
            }
        }

        /// The cascade's output agrees with whichever single predicate (if any) matched.
        #[test]
        fn classify_agrees_with_the_matching_predicate(encoded in any::<u64>()) {
            if let Ok(fields) = decode_instruction(encoded, 0) {
                let label = classify(&fields);
                let labels = [
                    (is_ret as fn(&InstructionFields) -> bool, Opcode::Ret),
                    (is_add_ap, Opcode::AddAp),
                    (is_jump_rel_imm, Opcode::JumpRelImm),
                    (is_jump_rel, Opcode::JumpRel),
                    (is_jump_double_deref, Opcode::JumpDoubleDeref),
                    (is_jump_abs, Opcode::Jump),
                    (is_call_rel, Opcode::CallRel),
                    (is_call_abs_fp, Opcode::CallOp1BaseFp),
                    (is_call_abs_ap, Opcode::Call),
                    (is_jnz, Opcode::Jnz),
                    (is_assert_eq_imm, Opcode::AssertEqImm),
                    (is_assert_eq_double_deref, Opcode::AssertEqDoubleDeref),
                    (is_assert_eq, Opcode::AssertEq),
                    (is_mul, Opcode::Mul),
                    (is_add, Opcode::Add),
                    (is_blake, Opcode::Blake),
                    (is_qm31, Opcode::Qm31AddMul),
                ];
                match labels.iter().find(|(p, _)| p(&fields)) {
                    Some((_, expected)) => prop_assert_eq!(label, *expected),
                    None => prop_assert_eq!(label, Opcode::Generic),
                }
            }
        }
    }
}
