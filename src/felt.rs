//! 256-bit field element representation used for Cairo memory values.
//!
//! Values are elements of the Cairo base field with prime `P = 2^251 + 17*2^192 + 1`. The
//! raw bytes read from `memory.bin` are treated as the canonical representative; this type
//! performs no modular reduction. The only arithmetic the adapter needs on a [`Felt256`] is
//! equality, in particular equality against the all-zero constant for `jnz` refinement
//! (see [`crate::pipeline`]).

use serde::{Deserialize, Serialize};

/// A 256-bit little-endian unsigned integer, stored as four `u64` limbs `(limb_0, limb_1,
/// limb_2, limb_3)` with `limb_0` holding the least-significant 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Felt256 {
    /// Limbs in little-endian order: `limb_0` is least significant.
    pub limbs: [u64; 4],
}

impl Felt256 {
    /// The all-zero field element, used as the `jnz` "taken" comparand.
    pub const ZERO: Felt256 = Felt256 { limbs: [0, 0, 0, 0] };

    /// Build a [`Felt256`] from its four little-endian limbs.
    #[must_use]
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self { limbs }
    }

    /// Returns `true` if this value equals the all-zero representative.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// The least-significant limb, which is where the encoded instruction word lives when
    /// this value is read from the memory cell at `pc`.
    #[must_use]
    pub const fn limb_0(&self) -> u64 {
        self.limbs[0]
    }
}
