//! Deterministic randomness for the sandbox's fault injection.
//!
//! RULE: the sandbox never calls a platform RNG. Every fault roll comes
//! from a `FaultRng` derived from the configured master seed, one stream
//! per fault slot, so enabling one kind of fault never shifts another's
//! sequence.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct FaultRng {
    pub slot: FaultSlot,
    inner: Pcg64Mcg,
}

impl FaultRng {
    pub fn new(master_seed: u64, slot: FaultSlot) -> Self {
        let derived_seed = master_seed ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self { slot, inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Bernoulli trial: true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.next_f64() < p
    }
}

/// Stable slot assignments. Append only; reordering reseeds every stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum FaultSlot {
    SpuriousVerifyError = 0,
    InvokeTransport = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = FaultRng::new(7, FaultSlot::SpuriousVerifyError);
        let mut b = FaultRng::new(7, FaultSlot::SpuriousVerifyError);
        let xs: Vec<f64> = (0..5).map(|_| a.next_f64()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.next_f64()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn slots_are_independent_and_zero_never_fires() {
        let mut a = FaultRng::new(7, FaultSlot::SpuriousVerifyError);
        let mut b = FaultRng::new(7, FaultSlot::InvokeTransport);
        assert_ne!(a.next_f64(), b.next_f64());
        assert!((0..100).all(|_| !a.chance(0.0)));
        assert!((0..100).all(|_| a.chance(1.0)));
    }
}
