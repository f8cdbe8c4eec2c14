use std::hash::{Hash, Hasher};

use super::{
    quantize_value, Semiring, SemiringProperties, WeaklyDivisibleSemiring, WeightQuantize,
};

/// The tropical semiring over `f32`: `⊕` is `min`, `⊗` is `+`, zero is `∞` and one is `0.0`.
///
/// This is the usual weight type for shortest-path style computations. It is idempotent,
/// so the full range of determinization-based optimizations applies to automata over it.
#[derive(Debug, Clone, Copy, PartialOrd)]
pub struct TropicalWeight(f32);

impl TropicalWeight {
    /// Wraps a raw value. `∞` is the semiring zero.
    pub fn new(value: f32) -> Self {
        Self(value)
    }

    /// The raw value of this weight.
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Semiring for TropicalWeight {
    fn zero() -> Self {
        Self(f32::INFINITY)
    }

    fn one() -> Self {
        Self(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        if self.0 <= rhs.0 {
            *self
        } else {
            *rhs
        }
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.0.is_infinite() || rhs.0.is_infinite() {
            Self::zero()
        } else {
            Self(self.0 + rhs.0)
        }
    }

    fn properties() -> SemiringProperties {
        SemiringProperties::IDEMPOTENT
            | SemiringProperties::COMMUTATIVE
            | SemiringProperties::ZERO_SUM_FREE
    }
}

impl WeaklyDivisibleSemiring for TropicalWeight {
    fn divide(&self, rhs: &Self) -> Self {
        if self.0.is_infinite() {
            *self
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl WeightQuantize for TropicalWeight {
    fn quantize(&self, delta: f32) -> Self {
        Self(quantize_value(self.0, delta))
    }
}

impl PartialEq for TropicalWeight {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// Weight values are never NaN.
impl Eq for TropicalWeight {}

impl Hash for TropicalWeight {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // +0.0 and -0.0 must collide.
        let value = if self.0 == 0.0 { 0.0f32 } else { self.0 };
        state.write_u32(value.to_bits());
    }
}

impl From<f32> for TropicalWeight {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tropical_operations() {
        let a = TropicalWeight::new(1.5);
        let b = TropicalWeight::new(2.5);
        assert_eq!(a.plus(&b), a);
        assert_eq!(a.times(&b), TropicalWeight::new(4.0));
        assert_eq!(a.times(&TropicalWeight::zero()), TropicalWeight::zero());
        assert_eq!(a.times(&TropicalWeight::one()), a);
        assert_eq!(b.divide(&a), TropicalWeight::new(1.0));
        assert!(TropicalWeight::properties().contains(SemiringProperties::IDEMPOTENT));
    }

    #[test]
    fn quantization_collapses_close_values() {
        let a = TropicalWeight::new(1.0);
        let b = TropicalWeight::new(1.0 + 1e-5);
        assert!(a.approx_eq(&b, crate::KDELTA));
        assert!(!a.approx_eq(&TropicalWeight::new(1.1), crate::KDELTA));
    }
}
