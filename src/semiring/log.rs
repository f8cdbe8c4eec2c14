use std::hash::{Hash, Hasher};

use super::{
    quantize_value, Semiring, SemiringProperties, WeaklyDivisibleSemiring, WeightQuantize,
};

/// The log semiring over `f32`: values are negated log-probabilities, `⊕` is
/// `-ln(e⁻ˣ + e⁻ʸ)`, `⊗` is `+`, zero is `∞` and one is `0.0`.
///
/// Unlike [`TropicalWeight`](super::TropicalWeight) this semiring is *not* idempotent,
/// which rules out determinization of cyclic automata over it; the optimizer only
/// determinizes log-weighted automata it knows to be acyclic.
#[derive(Debug, Clone, Copy, PartialOrd)]
pub struct LogWeight(f32);

impl LogWeight {
    /// Wraps a raw value. `∞` is the semiring zero.
    pub fn new(value: f32) -> Self {
        Self(value)
    }

    /// The raw value of this weight.
    pub fn value(&self) -> f32 {
        self.0
    }
}

fn log_add(x: f32, y: f32) -> f32 {
    // -ln(e⁻ˣ + e⁻ʸ), evaluated from the smaller exponent for stability.
    let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
    if lo.is_infinite() {
        return lo.min(hi);
    }
    lo - (-(hi - lo)).exp().ln_1p()
}

impl Semiring for LogWeight {
    fn zero() -> Self {
        Self(f32::INFINITY)
    }

    fn one() -> Self {
        Self(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        if self.0.is_infinite() {
            *rhs
        } else if rhs.0.is_infinite() {
            *self
        } else {
            Self(log_add(self.0, rhs.0))
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
        SemiringProperties::COMMUTATIVE | SemiringProperties::ZERO_SUM_FREE
    }
}

impl WeaklyDivisibleSemiring for LogWeight {
    fn divide(&self, rhs: &Self) -> Self {
        if self.0.is_infinite() {
            *self
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl WeightQuantize for LogWeight {
    fn quantize(&self, delta: f32) -> Self {
        Self(quantize_value(self.0, delta))
    }
}

impl PartialEq for LogWeight {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// Weight values are never NaN.
impl Eq for LogWeight {}

impl Hash for LogWeight {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let value = if self.0 == 0.0 { 0.0f32 } else { self.0 };
        state.write_u32(value.to_bits());
    }
}

impl From<f32> for LogWeight {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_plus_is_log_sum_exp() {
        let a = LogWeight::new(0.0);
        let sum = a.plus(&a);
        // e⁰ + e⁰ = 2, so the sum is -ln 2.
        assert!((sum.value() - (-std::f32::consts::LN_2)).abs() < 1e-6);
        assert!(!LogWeight::properties().contains(SemiringProperties::IDEMPOTENT));
    }

    #[test]
    fn zero_is_identity_and_annihilator() {
        let a = LogWeight::new(1.0);
        assert_eq!(a.plus(&LogWeight::zero()), a);
        assert_eq!(a.times(&LogWeight::zero()), LogWeight::zero());
        assert_eq!(a.divide(&a), LogWeight::one());
    }
}
