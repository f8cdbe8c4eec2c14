use bitflags::bitflags;
use std::fmt::Debug;
use std::hash::Hash;

mod log;
mod string;
mod tropical;

pub use log::LogWeight;
pub use string::StringWeight;
pub use tropical::TropicalWeight;

bitflags! {
    /// Algebraic capabilities of a weight type. These are facts about the semiring as a
    /// whole, not about individual weight values, and are resolved at compile time through
    /// [`Semiring::properties`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SemiringProperties: u32 {
        /// `a ⊕ a == a` for all `a`.
        const IDEMPOTENT = 0b001;
        /// `a ⊗ b == b ⊗ a` for all `a`, `b`.
        const COMMUTATIVE = 0b010;
        /// `a ⊕ b == 0` implies `a == 0` and `b == 0`.
        const ZERO_SUM_FREE = 0b100;
    }
}

/// An algebraic structure with two operations `⊕` ([`plus`](Semiring::plus)) and `⊗`
/// ([`times`](Semiring::times)), an additive identity [`zero`](Semiring::zero) which
/// annihilates `⊗`, and a multiplicative identity [`one`](Semiring::one).
///
/// Weight types implement [`Eq`] and [`Hash`] over their raw representation so that they
/// can key hash maps; float-backed weights should be [quantized](WeightQuantize) first
/// whenever approximately equal values must collide.
pub trait Semiring: Clone + Debug + PartialEq + Eq + Hash + 'static {
    /// The additive identity.
    fn zero() -> Self;

    /// The multiplicative identity.
    fn one() -> Self;

    /// The abstract sum, used to combine the weights of alternative paths.
    fn plus(&self, rhs: &Self) -> Self;

    /// The abstract product, used to combine the weights along a path.
    fn times(&self, rhs: &Self) -> Self;

    /// The capability set of this semiring. This is a type-level fact; implementations
    /// return a constant.
    fn properties() -> SemiringProperties;

    /// Whether this value is the additive identity.
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Whether this value is the multiplicative identity.
    fn is_one(&self) -> bool {
        *self == Self::one()
    }

    /// In-place variant of [`plus`](Semiring::plus).
    fn plus_assign(&mut self, rhs: &Self) {
        *self = self.plus(rhs);
    }

    /// In-place variant of [`times`](Semiring::times).
    fn times_assign(&mut self, rhs: &Self) {
        *self = self.times(rhs);
    }
}

/// A semiring with a left division: `a.divide(&b)` is the residue `b⁻¹ ⊗ a`, defined
/// whenever `b` left-divides `a`. Determinization residuals and weight pushing rely on it.
pub trait WeaklyDivisibleSemiring: Semiring {
    /// Returns `rhs⁻¹ ⊗ self`.
    fn divide(&self, rhs: &Self) -> Self;
}

/// Rounding of weight values to multiples of a delta, so that float-valued weights can be
/// compared and hashed robustly. Exact semirings implement this as the identity.
pub trait WeightQuantize: Semiring {
    /// Returns this weight rounded to the nearest multiple of `delta`.
    fn quantize(&self, delta: f32) -> Self;

    /// Whether `self` and `rhs` quantize to the same value.
    fn approx_eq(&self, rhs: &Self, delta: f32) -> bool {
        self.quantize(delta) == rhs.quantize(delta)
    }
}

pub(crate) fn quantize_value(value: f32, delta: f32) -> f32 {
    if value.is_infinite() {
        return value;
    }
    (value / delta + 0.5).floor() * delta
}
