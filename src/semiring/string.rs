use super::{Semiring, SemiringProperties, WeaklyDivisibleSemiring, WeightQuantize};
use crate::Label;

/// The left string semiring over label sequences: `⊕` is the longest common prefix,
/// `⊗` is concatenation, zero is a distinguished infinite element and one is the empty
/// sequence.
///
/// Label pushing uses this semiring to compute, for every state, the longest output
/// prefix shared by all paths from that state to a final state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringWeight(Option<Vec<Label>>);

impl StringWeight {
    /// The weight consisting of the given label sequence.
    pub fn from_labels<I: IntoIterator<Item = Label>>(labels: I) -> Self {
        Self(Some(labels.into_iter().collect()))
    }

    /// The weight consisting of a single label.
    pub fn from_label(label: Label) -> Self {
        Self(Some(vec![label]))
    }

    /// The label sequence of this weight, or `None` for the zero element.
    pub fn labels(&self) -> Option<&[Label]> {
        self.0.as_deref()
    }
}

impl Semiring for StringWeight {
    fn zero() -> Self {
        Self(None)
    }

    fn one() -> Self {
        Self(Some(Vec::new()))
    }

    fn plus(&self, rhs: &Self) -> Self {
        match (&self.0, &rhs.0) {
            (None, _) => rhs.clone(),
            (_, None) => self.clone(),
            (Some(a), Some(b)) => {
                let shared = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
                Self(Some(a[..shared].to_vec()))
            }
        }
    }

    fn times(&self, rhs: &Self) -> Self {
        match (&self.0, &rhs.0) {
            (None, _) | (_, None) => Self::zero(),
            (Some(a), Some(b)) => {
                let mut labels = Vec::with_capacity(a.len() + b.len());
                labels.extend_from_slice(a);
                labels.extend_from_slice(b);
                Self(Some(labels))
            }
        }
    }

    fn properties() -> SemiringProperties {
        SemiringProperties::IDEMPOTENT | SemiringProperties::ZERO_SUM_FREE
    }
}

impl WeaklyDivisibleSemiring for StringWeight {
    /// Strips the prefix `rhs` off `self`. Defined when `rhs` is a prefix of `self`,
    /// which the longest-common-prefix construction of label pushing guarantees.
    fn divide(&self, rhs: &Self) -> Self {
        match (&self.0, &rhs.0) {
            (None, _) | (_, None) => Self::zero(),
            (Some(a), Some(b)) => {
                debug_assert!(a.starts_with(b), "{b:?} does not left-divide {a:?}");
                let shared = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
                Self(Some(a[shared..].to_vec()))
            }
        }
    }
}

impl WeightQuantize for StringWeight {
    fn quantize(&self, _delta: f32) -> Self {
        self.clone()
    }
}
