//! Library for building and optimizing weighted finite-state transducers (WFSTs) in Rust.
//!
//! A WFST is a directed multigraph whose transitions carry an input label, an output label
//! and a weight drawn from a [semiring](crate::semiring::Semiring). Acceptors are the special
//! case where every transition has matching input and output labels. The concrete automaton
//! type provided here is [`VectorFst`], a mutable vector-backed implementation with a
//! designated start state and per-state final weights.
//!
//! On top of the automaton the crate provides the elementary rewriting algorithms
//! (epsilon-removal, arc-combining, label/weight encoding, determinization, minimization,
//! label and weight pushing, sorting, trimming) and, as the centre piece, a property-driven
//! [optimizer](crate::optimize) that composes them: it inspects the algebraic capabilities
//! of the weight type and the cached structural properties of the automaton and runs the
//! smallest sequence of rewrites that is known to preserve the weighted language. The
//! correctness conditions it encodes are the classic ones from automata theory, e.g. that
//! an acyclic weighted automaton over a zero-sum-free semiring is always determinizable,
//! and that a transducer must have its labels (and sometimes its weights) encoded away
//! before determinization is valid.
//!
//! Structural facts about an automaton are tracked by an explicit tri-state
//! [property cache](crate::properties::PropertyCache): each property is known true, known
//! false, or unknown. Unknown properties may be computed on demand or treated
//! conservatively, which makes every optimizer decision safe even on automata that carry
//! no annotations at all.

/// The prelude re-exports everything needed to build and optimize automata, so that
/// `use wfst::prelude::*;` is enough for most callers.
pub mod prelude {
    pub use super::{
        algorithms::{
            connect, decode, determinize, encode, minimize, push_labels, push_weights,
            reverse_shortest_distance, rm_epsilon, sum_transitions, tr_sort, EncodeFlags,
            EncodeTable, LabelSort,
        },
        fst::{Transition, VectorFst, WfstError},
        optimize::{optimize, optimize_for_string_cross_product, prepare_for_difference_rhs},
        properties::{FstProperties, PropertyCache},
        semiring::{
            LogWeight, Semiring, SemiringProperties, StringWeight, TropicalWeight,
            WeaklyDivisibleSemiring, WeightQuantize,
        },
        Label, StateId, EPSILON, KDELTA,
    };
}

/// Definitions of mathematical helper objects used throughout the crate.
pub mod math;

/// Weight algebras: the [`semiring::Semiring`] trait, its capability set and the
/// concrete weight types.
pub mod semiring;

/// The mutable automaton representation.
pub mod fst;

/// Structural property bitsets and the tri-state property cache.
pub mod properties;

/// Elementary automaton-rewriting algorithms.
pub mod algorithms;

/// The property-driven optimizer.
pub mod optimize;

#[cfg(test)]
pub(crate) mod testing;

/// A transition label. Labels are opaque non-negative integers; [`EPSILON`] is reserved.
pub type Label = u32;

/// Identifies a state of a [`fst::VectorFst`]. States are densely numbered from zero.
pub type StateId = u32;

/// The null label: a transition with input and output label `EPSILON` consumes and
/// produces nothing.
pub const EPSILON: Label = 0;

/// Default quantization delta used when comparing or hashing float-valued weights.
pub const KDELTA: f32 = 1.0 / 1024.0;
