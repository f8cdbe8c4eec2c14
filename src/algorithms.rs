//! Elementary automaton-rewriting algorithms.
//!
//! All of these operate in place on a [`VectorFst`](crate::fst::VectorFst) and preserve
//! the weighted language of the automaton (modulo the documented label/weight folding of
//! [`encode`]/[`decode`], which is reverted by the paired call). None of them return
//! errors: a rewrite that cannot produce a valid result flags the automaton with
//! [`FstProperties::ERROR`](crate::properties::FstProperties::ERROR) instead, and it is
//! the caller's responsibility to check that bit.

mod connect;
mod determinize;
mod encode;
mod minimize;
mod push;
mod rm_epsilon;
mod shortest_distance;
mod sum_transitions;
mod tr_sort;

pub use connect::connect;
pub use determinize::determinize;
pub use encode::{decode, encode, EncodeFlags, EncodeTable};
pub use minimize::minimize;
pub use push::{push_labels, push_weights};
pub use rm_epsilon::rm_epsilon;
pub use shortest_distance::reverse_shortest_distance;
pub use sum_transitions::sum_transitions;
pub use tr_sort::{tr_sort, LabelSort};
