use thiserror::Error;

use crate::properties::{compute_properties, FstProperties, PropertyCache};
use crate::semiring::Semiring;
use crate::{Label, StateId};

/// Errors raised by the mutable automaton API. These only ever signal misuse of the ADT
/// itself; the rewriting algorithms and the optimizer report infeasibility through the
/// [`FstProperties::ERROR`] bit instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WfstError {
    /// A state id was passed that does not refer to an existing state.
    #[error("state {0} does not exist")]
    MissingState(StateId),
}

/// One transition of a weighted automaton: input label, output label, weight and
/// destination state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition<W> {
    /// The consumed label.
    pub ilabel: Label,
    /// The emitted label.
    pub olabel: Label,
    /// The weight of this transition.
    pub weight: W,
    /// The destination state.
    pub nextstate: StateId,
}

impl<W> Transition<W> {
    /// Creates a transition from its four components.
    pub fn new(ilabel: Label, olabel: Label, weight: W, nextstate: StateId) -> Self {
        Self {
            ilabel,
            olabel,
            weight,
            nextstate,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VectorFstState<W> {
    pub(crate) transitions: Vec<Transition<W>>,
    pub(crate) final_weight: Option<W>,
}

impl<W> Default for VectorFstState<W> {
    fn default() -> Self {
        Self {
            transitions: Vec::new(),
            final_weight: None,
        }
    }
}

/// A mutable weighted finite-state transducer backed by vectors.
///
/// States are densely numbered from zero in insertion order. At most one state is the
/// start state; an automaton without a start state accepts the empty language. A state
/// is final iff it carries a final weight (an absent final weight is the semiring zero).
///
/// Every instance carries a [`PropertyCache`] with tri-state knowledge about its
/// structure. Mutating the automaton through any method of this type resets the cache
/// (except for the sticky [`FstProperties::ERROR`] bit); the rewriting algorithms record
/// the facts they re-establish.
#[derive(Debug, Clone, Default)]
pub struct VectorFst<W: Semiring> {
    states: Vec<VectorFstState<W>>,
    start: Option<StateId>,
    cache: PropertyCache,
}

impl<W: Semiring> VectorFst<W> {
    /// Creates an empty automaton with no states.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            start: None,
            cache: PropertyCache::default(),
        }
    }

    /// Adds a fresh state with no transitions and no final weight, returning its id.
    pub fn add_state(&mut self) -> StateId {
        self.cache.invalidate();
        self.states.push(VectorFstState::default());
        (self.states.len() - 1) as StateId
    }

    /// The number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// The total number of transitions.
    pub fn num_transitions(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    /// Iterates over all state ids.
    pub fn states(&self) -> impl Iterator<Item = StateId> {
        0..self.states.len() as StateId
    }

    /// The start state, if any.
    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    /// Makes `state` the start state.
    pub fn set_start(&mut self, state: StateId) -> Result<(), WfstError> {
        self.check_state(state)?;
        self.cache.invalidate();
        self.start = Some(state);
        Ok(())
    }

    /// The final weight of `state`, or `None` if the state is not final (or does not
    /// exist).
    pub fn final_weight(&self, state: StateId) -> Option<&W> {
        self.states
            .get(state as usize)
            .and_then(|s| s.final_weight.as_ref())
    }

    /// Whether `state` is final.
    pub fn is_final(&self, state: StateId) -> bool {
        self.final_weight(state).is_some()
    }

    /// Gives `state` the final weight `weight`.
    pub fn set_final(&mut self, state: StateId, weight: W) -> Result<(), WfstError> {
        self.check_state(state)?;
        self.cache.invalidate();
        self.states[state as usize].final_weight = Some(weight);
        Ok(())
    }

    /// Makes `state` non-final, returning its previous final weight.
    pub fn remove_final(&mut self, state: StateId) -> Result<Option<W>, WfstError> {
        self.check_state(state)?;
        self.cache.invalidate();
        Ok(self.states[state as usize].final_weight.take())
    }

    /// Adds a transition leaving `state`.
    pub fn add_transition(
        &mut self,
        state: StateId,
        transition: Transition<W>,
    ) -> Result<(), WfstError> {
        self.check_state(state)?;
        self.check_state(transition.nextstate)?;
        self.cache.invalidate();
        self.states[state as usize].transitions.push(transition);
        Ok(())
    }

    /// The transitions leaving `state`. An unknown state has none.
    pub fn transitions(&self, state: StateId) -> &[Transition<W>] {
        self.states
            .get(state as usize)
            .map(|s| s.transitions.as_slice())
            .unwrap_or(&[])
    }

    /// Queries the structural properties in `mask`.
    ///
    /// Returns the bits of `mask` that are *known true*. When `compute` is set, any
    /// unknown bits of `mask` are first computed by a full traversal and cached; when it
    /// is unset, unknown properties are simply not reported. The latter is the
    /// conservative behaviour the optimizer builds on: an unknown property never enables
    /// an optimization, it only ever disables one.
    pub fn properties(&mut self, mask: FstProperties, compute: bool) -> FstProperties {
        let unknown = mask & FstProperties::COMPUTABLE & !self.cache.known_mask();
        if compute && !unknown.is_empty() {
            let computed = compute_properties(self);
            self.cache.record_computed(computed);
        }
        self.cache.known_true() & mask
    }

    /// The tri-state property cache of this automaton.
    pub fn property_cache(&self) -> &PropertyCache {
        &self.cache
    }

    /// Whether a rewrite has flagged this automaton as invalid.
    pub fn is_error(&self) -> bool {
        self.cache.get(FstProperties::ERROR) == Some(true)
    }

    fn check_state(&self, state: StateId) -> Result<(), WfstError> {
        if (state as usize) < self.states.len() {
            Ok(())
        } else {
            Err(WfstError::MissingState(state))
        }
    }

    // -- crate-internal access for the rewriting algorithms ------------------------------
    //
    // The algorithms mutate the state vector directly and are responsible for resetting
    // and re-recording properties through `invalidate_properties_keeping` and
    // `record_property`.

    pub(crate) fn raw_states_mut(&mut self) -> &mut Vec<VectorFstState<W>> {
        &mut self.states
    }

    pub(crate) fn set_start_unchecked(&mut self, start: Option<StateId>) {
        self.start = start;
    }

    /// Resets the cache, re-recording as known true the bits of `keep` that were known
    /// true before.
    pub(crate) fn invalidate_properties_keeping(&mut self, keep: FstProperties) {
        let kept = self.cache.known_true() & keep;
        self.cache.invalidate();
        if !kept.is_empty() {
            self.cache.set(kept, true);
        }
    }

    /// Records `props` as known with the given value, e.g. after a rewrite established it.
    pub(crate) fn record_property(&mut self, props: FstProperties, value: bool) {
        self.cache.set(props, value);
    }

    /// Flags this automaton as the invalid result of an infeasible rewrite.
    pub(crate) fn set_error(&mut self) {
        self.cache.set(FstProperties::ERROR, true);
    }
}
