use bitflags::bitflags;

use crate::fst::VectorFst;
use crate::math::Set;
use crate::semiring::Semiring;
use crate::{Label, StateId, EPSILON};

bitflags! {
    /// Structural facts about one automaton instance. Every bit is a *positive* fact;
    /// absence of a bit in a query result means the fact is unknown or false, which the
    /// optimizer treats identically (it only ever acts on known-true facts).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FstProperties: u32 {
        /// Every transition has matching input and output labels.
        const ACCEPTOR = 0b0000_0001;
        /// No transition has both labels epsilon.
        const NO_EPSILONS = 0b0000_0010;
        /// No state has two outgoing transitions with the same input label.
        const I_DETERMINISTIC = 0b0000_0100;
        /// The automaton has no cycles.
        const ACYCLIC = 0b0000_1000;
        /// All transition weights and final weights are the semiring one.
        const UNWEIGHTED = 0b0001_0000;
        /// No cycle carries a weight other than the semiring one.
        const UNWEIGHTED_CYCLES = 0b0010_0000;
        /// Each state's transitions are sorted by input label.
        const I_LABEL_SORTED = 0b0100_0000;
        /// Each state's transitions are sorted by output label.
        const O_LABEL_SORTED = 0b1000_0000;
        /// A rewrite could not produce a valid result on this automaton. Never computed,
        /// only asserted, and sticky across mutations.
        const ERROR = 0b1_0000_0000;
    }
}

impl FstProperties {
    /// The properties that [`compute_properties`] can determine by traversal.
    pub const COMPUTABLE: FstProperties = FstProperties::ACCEPTOR
        .union(FstProperties::NO_EPSILONS)
        .union(FstProperties::I_DETERMINISTIC)
        .union(FstProperties::ACYCLIC)
        .union(FstProperties::UNWEIGHTED)
        .union(FstProperties::UNWEIGHTED_CYCLES)
        .union(FstProperties::I_LABEL_SORTED)
        .union(FstProperties::O_LABEL_SORTED);
}

/// Tri-state knowledge about the properties of one automaton: each property is known
/// true, known false, or unknown. Unknown is a first-class state, not a sentinel; it is
/// what every property reverts to when the automaton is mutated.
#[derive(Debug, Clone, Default)]
pub struct PropertyCache {
    known: FstProperties,
    values: FstProperties,
}

impl PropertyCache {
    /// Returns the tri-state knowledge about a single property.
    pub fn get(&self, prop: FstProperties) -> Option<bool> {
        if self.known.contains(prop) {
            Some(self.values.contains(prop))
        } else {
            None
        }
    }

    /// The properties currently known to be true.
    pub fn known_true(&self) -> FstProperties {
        self.known & self.values
    }

    /// Whether all bits of `props` are known (true or false).
    pub fn is_known(&self, props: FstProperties) -> bool {
        self.known.contains(props)
    }

    pub(crate) fn known_mask(&self) -> FstProperties {
        self.known
    }

    /// Records `props` as known with the given value.
    pub(crate) fn set(&mut self, props: FstProperties, value: bool) {
        self.known |= props;
        if value {
            self.values |= props;
        } else {
            self.values &= !props;
        }
    }

    /// Records the result of a full property computation: every computable bit becomes
    /// known, with `values` giving the true ones.
    pub(crate) fn record_computed(&mut self, values: FstProperties) {
        self.known |= FstProperties::COMPUTABLE;
        self.values = (self.values & !FstProperties::COMPUTABLE) | values;
    }

    /// Forgets everything except the sticky error bit.
    pub(crate) fn invalidate(&mut self) {
        let error = FstProperties::ERROR;
        self.known &= error;
        self.values &= error;
    }
}

/// Computes all computable properties of `fst` in one pass: an iterative Tarjan SCC
/// decomposition (for acyclicity and weighted cycles) followed by a single transition
/// scan. The result is not attached to the automaton.
pub(crate) fn compute_properties<W: Semiring>(fst: &VectorFst<W>) -> FstProperties {
    let mut props = FstProperties::COMPUTABLE;
    let scc = strongly_connected_components(fst);

    let mut ilabels: Set<Label> = Set::default();
    for state in fst.states() {
        ilabels.clear();
        let mut prev: Option<(Label, Label)> = None;
        for tr in fst.transitions(state) {
            if !ilabels.insert(tr.ilabel) {
                props -= FstProperties::I_DETERMINISTIC;
            }
            if tr.ilabel != tr.olabel {
                props -= FstProperties::ACCEPTOR;
            }
            if tr.ilabel == EPSILON && tr.olabel == EPSILON {
                props -= FstProperties::NO_EPSILONS;
            }
            if let Some((pi, po)) = prev {
                if tr.ilabel < pi {
                    props -= FstProperties::I_LABEL_SORTED;
                }
                if tr.olabel < po {
                    props -= FstProperties::O_LABEL_SORTED;
                }
            }
            let intra_component = scc[tr.nextstate as usize] == scc[state as usize];
            if intra_component {
                props -= FstProperties::ACYCLIC;
            }
            if !tr.weight.is_one() && !tr.weight.is_zero() {
                props -= FstProperties::UNWEIGHTED;
                if intra_component {
                    props -= FstProperties::UNWEIGHTED_CYCLES;
                }
            }
            prev = Some((tr.ilabel, tr.olabel));
        }
        if let Some(rho) = fst.final_weight(state) {
            if !rho.is_one() {
                props -= FstProperties::UNWEIGHTED;
            }
        }
    }
    props
}

/// Iterative Tarjan decomposition; returns the component id of every state. Written
/// without recursion so that deep automata cannot overflow the stack.
fn strongly_connected_components<W: Semiring>(fst: &VectorFst<W>) -> Vec<u32> {
    let n = fst.num_states();
    let mut index: Vec<Option<u32>> = vec![None; n];
    let mut low = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut scc = vec![u32::MAX; n];
    let mut stack: Vec<StateId> = Vec::new();
    let mut next_index = 0u32;
    let mut num_sccs = 0u32;

    // Explicit DFS frames: state plus the index of the next transition to explore.
    let mut frames: Vec<(StateId, usize)> = Vec::new();

    for root in fst.states() {
        if index[root as usize].is_some() {
            continue;
        }
        frames.push((root, 0));
        while let Some(&(q, tr_idx)) = frames.last() {
            if tr_idx == 0 {
                index[q as usize] = Some(next_index);
                low[q as usize] = next_index;
                next_index += 1;
                stack.push(q);
                on_stack[q as usize] = true;
            }
            let transitions = fst.transitions(q);
            if tr_idx < transitions.len() {
                frames.last_mut().expect("frame exists").1 += 1;
                let target = transitions[tr_idx].nextstate;
                match index[target as usize] {
                    None => frames.push((target, 0)),
                    Some(target_index) => {
                        if on_stack[target as usize] {
                            low[q as usize] = low[q as usize].min(target_index);
                        }
                    }
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent as usize] = low[parent as usize].min(low[q as usize]);
                }
                if Some(low[q as usize]) == index[q as usize] {
                    loop {
                        let member = stack.pop().expect("scc member on stack");
                        on_stack[member as usize] = false;
                        scc[member as usize] = num_sccs;
                        if member == q {
                            break;
                        }
                    }
                    num_sccs += 1;
                }
            }
        }
    }
    scc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    fn two_state_fst() -> VectorFst<TropicalWeight> {
        let mut fst = VectorFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();
        fst
    }

    #[test]
    fn acceptor_and_epsilon_detection() {
        let mut fst = two_state_fst();
        fst.add_transition(0, Transition::new(1, 1, TropicalWeight::one(), 1))
            .unwrap();
        let props = compute_properties(&fst);
        assert!(props.contains(FstProperties::ACCEPTOR));
        assert!(props.contains(FstProperties::NO_EPSILONS));
        assert!(props.contains(FstProperties::ACYCLIC));
        assert!(props.contains(FstProperties::UNWEIGHTED));

        fst.add_transition(0, Transition::new(EPSILON, EPSILON, TropicalWeight::one(), 1))
            .unwrap();
        fst.add_transition(0, Transition::new(2, 3, TropicalWeight::one(), 1))
            .unwrap();
        let props = compute_properties(&fst);
        assert!(!props.contains(FstProperties::ACCEPTOR));
        assert!(!props.contains(FstProperties::NO_EPSILONS));
    }

    #[test]
    fn determinism_and_cycles() {
        let mut fst = two_state_fst();
        fst.add_transition(0, Transition::new(1, 1, TropicalWeight::one(), 1))
            .unwrap();
        fst.add_transition(0, Transition::new(1, 1, TropicalWeight::new(2.0), 1))
            .unwrap();
        // Weighted self loop at state 1.
        fst.add_transition(1, Transition::new(2, 2, TropicalWeight::new(0.5), 1))
            .unwrap();
        let props = compute_properties(&fst);
        assert!(!props.contains(FstProperties::I_DETERMINISTIC));
        assert!(!props.contains(FstProperties::ACYCLIC));
        assert!(!props.contains(FstProperties::UNWEIGHTED_CYCLES));
    }

    #[test]
    fn unweighted_cycles_requires_weightless_loops() {
        let mut fst = two_state_fst();
        let s2 = fst.add_state();
        fst.add_transition(0, Transition::new(1, 1, TropicalWeight::new(3.0), 1))
            .unwrap();
        fst.add_transition(1, Transition::new(2, 2, TropicalWeight::one(), s2))
            .unwrap();
        fst.add_transition(s2, Transition::new(3, 3, TropicalWeight::one(), 1))
            .unwrap();
        let props = compute_properties(&fst);
        // The 1 <-> 2 cycle only carries weight one; the weighted transition into the
        // cycle does not count, only weights on the cycle itself do.
        assert!(!props.contains(FstProperties::ACYCLIC));
        assert!(!props.contains(FstProperties::UNWEIGHTED));
        assert!(props.contains(FstProperties::UNWEIGHTED_CYCLES));
    }

    #[test]
    fn cache_is_tristate() {
        let mut cache = PropertyCache::default();
        assert_eq!(cache.get(FstProperties::ACCEPTOR), None);
        cache.set(FstProperties::ACCEPTOR, true);
        cache.set(FstProperties::ACYCLIC, false);
        assert_eq!(cache.get(FstProperties::ACCEPTOR), Some(true));
        assert_eq!(cache.get(FstProperties::ACYCLIC), Some(false));
        assert_eq!(cache.known_true(), FstProperties::ACCEPTOR);
        cache.set(FstProperties::ERROR, true);
        cache.invalidate();
        assert_eq!(cache.get(FstProperties::ACCEPTOR), None);
        assert_eq!(cache.get(FstProperties::ERROR), Some(true));
    }
}
