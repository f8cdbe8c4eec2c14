use itertools::Itertools;

use crate::fst::VectorFst;
use crate::properties::FstProperties;
use crate::semiring::Semiring;

/// Combines, within each state, all transitions that share source, destination and both
/// labels, `⊕`-summing their weights. This is always language-preserving and never grows
/// the automaton, so the optimizer runs it unconditionally.
///
/// As a side effect each state's transitions end up sorted by input label.
pub fn sum_transitions<W: Semiring>(fst: &mut VectorFst<W>) {
    let preserved = FstProperties::ACCEPTOR
        | FstProperties::NO_EPSILONS
        | FstProperties::ACYCLIC
        | FstProperties::I_DETERMINISTIC;
    for state in fst.raw_states_mut() {
        let transitions = std::mem::take(&mut state.transitions);
        state.transitions = transitions
            .into_iter()
            .sorted_by_key(|tr| (tr.ilabel, tr.olabel, tr.nextstate))
            .coalesce(|a, b| {
                if (a.ilabel, a.olabel, a.nextstate) == (b.ilabel, b.olabel, b.nextstate) {
                    let mut merged = a;
                    merged.weight.plus_assign(&b.weight);
                    Ok(merged)
                } else {
                    Err((a, b))
                }
            })
            .collect();
    }
    fst.invalidate_properties_keeping(preserved);
    fst.record_property(FstProperties::I_LABEL_SORTED, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn merges_parallel_transitions() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(12, 25, TropicalWeight::new(1.0), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(12, 25, TropicalWeight::new(2.0), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(12, 26, TropicalWeight::new(3.0), s1))
            .unwrap();

        sum_transitions(&mut fst);
        let transitions = fst.transitions(s0);
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].olabel, 25);
        // Tropical ⊕ is min.
        assert_eq!(transitions[0].weight, TropicalWeight::new(1.0));
        assert_eq!(transitions[1].olabel, 26);
    }

    #[test]
    fn preserves_known_true_properties() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s0, TropicalWeight::one()).unwrap();
        fst.properties(FstProperties::NO_EPSILONS, true);
        sum_transitions(&mut fst);
        assert_eq!(
            fst.property_cache().get(FstProperties::NO_EPSILONS),
            Some(true)
        );
    }
}
