use tracing::debug;

use super::push::reweight_to_initial;
use super::{connect, reverse_shortest_distance};
use crate::fst::{Transition, VectorFst};
use crate::math::Map;
use crate::properties::FstProperties;
use crate::semiring::{Semiring, WeaklyDivisibleSemiring, WeightQuantize};
use crate::{Label, StateId, KDELTA};

/// Merges equivalent states of a deterministic automaton, yielding the minimal
/// equivalent machine. The automaton is trimmed first; on weighted acceptors the weights
/// are pushed toward the initial state and quantized beforehand, so that states differing
/// only in how weight is spread along their suffixes still merge.
///
/// Weight pushing is restricted to acceptors and is additionally skipped when the start
/// state both carries a non-trivial distance and has incoming transitions, since
/// reapplying the start factor in place would then change the language. Transducers are
/// refined with their weights left in place; minimization stays correct, merely less
/// effective.
///
/// On non-deterministic input the result is smaller but only guaranteed equivalent if the
/// input was deterministic; the optimizer only calls this after determinization.
pub fn minimize<W>(fst: &mut VectorFst<W>)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    connect(fst);
    let Some(start) = fst.start() else {
        return;
    };
    let n = fst.num_states();
    debug!(states = n, "minimizing");

    let weighted = fst.states().any(|q| {
        fst.transitions(q).iter().any(|tr| !tr.weight.is_one())
            || fst.final_weight(q).map(|rho| !rho.is_one()).unwrap_or(false)
    });
    let acceptor = fst
        .properties(FstProperties::ACCEPTOR, true)
        .contains(FstProperties::ACCEPTOR);
    if weighted && acceptor {
        let potentials = reverse_shortest_distance(fst, KDELTA);
        let start_has_predecessor = fst
            .states()
            .any(|q| fst.transitions(q).iter().any(|tr| tr.nextstate == start));
        let factor = &potentials[start as usize];
        if factor.is_one() || !start_has_predecessor {
            reweight_to_initial(fst, &potentials, true);
            for state in fst.raw_states_mut() {
                for tr in &mut state.transitions {
                    tr.weight = tr.weight.quantize(KDELTA);
                }
                if let Some(rho) = &mut state.final_weight {
                    *rho = rho.quantize(KDELTA);
                }
            }
            fst.invalidate_properties_keeping(
                FstProperties::ACCEPTOR
                    | FstProperties::NO_EPSILONS
                    | FstProperties::ACYCLIC
                    | FstProperties::I_DETERMINISTIC,
            );
        }
    }

    // Moore partition refinement. States start out grouped by (quantized) final weight
    // and split until every class is closed under the transition signature.
    let mut classes: Vec<usize> = vec![0; n];
    let mut class_count = {
        let mut by_final: Map<Option<W>, usize> = Map::default();
        for q in fst.states() {
            let key = fst.final_weight(q).map(|rho| rho.quantize(KDELTA));
            let next = by_final.len();
            let class = *by_final.entry(key).or_insert(next);
            classes[q as usize] = class;
        }
        by_final.len()
    };

    type Signature<W> = (usize, Vec<(Label, Label, W, usize)>);
    loop {
        let mut by_signature: Map<Signature<W>, usize> = Map::default();
        let mut next_classes = vec![0; n];
        for q in fst.states() {
            let mut moves: Vec<(Label, Label, W, usize)> = fst
                .transitions(q)
                .iter()
                .map(|tr| {
                    (
                        tr.ilabel,
                        tr.olabel,
                        tr.weight.quantize(KDELTA),
                        classes[tr.nextstate as usize],
                    )
                })
                .collect();
            moves.sort_unstable_by(|a, b| (a.0, a.1, a.3).cmp(&(b.0, b.1, b.3)));
            let signature: Signature<W> = (classes[q as usize], moves);
            let next = by_signature.len();
            next_classes[q as usize] = *by_signature.entry(signature).or_insert(next);
        }
        let refined = by_signature.len();
        classes = next_classes;
        if refined == class_count {
            break;
        }
        class_count = refined;
    }

    if class_count == n {
        debug!("already minimal");
        return;
    }
    debug!(classes = class_count, "merging equivalent states");

    // Quotient: one fresh state per class, transitions taken from the first member.
    let mut representative: Vec<Option<StateId>> = vec![None; class_count];
    for q in fst.states() {
        representative[classes[q as usize]].get_or_insert(q);
    }
    let mut out: VectorFst<W> = VectorFst::new();
    for _ in 0..class_count {
        out.add_state();
    }
    for (class, rep) in representative.iter().enumerate() {
        let Some(rep) = *rep else {
            continue;
        };
        let mut transitions: Vec<Transition<W>> = fst
            .transitions(rep)
            .iter()
            .map(|tr| {
                Transition::new(
                    tr.ilabel,
                    tr.olabel,
                    tr.weight.clone(),
                    classes[tr.nextstate as usize] as StateId,
                )
            })
            .collect();
        transitions.sort_unstable_by(|a, b| {
            (a.ilabel, a.olabel, a.nextstate).cmp(&(b.ilabel, b.olabel, b.nextstate))
        });
        transitions.dedup_by(|a, b| {
            (a.ilabel, a.olabel, a.nextstate) == (b.ilabel, b.olabel, b.nextstate)
        });
        out.raw_states_mut()[class].transitions = transitions;
        out.raw_states_mut()[class].final_weight = fst.final_weight(rep).cloned();
    }
    out.set_start_unchecked(Some(classes[start as usize] as StateId));
    if fst.is_error() {
        out.set_error();
    }
    *fst = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use crate::testing::language;

    #[test]
    fn merges_suffix_equivalent_states() {
        // Two branches accepting the same suffix from equivalent middle states.
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        let s3 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s3, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::one(), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(2, 2, TropicalWeight::one(), s2))
            .unwrap();
        fst.add_transition(s1, Transition::new(3, 3, TropicalWeight::one(), s3))
            .unwrap();
        fst.add_transition(s2, Transition::new(3, 3, TropicalWeight::one(), s3))
            .unwrap();

        let before = language(&fst, 8);
        minimize(&mut fst);
        assert_eq!(fst.num_states(), 3);
        assert_eq!(language(&fst, 8), before);
    }

    #[test]
    fn pushing_lets_weighted_suffixes_merge() {
        // The suffixes from s1 and s2 spell the same weighted language but spread the
        // weight differently; pushing normalizes them so the states merge.
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        let s3 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s3, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::new(1.0), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(2, 2, TropicalWeight::new(2.0), s2))
            .unwrap();
        fst.add_transition(s1, Transition::new(3, 3, TropicalWeight::new(4.0), s3))
            .unwrap();
        fst.add_transition(s2, Transition::new(3, 3, TropicalWeight::new(3.0), s3))
            .unwrap();

        let before = language(&fst, 8);
        minimize(&mut fst);
        assert_eq!(fst.num_states(), 3);
        assert_eq!(language(&fst, 8), before);
    }

    #[test]
    fn trims_before_merging() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let dead = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::one(), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(2, 2, TropicalWeight::one(), dead))
            .unwrap();

        minimize(&mut fst);
        assert_eq!(fst.num_states(), 2);
        assert_eq!(language(&fst, 8).len(), 1);
    }

    #[test]
    fn minimal_input_is_left_alone() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::one(), s1))
            .unwrap();
        fst.add_transition(s1, Transition::new(1, 1, TropicalWeight::one(), s0))
            .unwrap();

        minimize(&mut fst);
        assert_eq!(fst.num_states(), 2);
    }
}
