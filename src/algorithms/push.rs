use tracing::debug;

use super::reverse_shortest_distance;
use crate::fst::{Transition, VectorFst};
use crate::properties::FstProperties;
use crate::semiring::{Semiring, StringWeight, WeaklyDivisibleSemiring, WeightQuantize};
use crate::{Label, StateId, EPSILON, KDELTA};

/// Rewrites every weight against the given per-state potentials so that weight mass moves
/// toward the initial state: a transition `p --w--> q` becomes
/// `potential(p)⁻¹ ⊗ w ⊗ potential(q)` and a final weight `ρ(q)` becomes
/// `potential(q)⁻¹ ⊗ ρ(q)`. States with zero potential cannot reach a final state and
/// their weights are left untouched.
///
/// The rewrite scales the whole automaton by `potential(start)⁻¹`. With `scale_start` the
/// factor is reapplied to the start state's transitions and final weight, which preserves
/// the language only when no transition enters the start state; [`push_weights`] handles
/// the general case with a fresh start state instead.
pub(crate) fn reweight_to_initial<W>(fst: &mut VectorFst<W>, potentials: &[W], scale_start: bool)
where
    W: Semiring + WeaklyDivisibleSemiring,
{
    for (q, state) in fst.raw_states_mut().iter_mut().enumerate() {
        let d_q = &potentials[q];
        if d_q.is_zero() {
            continue;
        }
        for tr in &mut state.transitions {
            let d_next = &potentials[tr.nextstate as usize];
            if d_next.is_zero() {
                continue;
            }
            tr.weight = tr.weight.times(d_next).divide(d_q);
        }
        if let Some(rho) = &mut state.final_weight {
            *rho = rho.divide(d_q);
        }
    }

    if scale_start {
        if let Some(start) = fst.start() {
            let factor = potentials[start as usize].clone();
            if !factor.is_zero() && !factor.is_one() {
                let state = &mut fst.raw_states_mut()[start as usize];
                for tr in &mut state.transitions {
                    tr.weight = factor.times(&tr.weight);
                }
                if let Some(rho) = &mut state.final_weight {
                    *rho = factor.times(rho);
                }
            }
        }
    }
    fst.invalidate_properties_keeping(
        FstProperties::ACCEPTOR
            | FstProperties::NO_EPSILONS
            | FstProperties::ACYCLIC
            | FstProperties::I_DETERMINISTIC
            | FstProperties::I_LABEL_SORTED
            | FstProperties::O_LABEL_SORTED,
    );
}

/// Pushes weights toward the initial state: each state's shortest distance to the final
/// states is divided out of its outgoing weights, so that weight mass is carried as early
/// as possible along every path. The weighted language is unchanged.
///
/// The start state's own distance is reapplied in place when no transition enters the
/// start state; otherwise a fresh start state with a single `ε:ε` transition carrying the
/// factor is prepended.
pub fn push_weights<W>(fst: &mut VectorFst<W>)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    let Some(start) = fst.start() else {
        return;
    };
    debug!(states = fst.num_states(), "pushing weights");
    let potentials = reverse_shortest_distance(fst, KDELTA);
    let factor = potentials[start as usize].clone();
    let start_has_predecessor = fst
        .states()
        .any(|q| fst.transitions(q).iter().any(|tr| tr.nextstate == start));

    if factor.is_one() || factor.is_zero() || !start_has_predecessor {
        reweight_to_initial(fst, &potentials, true);
        return;
    }
    reweight_to_initial(fst, &potentials, false);
    let new_start = fst.add_state();
    fst.raw_states_mut()[new_start as usize]
        .transitions
        .push(Transition::new(EPSILON, EPSILON, factor, start));
    fst.set_start_unchecked(Some(new_start));
    fst.invalidate_properties_keeping(FstProperties::ACCEPTOR | FstProperties::ACYCLIC);
}

/// Pushes output labels toward the initial state: every state's longest common prefix of
/// all output strings it can still produce is emitted as early as possible. Input labels
/// and weights are untouched, so the input projection and the weighted relation are
/// preserved.
///
/// Prefixes longer than one label are spelled out through chains of fresh states whose
/// transitions read no input. The common prefix of the whole output language is emitted
/// from a fresh start state the same way.
pub fn push_labels<W: Semiring>(fst: &mut VectorFst<W>) {
    let Some(start) = fst.start() else {
        return;
    };
    debug!(states = fst.num_states(), "pushing output labels");

    // Mirror the topology into the string semiring: arc weights are the output labels,
    // final weights the empty string. The reverse shortest distance is then exactly the
    // longest common prefix of each state's output suffix language.
    let mut mirror: VectorFst<StringWeight> = VectorFst::new();
    for _ in fst.states() {
        mirror.add_state();
    }
    mirror.set_start_unchecked(Some(start));
    for q in fst.states() {
        if fst.is_final(q) {
            mirror.raw_states_mut()[q as usize].final_weight = Some(StringWeight::one());
        }
        for tr in fst.transitions(q) {
            let weight = if tr.olabel == EPSILON {
                StringWeight::one()
            } else {
                StringWeight::from_label(tr.olabel)
            };
            mirror.raw_states_mut()[q as usize].transitions.push(Transition::new(
                tr.ilabel,
                tr.olabel,
                weight,
                tr.nextstate,
            ));
        }
    }
    let prefixes = reverse_shortest_distance(&mirror, KDELTA);
    if prefixes[start as usize].is_zero() {
        // No final state is reachable, there is nothing to push.
        return;
    }

    let mut out: VectorFst<W> = VectorFst::new();
    for _ in fst.states() {
        out.add_state();
    }
    for q in fst.states() {
        out.raw_states_mut()[q as usize].final_weight = fst.final_weight(q).cloned();
        for tr in fst.transitions(q) {
            let residual = remaining_output(&prefixes, q, tr);
            emit_chain(&mut out, q, tr, &residual);
        }
    }

    // The prefix common to the whole output language is emitted before any input is read.
    let start_prefix: Vec<Label> = prefixes[start as usize]
        .labels()
        .unwrap_or_default()
        .to_vec();
    let entry = if start_prefix.is_empty() {
        start
    } else {
        let mut target = start;
        for &label in start_prefix.iter().rev() {
            let source = out.add_state();
            out.raw_states_mut()[source as usize]
                .transitions
                .push(Transition::new(EPSILON, label, W::one(), target));
            target = source;
        }
        target
    };
    out.set_start_unchecked(Some(entry));
    if fst.is_error() {
        out.set_error();
    }
    *fst = out;
}

/// The output labels a transition still has to emit after pushing: its own output label
/// followed by the target's common prefix, with the source's common prefix (which has
/// already been emitted upstream) stripped off the front.
fn remaining_output<W: Semiring>(
    prefixes: &[StringWeight],
    source: StateId,
    tr: &Transition<W>,
) -> Vec<Label> {
    let d_next = &prefixes[tr.nextstate as usize];
    if d_next.is_zero() || prefixes[source as usize].is_zero() {
        return if tr.olabel == EPSILON {
            Vec::new()
        } else {
            vec![tr.olabel]
        };
    }
    let own = if tr.olabel == EPSILON {
        StringWeight::one()
    } else {
        StringWeight::from_label(tr.olabel)
    };
    own.times(d_next)
        .divide(&prefixes[source as usize])
        .labels()
        .unwrap_or_default()
        .to_vec()
}

/// Re-emits a transition with the given output labels, spelling labels beyond the first
/// through fresh intermediate states that read no input.
fn emit_chain<W: Semiring>(
    out: &mut VectorFst<W>,
    source: StateId,
    tr: &Transition<W>,
    labels: &[Label],
) {
    let first = labels.first().copied().unwrap_or(EPSILON);
    // Build the tail of the chain back to front so each link knows its target.
    let mut next = tr.nextstate;
    for &label in labels.iter().skip(1).rev() {
        let state = out.add_state();
        out.raw_states_mut()[state as usize]
            .transitions
            .push(Transition::new(EPSILON, label, W::one(), next));
        next = state;
    }
    out.raw_states_mut()[source as usize].transitions.push(Transition::new(
        tr.ilabel,
        first,
        tr.weight.clone(),
        next,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use crate::testing::language;

    #[test]
    fn weights_move_to_the_front() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s2, TropicalWeight::new(0.5)).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::new(1.0), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(2, 2, TropicalWeight::new(4.0), s2))
            .unwrap();
        fst.add_transition(s1, Transition::new(3, 3, TropicalWeight::new(1.0), s2))
            .unwrap();

        let before = language(&fst, 8);
        push_weights(&mut fst);
        assert_eq!(language(&fst, 8), before);
        // Start keeps its identity, full path weights sit on the first transition.
        let mut weights: Vec<_> = fst
            .transitions(s0)
            .iter()
            .map(|tr| (tr.ilabel, tr.weight))
            .collect();
        weights.sort_by_key(|(label, _)| *label);
        assert_eq!(weights[0].1, TropicalWeight::new(2.5));
        assert_eq!(weights[1].1, TropicalWeight::new(4.5));
        // Downstream weights collapsed to one.
        assert!(fst.transitions(s1)[0].weight.is_one());
        assert!(fst.final_weight(s2).map(Semiring::is_one) == Some(true));
    }

    #[test]
    fn start_with_predecessor_gets_a_fresh_start() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::new(2.0), s1))
            .unwrap();
        // An (unreachable) transition into the start state forbids in-place scaling.
        fst.add_transition(s2, Transition::new(2, 2, TropicalWeight::one(), s0))
            .unwrap();

        let before = language(&fst, 8);
        push_weights(&mut fst);
        assert_eq!(language(&fst, 8), before);
        let start = fst.start().unwrap();
        assert_ne!(start, s0);
        let entry = &fst.transitions(start)[0];
        assert_eq!((entry.ilabel, entry.olabel), (EPSILON, EPSILON));
        assert_eq!(entry.weight, TropicalWeight::new(2.0));
    }

    #[test]
    fn output_labels_move_to_the_front() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        let s3 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s3, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, EPSILON, TropicalWeight::new(1.0), s1))
            .unwrap();
        fst.add_transition(s1, Transition::new(2, 7, TropicalWeight::one(), s2))
            .unwrap();
        fst.add_transition(s2, Transition::new(3, 8, TropicalWeight::one(), s3))
            .unwrap();

        let before = language(&fst, 8);
        push_labels(&mut fst);
        assert_eq!(language(&fst, 8), before);
        // The whole output "7 8" is emitted from the fresh start before any input.
        let start = fst.start().unwrap();
        let first = &fst.transitions(start)[0];
        assert_eq!((first.ilabel, first.olabel), (EPSILON, 7));
        let second = &fst.transitions(first.nextstate)[0];
        assert_eq!((second.ilabel, second.olabel), (EPSILON, 8));
        // The original transitions now read input without emitting.
        assert_eq!(fst.transitions(s1)[0].olabel, EPSILON);
        assert_eq!(fst.transitions(s2)[0].olabel, EPSILON);
    }

    #[test]
    fn diverging_outputs_share_no_prefix() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 5, TropicalWeight::one(), s1))
            .unwrap();
        fst.add_transition(s0, Transition::new(2, 6, TropicalWeight::one(), s1))
            .unwrap();

        let before = language(&fst, 8);
        push_labels(&mut fst);
        // Nothing to push: no common prefix, so the automaton keeps its shape.
        assert_eq!(fst.start(), Some(s0));
        assert_eq!(fst.num_states(), 2);
        assert_eq!(language(&fst, 8), before);
    }
}
