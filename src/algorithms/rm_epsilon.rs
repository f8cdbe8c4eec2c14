use std::collections::VecDeque;

use tracing::debug;

use super::connect;
use crate::fst::{Transition, VectorFst};
use crate::math::Map;
use crate::properties::FstProperties;
use crate::semiring::{Semiring, WeightQuantize};
use crate::{StateId, EPSILON, KDELTA};

fn is_epsilon<W>(tr: &Transition<W>) -> bool {
    tr.ilabel == EPSILON && tr.olabel == EPSILON
}

/// The epsilon closure of `state`: every state reachable through `ε:ε` transitions alone,
/// with the `⊕`-summed weight of all epsilon paths leading there. The state itself is
/// part of its closure; epsilon cycles contribute their (delta-converged) star weight.
fn epsilon_closure<W>(fst: &VectorFst<W>, state: StateId) -> Vec<(StateId, W)>
where
    W: Semiring + WeightQuantize,
{
    let mut distance: Map<StateId, W> = Map::default();
    let mut residual: Map<StateId, W> = Map::default();
    let mut queue: VecDeque<StateId> = VecDeque::new();
    distance.insert(state, W::one());
    residual.insert(state, W::one());
    queue.push_back(state);

    while let Some(q) = queue.pop_front() {
        let Some(propagated) = residual.insert(q, W::zero()) else {
            continue;
        };
        if propagated.is_zero() {
            continue;
        }
        for tr in fst.transitions(q).iter().filter(|tr| is_epsilon(tr)) {
            let contribution = propagated.times(&tr.weight);
            let old = distance
                .get(&tr.nextstate)
                .cloned()
                .unwrap_or_else(W::zero);
            let updated = old.plus(&contribution);
            if !updated.approx_eq(&old, KDELTA) {
                distance.insert(tr.nextstate, updated);
                residual
                    .entry(tr.nextstate)
                    .or_insert_with(W::zero)
                    .plus_assign(&contribution);
                queue.push_back(tr.nextstate);
            }
        }
    }
    let mut closure: Vec<(StateId, W)> = distance
        .into_iter()
        .filter(|(_, w)| !w.is_zero())
        .collect();
    closure.sort_by_key(|(q, _)| *q);
    closure
}

/// Removes all `ε:ε` transitions while preserving the weighted language: every state
/// inherits the non-epsilon transitions and final weights of its epsilon closure, scaled
/// by the closure weights, and the automaton is trimmed afterwards.
///
/// Records [`FstProperties::NO_EPSILONS`] on the result. Epsilon cycles over
/// non-idempotent semirings are summed up to the default quantization delta.
pub fn rm_epsilon<W>(fst: &mut VectorFst<W>)
where
    W: Semiring + WeightQuantize,
{
    let n = fst.num_states();
    if n == 0 {
        fst.record_property(FstProperties::NO_EPSILONS, true);
        return;
    }
    debug!(states = n, "removing epsilon transitions");

    let mut rewritten: Vec<(Vec<Transition<W>>, Option<W>)> = Vec::with_capacity(n);
    for p in fst.states() {
        let mut transitions: Vec<Transition<W>> = Vec::new();
        let mut final_weight: Option<W> = None;
        for (q, closure_weight) in epsilon_closure(fst, p) {
            for tr in fst.transitions(q).iter().filter(|tr| !is_epsilon(tr)) {
                transitions.push(Transition::new(
                    tr.ilabel,
                    tr.olabel,
                    closure_weight.times(&tr.weight),
                    tr.nextstate,
                ));
            }
            if let Some(rho) = fst.final_weight(q) {
                let reached = closure_weight.times(rho);
                final_weight = Some(match final_weight {
                    Some(acc) => acc.plus(&reached),
                    None => reached,
                });
            }
        }
        rewritten.push((transitions, final_weight));
    }

    for (state, (transitions, final_weight)) in fst.raw_states_mut().iter_mut().zip(rewritten) {
        state.transitions = transitions;
        state.final_weight = final_weight;
    }
    fst.invalidate_properties_keeping(FstProperties::empty());
    connect(fst);
    fst.record_property(FstProperties::NO_EPSILONS, true);
}
