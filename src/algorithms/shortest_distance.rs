use std::collections::VecDeque;

use crate::fst::VectorFst;
use crate::semiring::{Semiring, WeightQuantize};
use crate::StateId;

/// Computes, for every state, the shortest distance to the final states: the `⊕`-sum over
/// all paths from the state to a final state of the `⊗`-product of the path's transition
/// weights and the reached final weight.
///
/// This is the queue-based relaxation of Mohri's generic shortest-distance algorithm run
/// on the reversed automaton; only the yet-unpropagated part of each distance is pushed
/// along predecessor transitions, so weights are never counted twice. Convergence is
/// decided up to quantization by `delta`, which makes the computation terminate for
/// cyclic automata over approximable semirings such as the log semiring.
///
/// The product order follows the original transition direction: a predecessor `p` of `q`
/// through a transition of weight `w` receives the contribution `w ⊗ distance(q)`.
pub fn reverse_shortest_distance<W>(fst: &VectorFst<W>, delta: f32) -> Vec<W>
where
    W: Semiring + WeightQuantize,
{
    let n = fst.num_states();
    let mut distance = vec![W::zero(); n];
    let mut residual = vec![W::zero(); n];
    let mut enqueued = vec![false; n];
    let mut queue: VecDeque<StateId> = VecDeque::new();

    // Transitions indexed by their target.
    let mut incoming: Vec<Vec<(StateId, W)>> = vec![Vec::new(); n];
    for q in fst.states() {
        for tr in fst.transitions(q) {
            incoming[tr.nextstate as usize].push((q, tr.weight.clone()));
        }
    }

    for q in fst.states() {
        if let Some(rho) = fst.final_weight(q) {
            distance[q as usize] = rho.clone();
            residual[q as usize] = rho.clone();
            enqueued[q as usize] = true;
            queue.push_back(q);
        }
    }

    while let Some(q) = queue.pop_front() {
        enqueued[q as usize] = false;
        let propagated = std::mem::replace(&mut residual[q as usize], W::zero());
        for &(p, ref w) in &incoming[q as usize] {
            let contribution = w.times(&propagated);
            if contribution.is_zero() {
                continue;
            }
            let updated = distance[p as usize].plus(&contribution);
            if !updated.approx_eq(&distance[p as usize], delta) {
                distance[p as usize] = updated;
                residual[p as usize].plus_assign(&contribution);
                if !enqueued[p as usize] {
                    enqueued[p as usize] = true;
                    queue.push_back(p);
                }
            }
        }
    }
    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn tropical_distance_to_final() {
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

        let dist = reverse_shortest_distance(&fst, KDELTA);
        assert_eq!(dist[s2 as usize], TropicalWeight::new(0.5));
        assert_eq!(dist[s1 as usize], TropicalWeight::new(1.5));
        // min(1.0 + 1.0 + 0.5, 4.0 + 0.5)
        assert_eq!(dist[s0 as usize], TropicalWeight::new(2.5));
    }

    #[test]
    fn log_cycle_converges() {
        let mut fst = VectorFst::<LogWeight>::new();
        let s0 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s0, LogWeight::one()).unwrap();
        // Self loop with weight 1.0 (probability e⁻¹): the distance is the geometric
        // series ⊕ₖ k·1.0 = -ln(1/(1 - e⁻¹)).
        fst.add_transition(s0, Transition::new(1, 1, LogWeight::new(1.0), s0))
            .unwrap();
        let dist = reverse_shortest_distance(&fst, KDELTA);
        let expected = -(1.0f32 / (1.0 - (-1.0f32).exp())).ln();
        assert!((dist[0].value() - expected).abs() < 0.01);
    }
}
