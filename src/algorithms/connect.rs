use tracing::trace;

use crate::fst::VectorFst;
use crate::semiring::Semiring;
use crate::StateId;

/// Removes every state that is not both accessible (reachable from the start state) and
/// coaccessible (a final state is reachable from it), along with all transitions touching
/// them. Surviving states are renumbered densely.
///
/// If nothing useful survives, the result is the empty automaton: no states and no start
/// state.
pub fn connect<W: Semiring>(fst: &mut VectorFst<W>) {
    let n = fst.num_states();
    let Some(start) = fst.start() else {
        fst.raw_states_mut().clear();
        fst.invalidate_properties_keeping(crate::properties::FstProperties::empty());
        return;
    };

    // Forward reachability from the start state.
    let mut accessible = vec![false; n];
    let mut queue = vec![start];
    accessible[start as usize] = true;
    while let Some(q) = queue.pop() {
        for tr in fst.transitions(q) {
            if !accessible[tr.nextstate as usize] {
                accessible[tr.nextstate as usize] = true;
                queue.push(tr.nextstate);
            }
        }
    }

    // Backward reachability from the final states, over reversed transitions.
    let mut predecessors: Vec<Vec<StateId>> = vec![Vec::new(); n];
    for q in fst.states() {
        for tr in fst.transitions(q) {
            predecessors[tr.nextstate as usize].push(q);
        }
    }
    let mut coaccessible = vec![false; n];
    let mut queue: Vec<StateId> = fst
        .states()
        .filter(|&q| fst.is_final(q))
        .inspect(|&q| coaccessible[q as usize] = true)
        .collect();
    while let Some(q) = queue.pop() {
        for &p in &predecessors[q as usize] {
            if !coaccessible[p as usize] {
                coaccessible[p as usize] = true;
                queue.push(p);
            }
        }
    }

    let keep: Vec<bool> = (0..n).map(|i| accessible[i] && coaccessible[i]).collect();
    if keep.iter().all(|&k| k) {
        return;
    }
    trace!(
        "connect drops {} of {} states",
        keep.iter().filter(|&&k| !k).count(),
        n
    );

    if !keep[start as usize] {
        // The start state is useless, so the whole language is empty.
        fst.raw_states_mut().clear();
        fst.set_start_unchecked(None);
        fst.invalidate_properties_keeping(crate::properties::FstProperties::empty());
        return;
    }

    let mut remap: Vec<Option<StateId>> = vec![None; n];
    let mut next = 0 as StateId;
    for (i, &k) in keep.iter().enumerate() {
        if k {
            remap[i] = Some(next);
            next += 1;
        }
    }

    let old_states = std::mem::take(fst.raw_states_mut());
    let new_states = fst.raw_states_mut();
    for (i, mut state) in old_states.into_iter().enumerate() {
        if !keep[i] {
            continue;
        }
        state.transitions.retain(|tr| keep[tr.nextstate as usize]);
        for tr in &mut state.transitions {
            tr.nextstate = remap[tr.nextstate as usize].expect("kept target remapped");
        }
        new_states.push(state);
    }
    let new_start = remap[start as usize];
    fst.set_start_unchecked(new_start);
    fst.invalidate_properties_keeping(crate::properties::FstProperties::empty());
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn drops_dead_states_and_remaps() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        let dead_end = fst.add_state();
        let s2 = fst.add_state();
        let unreachable = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s2, TropicalWeight::one()).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::one(), dead_end))
            .unwrap();
        fst.add_transition(s0, Transition::new(2, 2, TropicalWeight::one(), s2))
            .unwrap();
        fst.add_transition(unreachable, Transition::new(3, 3, TropicalWeight::one(), s2))
            .unwrap();

        connect(&mut fst);
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.num_transitions(), 1);
        assert_eq!(fst.transitions(0)[0].ilabel, 2);
        assert!(fst.is_final(1));
    }

    #[test]
    fn useless_start_empties_the_automaton() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        let s0 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.add_transition(s0, Transition::new(1, 1, TropicalWeight::one(), s0))
            .unwrap();
        connect(&mut fst);
        assert_eq!(fst.num_states(), 0);
        assert_eq!(fst.start(), None);
    }
}
