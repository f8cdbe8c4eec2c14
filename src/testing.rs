//! Test support: brute-force enumeration of the weighted relation an automaton
//! computes, used to check that rewrites preserve the language.

use crate::fst::VectorFst;
use crate::math::Map;
use crate::semiring::Semiring;
use crate::{Label, StateId, EPSILON};

/// Enumerates every accepting path of at most `max_steps` transitions and returns the
/// `⊕`-summed weight per (input string, output string) pair, epsilon labels skipped.
///
/// On cyclic automata this is a bounded approximation; compare results computed with the
/// same bound.
pub(crate) fn language<W: Semiring>(
    fst: &VectorFst<W>,
    max_steps: usize,
) -> Map<(Vec<Label>, Vec<Label>), W> {
    let mut accepted = Map::default();
    let Some(start) = fst.start() else {
        return accepted;
    };
    let mut input = Vec::new();
    let mut output = Vec::new();
    walk(
        fst,
        start,
        W::one(),
        &mut input,
        &mut output,
        max_steps,
        &mut accepted,
    );
    accepted
}

fn walk<W: Semiring>(
    fst: &VectorFst<W>,
    state: StateId,
    weight: W,
    input: &mut Vec<Label>,
    output: &mut Vec<Label>,
    steps_left: usize,
    accepted: &mut Map<(Vec<Label>, Vec<Label>), W>,
) {
    if let Some(rho) = fst.final_weight(state) {
        let reached = weight.times(rho);
        accepted
            .entry((input.clone(), output.clone()))
            .and_modify(|w| w.plus_assign(&reached))
            .or_insert(reached);
    }
    if steps_left == 0 {
        return;
    }
    for tr in fst.transitions(state) {
        if tr.ilabel != EPSILON {
            input.push(tr.ilabel);
        }
        if tr.olabel != EPSILON {
            output.push(tr.olabel);
        }
        walk(
            fst,
            tr.nextstate,
            weight.times(&tr.weight),
            input,
            output,
            steps_left - 1,
            accepted,
        );
        if tr.olabel != EPSILON {
            output.pop();
        }
        if tr.ilabel != EPSILON {
            input.pop();
        }
    }
}
