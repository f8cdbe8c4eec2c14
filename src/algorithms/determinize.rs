use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::fst::{Transition, VectorFst};
use crate::math::Map;
use crate::properties::FstProperties;
use crate::semiring::{Semiring, WeaklyDivisibleSemiring, WeightQuantize};
use crate::{Label, StateId, EPSILON, KDELTA};

/// A determinization state: the source states reachable by the paths read so far, each
/// with the residual weight not yet emitted on those paths. Sorted by state id and with
/// residuals normalized by their common divisor, so that equal subsets hash equally.
type Subset<W> = Vec<(StateId, W)>;

fn quantized<W: WeightQuantize>(subset: &Subset<W>) -> Subset<W> {
    subset
        .iter()
        .map(|(q, r)| (*q, r.quantize(KDELTA)))
        .collect()
}

/// Weighted subset construction over an epsilon-free acceptor. Returns an equivalent
/// input-deterministic automaton: no state has two transitions with the same input label.
///
/// Per-label weights are normalized by their `⊕`-sum and the residuals carried in the
/// subset, which keeps the construction finite on the automata the optimizer feeds it
/// (acyclic ones, or cyclic ones over idempotent semirings after weight encoding).
///
/// The input must be an epsilon-free acceptor; on any other automaton the result is a
/// copy with [`FstProperties::ERROR`] set. Call sites bracket transducers with
/// [`super::encode`]/[`super::decode`] instead of relying on this fallback.
pub fn determinize<W>(fst: &VectorFst<W>) -> VectorFst<W>
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    let supported = fst.states().all(|q| {
        fst.transitions(q)
            .iter()
            .all(|tr| tr.ilabel == tr.olabel && tr.ilabel != EPSILON)
    });
    if !supported {
        debug!("determinization input is not an epsilon-free acceptor");
        let mut out = fst.clone();
        out.set_error();
        return out;
    }

    let mut out: VectorFst<W> = VectorFst::new();
    let Some(start) = fst.start() else {
        out.record_property(FstProperties::I_DETERMINISTIC, true);
        out.record_property(FstProperties::NO_EPSILONS, true);
        out.record_property(FstProperties::ACCEPTOR, true);
        return out;
    };
    debug!(states = fst.num_states(), "determinizing");

    let mut subset_ids: Map<Subset<W>, StateId> = Map::default();
    let mut worklist: Vec<(StateId, Subset<W>)> = Vec::new();

    let initial: Subset<W> = vec![(start, W::one())];
    let out_start = out.add_state();
    subset_ids.insert(quantized(&initial), out_start);
    worklist.push((out_start, initial));
    out.set_start_unchecked(Some(out_start));

    while let Some((out_state, subset)) = worklist.pop() {
        let mut final_weight: Option<W> = None;
        // Group target states per label, `⊕`-summing the weights reaching each target.
        let mut by_label: BTreeMap<Label, BTreeMap<StateId, W>> = BTreeMap::new();
        for (q, residual) in &subset {
            if let Some(rho) = fst.final_weight(*q) {
                let reached = residual.times(rho);
                final_weight = Some(match final_weight {
                    Some(acc) => acc.plus(&reached),
                    None => reached,
                });
            }
            for tr in fst.transitions(*q) {
                by_label
                    .entry(tr.ilabel)
                    .or_default()
                    .entry(tr.nextstate)
                    .and_modify(|w| w.plus_assign(&residual.times(&tr.weight)))
                    .or_insert_with(|| residual.times(&tr.weight));
            }
        }
        out.raw_states_mut()[out_state as usize].final_weight = final_weight;

        for (label, targets) in by_label {
            let divisor = targets
                .values()
                .fold(W::zero(), |acc, w| acc.plus(w));
            let next_subset: Subset<W> = targets
                .into_iter()
                .map(|(q, w)| (q, w.divide(&divisor)))
                .collect();
            let key = quantized(&next_subset);
            let target = match subset_ids.get(&key) {
                Some(&id) => id,
                None => {
                    let id = out.add_state();
                    trace!(subset = ?key, id, "new determinization state");
                    subset_ids.insert(key, id);
                    worklist.push((id, next_subset));
                    id
                }
            };
            out.raw_states_mut()[out_state as usize]
                .transitions
                .push(Transition::new(label, label, divisor, target));
        }
    }

    out.record_property(FstProperties::I_DETERMINISTIC, true);
    out.record_property(FstProperties::NO_EPSILONS, true);
    out.record_property(FstProperties::ACCEPTOR, true);
    if fst.is_error() {
        out.set_error();
    }
    debug!(states = out.num_states(), "determinization finished");
    out
}
