use bitflags::bitflags;
use tracing::{debug, trace};

use super::connect;
use crate::fst::{Transition, VectorFst};
use crate::math::Map;
use crate::properties::FstProperties;
use crate::semiring::Semiring;
use crate::{Label, EPSILON};

bitflags! {
    /// Which components of a transition to fold into the encoded label.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EncodeFlags: u32 {
        /// Fold the output label in, turning a transducer into an acceptor.
        const LABELS = 0b01;
        /// Fold the weight in, turning a weighted automaton into an unweighted one.
        const WEIGHTS = 0b10;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EncodeTuple<W> {
    ilabel: Label,
    olabel: Label,
    weight: W,
}

/// The bijection between transition tuples and the fresh labels [`encode`] replaced them
/// with. A table is created by one `encode` call, must be handed unchanged to the paired
/// [`decode`] call, and is meaningless for any other automaton.
///
/// Encoded labels start at 1, so an encoded automaton never contains epsilon transitions.
#[derive(Debug, Clone)]
pub struct EncodeTable<W: Semiring> {
    flags: EncodeFlags,
    tuples: Vec<EncodeTuple<W>>,
    ids: Map<EncodeTuple<W>, Label>,
}

impl<W: Semiring> EncodeTable<W> {
    fn new(flags: EncodeFlags) -> Self {
        Self {
            flags,
            tuples: Vec::new(),
            ids: Map::default(),
        }
    }

    /// The flags this table was built with.
    pub fn flags(&self) -> EncodeFlags {
        self.flags
    }

    /// The number of distinct tuples seen while encoding.
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Whether no tuple has been encoded.
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    fn tuple_of(&self, tr: &Transition<W>) -> EncodeTuple<W> {
        EncodeTuple {
            ilabel: tr.ilabel,
            olabel: if self.flags.contains(EncodeFlags::LABELS) {
                tr.olabel
            } else {
                EPSILON
            },
            weight: if self.flags.contains(EncodeFlags::WEIGHTS) {
                tr.weight.clone()
            } else {
                W::one()
            },
        }
    }

    fn encode_tuple(&mut self, tuple: EncodeTuple<W>) -> Label {
        if let Some(&label) = self.ids.get(&tuple) {
            return label;
        }
        self.tuples.push(tuple.clone());
        let label = self.tuples.len() as Label;
        self.ids.insert(tuple, label);
        label
    }

    fn decode_label(&self, label: Label) -> Option<&EncodeTuple<W>> {
        label
            .checked_sub(1)
            .and_then(|id| self.tuples.get(id as usize))
    }
}

/// Folds labels and/or weights into opaque integer labels, so that algorithms restricted
/// to acceptors or to unweighted automata become applicable. Returns the table required
/// by the paired [`decode`].
///
/// When weights are folded, final weights are folded too: every final state becomes
/// non-final and instead reaches a fresh super-final state through a transition labelled
/// with the encoded `(ε, ε, final-weight)` tuple. `decode` reverts that construction.
pub fn encode<W: Semiring>(fst: &mut VectorFst<W>, flags: EncodeFlags) -> EncodeTable<W> {
    debug!(?flags, "encoding transitions");
    let mut table = EncodeTable::new(flags);
    let encode_labels = flags.contains(EncodeFlags::LABELS);
    let encode_weights = flags.contains(EncodeFlags::WEIGHTS);

    for state in fst.raw_states_mut().iter_mut() {
        for tr in &mut state.transitions {
            let label = table.encode_tuple(table.tuple_of(tr));
            tr.ilabel = label;
            if encode_labels {
                tr.olabel = label;
            }
            if encode_weights {
                tr.weight = W::one();
            }
        }
    }

    if encode_weights {
        let states: Vec<_> = fst.states().collect();
        let superfinal = fst.add_state();
        for q in states {
            let Some(rho) = fst.raw_states_mut()[q as usize].final_weight.take() else {
                continue;
            };
            let label = table.encode_tuple(EncodeTuple {
                ilabel: EPSILON,
                olabel: EPSILON,
                weight: rho,
            });
            let olabel = if encode_labels { label } else { EPSILON };
            fst.raw_states_mut()[q as usize]
                .transitions
                .push(Transition::new(label, olabel, W::one(), superfinal));
        }
        fst.raw_states_mut()[superfinal as usize].final_weight = Some(W::one());
    }

    fst.invalidate_properties_keeping(FstProperties::empty());
    // Encoded labels start at 1, so no transition is an epsilon transition.
    fst.record_property(FstProperties::NO_EPSILONS, true);
    if encode_labels {
        fst.record_property(FstProperties::ACCEPTOR, true);
    }
    if encode_weights {
        fst.record_property(FstProperties::UNWEIGHTED, true);
    }
    trace!(tuples = table.len(), "encoding finished");
    table
}

/// Reverts the label/weight folding performed by the [`encode`] call that produced
/// `table`. Transitions whose label is not present in the table (which cannot happen in
/// an intact encode/decode bracket) flag the automaton with
/// [`FstProperties::ERROR`] and are left in place.
pub fn decode<W: Semiring>(fst: &mut VectorFst<W>, table: &EncodeTable<W>) {
    debug!(tuples = table.len(), "decoding transitions");
    let decode_labels = table.flags().contains(EncodeFlags::LABELS);
    let decode_weights = table.flags().contains(EncodeFlags::WEIGHTS);

    let mut missing = false;
    for state in fst.raw_states_mut().iter_mut() {
        for tr in &mut state.transitions {
            let Some(tuple) = table.decode_label(tr.ilabel) else {
                missing = true;
                continue;
            };
            tr.ilabel = tuple.ilabel;
            if decode_labels {
                tr.olabel = tuple.olabel;
            }
            if decode_weights {
                tr.weight = tuple.weight.clone();
            }
        }
    }
    fst.invalidate_properties_keeping(FstProperties::empty());
    if decode_weights {
        rm_final_epsilon(fst);
    }
    if missing {
        fst.set_error();
    }
}

/// Folds decoded `(ε, ε, w)` transitions into dead-end final states back into final
/// weights and trims the now-unreachable super-final state. This is the inverse of the
/// super-final construction of [`encode`] with [`EncodeFlags::WEIGHTS`].
fn rm_final_epsilon<W: Semiring>(fst: &mut VectorFst<W>) {
    let dead_end_final: Vec<bool> = fst
        .states()
        .map(|q| fst.is_final(q) && fst.transitions(q).is_empty())
        .collect();

    let mut finals: Vec<Option<W>> = fst
        .states()
        .map(|q| fst.final_weight(q).cloned())
        .collect();
    for (q, state) in fst.raw_states_mut().iter_mut().enumerate() {
        let mut folded = finals[q].take();
        state.transitions.retain(|tr| {
            let removable = tr.ilabel == EPSILON
                && tr.olabel == EPSILON
                && dead_end_final[tr.nextstate as usize];
            if removable {
                let rho = finals[tr.nextstate as usize]
                    .clone()
                    .unwrap_or_else(W::one);
                let reached = tr.weight.times(&rho);
                folded = Some(match folded.take() {
                    Some(acc) => acc.plus(&reached),
                    None => reached,
                });
            }
            !removable
        });
        finals[q] = folded;
        state.final_weight = finals[q].clone();
    }
    fst.invalidate_properties_keeping(FstProperties::empty());
    connect(fst);
}
