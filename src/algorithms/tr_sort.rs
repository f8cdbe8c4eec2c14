use crate::fst::VectorFst;
use crate::properties::FstProperties;
use crate::semiring::Semiring;

/// Which label to sort a state's transitions by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSort {
    /// Sort by input label. Required of the right-hand operand of composition-like
    /// operations such as difference.
    Input,
    /// Sort by output label.
    Output,
}

/// Sorts every state's transitions by the given label and records the corresponding
/// sortedness property. Sorting never changes the weighted language.
pub fn tr_sort<W: Semiring>(fst: &mut VectorFst<W>, sort: LabelSort) {
    for state in fst.raw_states_mut() {
        match sort {
            LabelSort::Input => state.transitions.sort_by_key(|tr| tr.ilabel),
            LabelSort::Output => state.transitions.sort_by_key(|tr| tr.olabel),
        }
    }
    // Reordering within a state invalidates nothing except the other sort order.
    let (established, dropped) = match sort {
        LabelSort::Input => (FstProperties::I_LABEL_SORTED, FstProperties::O_LABEL_SORTED),
        LabelSort::Output => (FstProperties::O_LABEL_SORTED, FstProperties::I_LABEL_SORTED),
    };
    fst.invalidate_properties_keeping(FstProperties::COMPUTABLE - dropped);
    fst.record_property(established, true);
}
