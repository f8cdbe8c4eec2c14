//! The property-driven optimizer.
//!
//! [`optimize`] rewrites an automaton into an equivalent but more efficient one. Which
//! rewrites are sound depends on two kinds of capabilities: algebraic ones of the weight
//! type (is `⊕` idempotent?) and structural ones of the automaton (is it an acceptor, is
//! it acyclic, does it have weighted cycles?). The structural facts come from the
//! tri-state [property cache](crate::properties::PropertyCache) and are treated
//! conservatively: a property that is not known true never enables a rewrite.
//!
//! The caller decides, through the `compute_props` flag, whether unknown properties may
//! be computed by a full traversal first. Passing `false` trades optimization quality
//! for a guaranteed single pass over the automaton per rewrite.

use tracing::debug;

use crate::algorithms::{
    decode, determinize, encode, minimize, push_labels, rm_epsilon, sum_transitions, tr_sort,
    EncodeFlags, LabelSort,
};
use crate::fst::VectorFst;
use crate::properties::FstProperties;
use crate::semiring::{Semiring, SemiringProperties, WeaklyDivisibleSemiring, WeightQuantize};

/// Properties any one of which makes determinization of an idempotent-weighted automaton
/// terminate without first encoding the weights away.
const DO_NOT_ENCODE_WEIGHTS: FstProperties = FstProperties::ACYCLIC
    .union(FstProperties::UNWEIGHTED)
    .union(FstProperties::UNWEIGHTED_CYCLES);

fn maybe_rm_epsilon<W>(fst: &mut VectorFst<W>, compute_props: bool)
where
    W: Semiring + WeightQuantize,
{
    if !fst
        .properties(FstProperties::NO_EPSILONS, compute_props)
        .contains(FstProperties::NO_EPSILONS)
    {
        rm_epsilon(fst);
    }
}

fn determinize_in_place<W>(fst: &mut VectorFst<W>)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    *fst = determinize(fst);
}

/// The encode / determinize / minimize / decode bracket used whenever determinization is
/// only valid on a transformed view of the automaton.
fn encode_determinize_minimize_decode<W>(fst: &mut VectorFst<W>, flags: EncodeFlags)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    let table = encode(fst, flags);
    determinize_in_place(fst);
    minimize(fst);
    decode(fst, &table);
}

/// Optimizes an automaton in place, preserving its weighted language.
///
/// The rewrite sequence is chosen from the weight type's capabilities and the automaton's
/// cached structural properties. Epsilon removal and transition-combining always run
/// (unless the automaton is already known epsilon-free); determinization and minimization
/// run exactly when a sound way of applying them is known:
///
/// - a known-deterministic automaton is only minimized;
/// - over a non-idempotent semiring, determinization requires known acyclicity and, for
///   transducers, a label encoding;
/// - over an idempotent semiring, every automaton is determinized; if it may have
///   weighted cycles the weights are encoded away first, which preserves the language
///   but not determinism of the decoded result.
///
/// Automata that fit no sound sequence are left epsilon-free and transition-combined but
/// otherwise unchanged. Rewrites never fail: an infeasible rewrite flags the automaton
/// with [`FstProperties::ERROR`] instead.
pub fn optimize<W>(fst: &mut VectorFst<W>, compute_props: bool)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    if fst
        .properties(FstProperties::ACCEPTOR, compute_props)
        .contains(FstProperties::ACCEPTOR)
    {
        optimize_acceptor(fst, compute_props);
    } else {
        optimize_transducer(fst, compute_props);
    }
}

fn optimize_transducer<W>(fst: &mut VectorFst<W>, compute_props: bool)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    debug!(states = fst.num_states(), "optimizing transducer");
    maybe_rm_epsilon(fst, compute_props);
    sum_transitions(fst);

    if !W::properties().contains(SemiringProperties::IDEMPOTENT) {
        if fst
            .properties(FstProperties::I_DETERMINISTIC, compute_props)
            .contains(FstProperties::I_DETERMINISTIC)
        {
            debug!("deterministic input, minimizing only");
            minimize(fst);
        } else if fst
            .properties(FstProperties::ACYCLIC, compute_props)
            .contains(FstProperties::ACYCLIC)
        {
            debug!("acyclic input, determinizing with encoded labels");
            encode_determinize_minimize_decode(fst, EncodeFlags::LABELS);
        } else {
            // Determinization of a possibly-cyclic automaton over a non-idempotent
            // semiring need not terminate; stop here.
            debug!("possibly cyclic input over a non-idempotent semiring, stopping");
        }
        return;
    }

    if fst
        .properties(FstProperties::I_DETERMINISTIC, compute_props)
        .contains(FstProperties::I_DETERMINISTIC)
    {
        debug!("deterministic input, minimizing only");
        minimize(fst);
    } else if fst
        .properties(DO_NOT_ENCODE_WEIGHTS, compute_props)
        .is_empty()
    {
        debug!("possibly weighted cycles, determinizing with encoded labels and weights");
        encode_determinize_minimize_decode(fst, EncodeFlags::LABELS | EncodeFlags::WEIGHTS);
        // Decoding the weights can resurface duplicate transitions.
        sum_transitions(fst);
    } else {
        debug!("determinizing with encoded labels");
        encode_determinize_minimize_decode(fst, EncodeFlags::LABELS);
    }
}

fn optimize_acceptor<W>(fst: &mut VectorFst<W>, compute_props: bool)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    debug!(states = fst.num_states(), "optimizing acceptor");
    maybe_rm_epsilon(fst, compute_props);
    sum_transitions(fst);

    if !W::properties().contains(SemiringProperties::IDEMPOTENT) {
        if fst
            .properties(FstProperties::I_DETERMINISTIC, compute_props)
            .contains(FstProperties::I_DETERMINISTIC)
        {
            debug!("deterministic input, minimizing only");
            minimize(fst);
        } else if fst
            .properties(FstProperties::ACYCLIC, compute_props)
            .contains(FstProperties::ACYCLIC)
        {
            debug!("acyclic input, determinizing directly");
            determinize_in_place(fst);
            minimize(fst);
        } else {
            debug!("possibly cyclic input over a non-idempotent semiring, stopping");
        }
        return;
    }

    if fst
        .properties(FstProperties::I_DETERMINISTIC, compute_props)
        .contains(FstProperties::I_DETERMINISTIC)
    {
        debug!("deterministic input, minimizing only");
        minimize(fst);
    } else if fst
        .properties(DO_NOT_ENCODE_WEIGHTS, compute_props)
        .is_empty()
    {
        debug!("possibly weighted cycles, determinizing with encoded labels and weights");
        encode_determinize_minimize_decode(fst, EncodeFlags::LABELS | EncodeFlags::WEIGHTS);
        sum_transitions(fst);
    } else {
        debug!("determinizing directly");
        determinize_in_place(fst);
        minimize(fst);
    }
}

/// Prepares a transducer for cross-products with string automata: output labels are
/// pushed toward the initial state and epsilon transitions removed, so that the output
/// side is emitted as early as possible. The weighted relation is unchanged.
pub fn optimize_for_string_cross_product<W>(fst: &mut VectorFst<W>, compute_props: bool)
where
    W: Semiring + WeightQuantize,
{
    debug!(states = fst.num_states(), "optimizing for string cross-product");
    push_labels(fst);
    maybe_rm_epsilon(fst, compute_props);
}

/// Prepares an acceptor for use as the right-hand side of difference: epsilon-free,
/// input-deterministic and sorted by input label, which is what a subtractive
/// composition filter requires.
pub fn prepare_for_difference_rhs<W>(fst: &mut VectorFst<W>, compute_props: bool)
where
    W: Semiring + WeaklyDivisibleSemiring + WeightQuantize,
{
    debug!(states = fst.num_states(), "preparing difference right-hand side");
    maybe_rm_epsilon(fst, compute_props);
    if !fst
        .properties(FstProperties::I_DETERMINISTIC, compute_props)
        .contains(FstProperties::I_DETERMINISTIC)
    {
        determinize_in_place(fst);
    }
    tr_sort(fst, LabelSort::Input);
}
