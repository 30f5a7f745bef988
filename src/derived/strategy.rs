//! Fold strategies plugged into derived chains.
//!
//! Strategies are generic parameters of the chains that use them, so the
//! batch loop is monomorphized rather than dispatched per call.

/// Carry-threaded fold over a batch.
///
/// `results[i]` must be the fold of `results[i-1]` (or `carry` for `i == 0`)
/// with `data[i]`. `carry` is `None` only for the very first element of the
/// chain. The new carry is the last result.
pub trait Fold<D, S> {
    fn fold(&self, carry: Option<&S>, data: &[D], results: &mut [S]);
}

impl<D, S, F> Fold<D, S> for F
where
    F: Fn(Option<&S>, &[D], &mut [S]),
{
    fn fold(&self, carry: Option<&S>, data: &[D], results: &mut [S]) {
        self(carry, data, results)
    }
}

/// A fold producing per-index edges, plus the operator that turns two edges
/// into the cumulative between them.
pub trait Accumulator<D, C>: Fold<D, C> {
    /// Cumulative over `(from, to]`, given the edges at both ends.
    fn combine(&self, from: &C, to: &C) -> C;
}

/// [`Accumulator`] built from a fold closure and a combine closure.
#[derive(Clone, Copy, Debug)]
pub struct FnAccumulator<F, G> {
    fold: F,
    combine: G,
}

impl<F, G> FnAccumulator<F, G> {
    pub fn new(fold: F, combine: G) -> Self {
        Self { fold, combine }
    }
}

impl<D, C, F, G> Fold<D, C> for FnAccumulator<F, G>
where
    F: Fn(Option<&C>, &[D], &mut [C]),
{
    fn fold(&self, carry: Option<&C>, data: &[D], results: &mut [C]) {
        (self.fold)(carry, data, results)
    }
}

impl<D, C, F, G> Accumulator<D, C> for FnAccumulator<F, G>
where
    F: Fn(Option<&C>, &[D], &mut [C]),
    G: Fn(&C, &C) -> C,
{
    fn combine(&self, from: &C, to: &C) -> C {
        (self.combine)(from, to)
    }
}

/// Per-group summary. Groups never share state: each aggregate depends only
/// on the elements of its own group.
pub trait Aggregator<D, A> {
    /// Summarize one group of raw data elements.
    fn aggregate(&self, data: &[D]) -> A;

    /// Summarize one group of aggregates from the level below.
    fn merge(&self, aggregates: &[A]) -> A;
}

/// [`Aggregator`] built from two closures.
#[derive(Clone, Copy, Debug)]
pub struct FnAggregator<F, G> {
    aggregate: F,
    merge: G,
}

impl<F, G> FnAggregator<F, G> {
    pub fn new(aggregate: F, merge: G) -> Self {
        Self { aggregate, merge }
    }
}

impl<D, A, F, G> Aggregator<D, A> for FnAggregator<F, G>
where
    F: Fn(&[D]) -> A,
    G: Fn(&[A]) -> A,
{
    fn aggregate(&self, data: &[D]) -> A {
        (self.aggregate)(data)
    }

    fn merge(&self, aggregates: &[A]) -> A {
        (self.merge)(aggregates)
    }
}
