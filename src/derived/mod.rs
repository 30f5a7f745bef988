//! Derived chains.
//!
//! A derived chain wraps a data chain it does not own and incrementally
//! maintains per-record state in chains it does own. After appending to the
//! data chain, call the derived chain's `sync` to fold the new records in;
//! derived reads are valid only below the derived chain's own length.
//!
//! - [`SyncedChain`]: running state `S[i] = fold(S[i-1], data[i])`.
//! - [`AccumulatedChain`]: running "edges" plus a combine operator that turns
//!   any two edges into the cumulative between them.
//! - [`AggregatedChain`]: a 128-ary tower of per-group aggregates.
//!
//! Synchronization works in bounded batches and commits each batch with one
//! write, so a failed call keeps its finished batches and the next call
//! resumes from there.

mod accumulated;
mod aggregated;
mod folded;
mod strategy;
mod synced;

pub use accumulated::AccumulatedChain;
pub use aggregated::{AggregatedChain, GROUP_BITS, GROUP_SIZE, MAX_LEVELS};
pub use folded::FoldedChain;
pub use strategy::{Accumulator, Aggregator, Fold, FnAccumulator, FnAggregator};
pub use synced::SyncedChain;

/// Upper bound on the number of source elements processed per batch.
pub const MAX_BATCH_SIZE: usize = 32768;
