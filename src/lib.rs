//! # Block DB
//!
//! Append-only block chains persisted to flat files, plus derived chains
//! that keep secondary per-record state in step with them.
//!
//! ## Core Concepts
//!
//! - **Chains**: ordered, randomly readable sequences of blocks. Fixed chains
//!   store constant-size blocks in one file; variable chains store a payload
//!   file plus an index of cumulative end offsets.
//! - **Codecs**: caller-supplied marshal/unmarshal over a big-endian cursor.
//! - **Synced chains**: running folded state, one entry per data block.
//! - **Accumulated chains**: running edges and a combine operator, giving the
//!   cumulative between any two indices from two reads.
//! - **Aggregated chains**: a 128-ary tower of per-group aggregates.
//!
//! Derived chains catch up in bounded batches and keep what they committed,
//! so nothing is rebuilt from scratch after a restart.
//!
//! ## Example
//!
//! ```ignore
//! use blockdb::{AccumulatedChain, Chain, FixedChain, FnAccumulator, U64Codec};
//! use std::sync::Arc;
//!
//! let data = Arc::new(FixedChain::open(U64Codec, "./data.bin")?);
//! data.write(0, &[1, 2, 3, 4, 5])?;
//!
//! let sums = AccumulatedChain::open(
//!     Arc::clone(&data),
//!     U64Codec,
//!     FnAccumulator::new(running_sum, |a: &u64, b: &u64| b - a),
//!     "./sums.bin",
//! )?;
//! sums.sync()?;
//!
//! // Sum of elements 2..=3.
//! assert_eq!(sums.windows(&[1, 3])?, vec![7]);
//! ```

pub mod chain;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod derived;
pub mod error;

// Re-exports
pub use chain::{Chain, FixedChain, VariableChain};
pub use codec::{BytesCodec, FixedCodec, U64Codec, VariableCodec};
pub use config::{ChainConfig, Durability, RecoveryMode};
pub use cursor::{ByteReader, ByteWriter};
pub use derived::{
    AccumulatedChain, Accumulator, AggregatedChain, Aggregator, FnAccumulator, FnAggregator, Fold,
    FoldedChain, SyncedChain, GROUP_SIZE, MAX_BATCH_SIZE, MAX_LEVELS,
};
pub use error::{ChainError, Result};
