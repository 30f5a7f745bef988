//! Batched carry-fold engine shared by synced and accumulated chains.

use super::strategy::Fold;
use super::MAX_BATCH_SIZE;
use crate::chain::{Chain, FixedChain};
use crate::codec::FixedCodec;
use crate::error::{ChainError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Fixed chain of folded state kept in step with a data chain.
///
/// `state[i]` is the fold of `state[i-1]` with `data[i]`, with no carry at
/// index 0.
pub struct FoldedChain<D, C, F>
where
    D: Chain,
    C: FixedCodec,
{
    /// Source chain; owned by the caller.
    data: Arc<D>,

    /// Fold strategy.
    fold: F,

    /// Folded state, one block per source block.
    state: FixedChain<C>,

    /// Serializes synchronization.
    sync_lock: Mutex<()>,

    /// Source elements folded per batch.
    batch_size: usize,
}

impl<D, C, F> FoldedChain<D, C, F>
where
    D: Chain,
    D::Block: Default + Clone,
    C: FixedCodec,
    C::Block: Default + Clone,
    F: Fold<D::Block, C::Block>,
{
    /// Wrap an already opened state chain.
    pub fn new(data: Arc<D>, fold: F, state: FixedChain<C>) -> Self {
        Self {
            data,
            fold,
            state,
            sync_lock: Mutex::new(()),
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Cap the number of source elements folded per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// The data chain this state derives from.
    pub fn source(&self) -> &Arc<D> {
        &self.data
    }

    /// The fold strategy.
    pub fn strategy(&self) -> &F {
        &self.fold
    }

    /// Number of folded indices.
    pub fn len(&self) -> u64 {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Fold every source block not yet folded. Returns the new length.
    pub fn sync(&self) -> Result<u64> {
        let _lock = self.sync_lock.lock();

        let source_len = self.data.len();
        let length = self.state.len();
        if length > source_len {
            return Err(ChainError::InconsistentLengths {
                derived: length,
                source_len,
            });
        }

        let backlog = source_len - length;
        if backlog == 0 {
            return Ok(length);
        }

        let mut carry = if length > 0 {
            Some(self.state.read_block(length - 1)?)
        } else {
            None
        };

        let buf_size = backlog.min(self.batch_size as u64) as usize;
        let mut data = vec![D::Block::default(); buf_size];
        let mut results = vec![C::Block::default(); buf_size];

        let mut done = 0u64;
        while done < backlog {
            let count = (backlog - done).min(buf_size as u64) as usize;
            let index = length + done;

            self.data.read(index, &mut data[..count])?;
            self.fold.fold(carry.as_ref(), &data[..count], &mut results[..count]);
            self.state.write(index, &results[..count])?;

            carry = Some(results[count - 1].clone());
            done += count as u64;
            trace!(index, count, "folded batch");
        }

        debug!(from = length, to = source_len, "synchronized folded chain");
        Ok(source_len)
    }

    /// Read the folded state at `index`.
    pub fn read_block(&self, index: u64) -> Result<C::Block> {
        self.state.read_block(index)
    }

    /// Read folded state for a run of indices.
    pub fn read(&self, index: u64, results: &mut [C::Block]) -> Result<()> {
        self.state.read(index, results)
    }

    /// Close the state chain. The data chain is left open.
    pub fn close(&self) -> Result<()> {
        self.state.close()
    }
}
