//! Running per-index state derived from a data chain.

use super::folded::FoldedChain;
use super::strategy::Fold;
use crate::chain::{Chain, FixedChain};
use crate::codec::FixedCodec;
use crate::config::ChainConfig;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

/// Synced state `S[i] = fold(S[i-1], data[i])` for every synchronized index.
pub struct SyncedChain<D, C, F>
where
    D: Chain,
    C: FixedCodec,
{
    inner: FoldedChain<D, C, F>,
}

impl<D, C, F> SyncedChain<D, C, F>
where
    D: Chain,
    D::Block: Default + Clone,
    C: FixedCodec,
    C::Block: Default + Clone,
    F: Fold<D::Block, C::Block>,
{
    /// Wrap an already opened sync chain.
    pub fn new(data: Arc<D>, synchroniser: F, sync_chain: FixedChain<C>) -> Self {
        Self {
            inner: FoldedChain::new(data, synchroniser, sync_chain),
        }
    }

    /// Open the sync chain at `path` over `data`.
    pub fn open(data: Arc<D>, codec: C, synchroniser: F, path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(data, codec, synchroniser, path, ChainConfig::default())
    }

    pub fn open_with_config(
        data: Arc<D>,
        codec: C,
        synchroniser: F,
        path: impl AsRef<Path>,
        config: ChainConfig,
    ) -> Result<Self> {
        let sync_chain = FixedChain::open_with_config(codec, path, config)?;
        Ok(Self::new(data, synchroniser, sync_chain))
    }

    /// Cap the number of data blocks folded per batch.
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self {
            inner: self.inner.with_batch_size(batch_size),
        }
    }

    /// The data chain.
    pub fn source(&self) -> &Arc<D> {
        self.inner.source()
    }

    /// Number of synchronized indices.
    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Catch up with the data chain. Returns the synchronized length.
    pub fn sync(&self) -> Result<u64> {
        self.inner.sync()
    }

    /// Synced state at `index`. Fails at or past the synchronized length.
    pub fn read_sync(&self, index: u64) -> Result<C::Block> {
        self.inner.read_block(index)
    }

    /// Synced state for a run of indices.
    pub fn read_range(&self, index: u64, results: &mut [C::Block]) -> Result<()> {
        self.inner.read(index, results)
    }

    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }
}
