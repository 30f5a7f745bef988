//! Edge state plus a combine operator, for windowed cumulatives.
//!
//! Edges are folded exactly like synced state. Any window between two
//! synchronized indices is then answered from the two edges at its ends,
//! without touching the raw data again. With a running sum as the edge and
//! subtraction as the combine, this is the classic prefix-sum difference.

use super::folded::FoldedChain;
use super::strategy::Accumulator;
use crate::chain::{Chain, FixedChain};
use crate::codec::FixedCodec;
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use std::path::Path;
use std::sync::Arc;

/// Edge chain over a data chain.
pub struct AccumulatedChain<D, C, A>
where
    D: Chain,
    C: FixedCodec,
{
    inner: FoldedChain<D, C, A>,
}

impl<D, C, A> AccumulatedChain<D, C, A>
where
    D: Chain,
    D::Block: Default + Clone,
    C: FixedCodec,
    C::Block: Default + Clone,
    A: Accumulator<D::Block, C::Block>,
{
    /// Wrap an already opened edge chain.
    pub fn new(data: Arc<D>, accumulator: A, edge_chain: FixedChain<C>) -> Self {
        Self {
            inner: FoldedChain::new(data, accumulator, edge_chain),
        }
    }

    /// Open the edge chain at `path` over `data`.
    pub fn open(data: Arc<D>, codec: C, accumulator: A, path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(data, codec, accumulator, path, ChainConfig::default())
    }

    pub fn open_with_config(
        data: Arc<D>,
        codec: C,
        accumulator: A,
        path: impl AsRef<Path>,
        config: ChainConfig,
    ) -> Result<Self> {
        let edge_chain = FixedChain::open_with_config(codec, path, config)?;
        Ok(Self::new(data, accumulator, edge_chain))
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

    /// Number of synchronized edges.
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

    /// Edge at `index`.
    pub fn edge(&self, index: u64) -> Result<C::Block> {
        self.inner.read_block(index)
    }

    /// Read the edges at `indices` into `edges` and combine each adjacent
    /// pair into `cumulatives`.
    ///
    /// `indices` must hold at least two strictly ascending indices, `edges`
    /// must be exactly as long as `indices`, and `cumulatives` one shorter.
    pub fn cumulatives(
        &self,
        indices: &[u64],
        edges: &mut [C::Block],
        cumulatives: &mut [C::Block],
    ) -> Result<()> {
        let count = indices.len();
        if count < 2 {
            return Err(ChainError::TooFewIndices(count));
        }
        if edges.len() != count {
            return Err(ChainError::BufferLength {
                expected: count,
                actual: edges.len(),
            });
        }
        if cumulatives.len() != count - 1 {
            return Err(ChainError::BufferLength {
                expected: count - 1,
                actual: cumulatives.len(),
            });
        }
        if let Some(position) = indices.windows(2).position(|w| w[0] >= w[1]) {
            return Err(ChainError::NotAscending {
                position: position + 1,
            });
        }

        for (edge, &index) in edges.iter_mut().zip(indices) {
            *edge = self.inner.read_block(index)?;
        }

        let accumulator = self.inner.strategy();
        for (k, cumulative) in cumulatives.iter_mut().enumerate() {
            *cumulative = accumulator.combine(&edges[k], &edges[k + 1]);
        }

        Ok(())
    }

    /// Allocating form of [`cumulatives`](Self::cumulatives).
    pub fn windows(&self, indices: &[u64]) -> Result<Vec<C::Block>> {
        let mut edges = vec![C::Block::default(); indices.len()];
        let mut cumulatives = vec![C::Block::default(); indices.len().saturating_sub(1)];
        self.cumulatives(indices, &mut edges, &mut cumulatives)?;
        Ok(cumulatives)
    }

    /// Cumulative over the data run `[start, start + count)`.
    ///
    /// A window starting at 0 is the edge at its last index; any other is the
    /// combine of the edge just before it with the edge at its last index.
    pub fn accumulate(&self, start: u64, count: u64) -> Result<C::Block> {
        if count == 0 {
            return Err(ChainError::EmptyRead);
        }
        let last = start.checked_add(count - 1).ok_or(ChainError::ReadGap {
            index: start,
            count,
            length: self.len(),
        })?;

        let tail = self.inner.read_block(last)?;
        if start == 0 {
            return Ok(tail);
        }
        let head = self.inner.read_block(start - 1)?;
        Ok(self.inner.strategy().combine(&head, &tail))
    }

    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }
}
