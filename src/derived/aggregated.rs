//! Multi-level group aggregates over a data chain.
//!
//! Level 0 summarizes each aligned group of 128 data blocks; level `L > 0`
//! summarizes each aligned group of 128 level `L-1` aggregates. Level `L`
//! block `p` therefore covers data `[p * 128^(L+1), (p + 1) * 128^(L+1))`,
//! and an aligned span that size is answered by a single read.
//!
//! Each level is a fixed chain named after its span: `128.bin`, `16384.bin`,
//! `2097152.bin`, ... A level only grows by full groups; a partial trailing
//! group waits until it fills up.

use super::strategy::Aggregator;
use super::MAX_BATCH_SIZE;
use crate::chain::{Chain, FixedChain};
use crate::codec::FixedCodec;
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Bits per aggregation level.
pub const GROUP_BITS: u32 = 7;

/// Elements folded into one aggregate.
pub const GROUP_SIZE: usize = 1 << GROUP_BITS;

/// Deepest supported tower; the span of the next level would overflow `u64`.
pub const MAX_LEVELS: usize = 9;

/// Tower of aggregate chains over a data chain.
pub struct AggregatedChain<D, C, G>
where
    D: Chain,
    C: FixedCodec,
{
    /// Source chain; owned by the caller.
    data: Arc<D>,

    /// Aggregation strategy.
    aggregator: G,

    /// One chain per level, bottom first.
    levels: Vec<FixedChain<C>>,

    /// Directory holding the level files.
    dir: PathBuf,

    /// Serializes synchronization.
    sync_lock: Mutex<()>,

    /// Groups aggregated per batch.
    batch_groups: usize,
}

impl<D, C, G> AggregatedChain<D, C, G>
where
    D: Chain,
    D::Block: Default + Clone,
    C: FixedCodec + Clone,
    C::Block: Default + Clone,
    G: Aggregator<D::Block, C::Block>,
{
    /// Open or create a tower of `levels` levels in `dir`.
    pub fn open(
        data: Arc<D>,
        codec: C,
        aggregator: G,
        levels: usize,
        dir: impl AsRef<Path>,
    ) -> Result<Self> {
        Self::open_with_config(data, codec, aggregator, levels, dir, ChainConfig::default())
    }

    pub fn open_with_config(
        data: Arc<D>,
        codec: C,
        aggregator: G,
        levels: usize,
        dir: impl AsRef<Path>,
        config: ChainConfig,
    ) -> Result<Self> {
        if levels > MAX_LEVELS {
            return Err(ChainError::InvalidLevel {
                level: levels - 1,
                levels: MAX_LEVELS,
            });
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut chains: Vec<FixedChain<C>> = Vec::with_capacity(levels);
        for level in 0..levels {
            let path = dir.join(format!("{}.bin", span(level)));
            match FixedChain::open_with_config(codec.clone(), path, config.clone()) {
                Ok(chain) => chains.push(chain),
                Err(e) => {
                    for chain in &chains {
                        chain.close()?;
                    }
                    return Err(e);
                }
            }
        }

        debug!(dir = %dir.display(), levels, "opened aggregated chain");
        Ok(Self {
            data,
            aggregator,
            levels: chains,
            dir,
            sync_lock: Mutex::new(()),
            batch_groups: MAX_BATCH_SIZE / GROUP_SIZE,
        })
    }

    /// Cap the number of source elements read per batch. Rounded down to
    /// whole groups, never below one group.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_groups = (batch_size.min(MAX_BATCH_SIZE) / GROUP_SIZE).max(1);
        self
    }

    /// The data chain.
    pub fn source(&self) -> &Arc<D> {
        &self.data
    }

    /// Directory holding the level files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of levels in the tower.
    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    /// Data elements covered by one aggregate at `level`.
    pub fn span(&self, level: usize) -> u64 {
        span(level)
    }

    fn level(&self, level: usize) -> Result<&FixedChain<C>> {
        self.levels.get(level).ok_or(ChainError::InvalidLevel {
            level,
            levels: self.levels.len(),
        })
    }

    /// Number of aggregates at `level`.
    pub fn level_len(&self, level: usize) -> Result<u64> {
        Ok(self.level(level)?.len())
    }

    /// Aggregate `index` at `level`.
    pub fn read(&self, level: usize, index: u64) -> Result<C::Block> {
        self.level(level)?.read_block(index)
    }

    /// A run of aggregates at `level`.
    pub fn read_range(&self, level: usize, index: u64, results: &mut [C::Block]) -> Result<()> {
        self.level(level)?.read(index, results)
    }

    /// Bring every level up to date, bottom first. Returns the level lengths.
    pub fn sync(&self) -> Result<Vec<u64>> {
        let _lock = self.sync_lock.lock();

        let mut below = self.data.len();
        let mut lengths = Vec::with_capacity(self.levels.len());
        for (level, chain) in self.levels.iter().enumerate() {
            let available = below >> GROUP_BITS;
            let length = chain.len();
            if length > available {
                return Err(ChainError::InconsistentLengths {
                    derived: length,
                    source_len: available,
                });
            }

            if level == 0 {
                self.sync_level(chain, length, available, |index, buf: &mut [D::Block]| {
                    self.data.read(index, buf)?;
                    Ok(buf
                        .chunks_exact(GROUP_SIZE)
                        .map(|group| self.aggregator.aggregate(group))
                        .collect())
                })?;
            } else {
                let lower = &self.levels[level - 1];
                self.sync_level(chain, length, available, |index, buf: &mut [C::Block]| {
                    lower.read(index, buf)?;
                    Ok(buf
                        .chunks_exact(GROUP_SIZE)
                        .map(|group| self.aggregator.merge(group))
                        .collect())
                })?;
            }

            if available > length {
                debug!(level, from = length, to = available, "synchronized aggregate level");
            }
            lengths.push(available);
            below = available;
        }

        Ok(lengths)
    }

    /// Extend `chain` from `length` to `available` groups, reading the level
    /// beneath through `fold_groups` one batch of whole groups at a time.
    fn sync_level<B, F>(
        &self,
        chain: &FixedChain<C>,
        length: u64,
        available: u64,
        mut fold_groups: F,
    ) -> Result<()>
    where
        B: Default + Clone,
        F: FnMut(u64, &mut [B]) -> Result<Vec<C::Block>>,
    {
        if available <= length {
            return Ok(());
        }

        let buf_groups = (available - length).min(self.batch_groups as u64) as usize;
        let mut buf = vec![B::default(); buf_groups * GROUP_SIZE];

        let mut position = length;
        while position < available {
            let groups = (available - position).min(buf_groups as u64) as usize;
            let aggregates =
                fold_groups(position << GROUP_BITS, &mut buf[..groups * GROUP_SIZE])?;
            chain.write(position, &aggregates)?;
            trace!(position, groups, "aggregated batch");
            position += groups as u64;
        }

        Ok(())
    }

    /// Close every level. The data chain is left open.
    pub fn close(&self) -> Result<()> {
        for chain in &self.levels {
            chain.close()?;
        }
        Ok(())
    }
}

/// Data elements covered by one aggregate at `level`: `128^(level + 1)`.
fn span(level: usize) -> u64 {
    1u64 << (GROUP_BITS as usize * (level + 1))
}
