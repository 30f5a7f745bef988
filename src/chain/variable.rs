//! Chain of variable-size blocks.
//!
//! A variable chain lives in a directory holding two files:
//! - `data.bin`: the marshaled blocks back to back, no separators.
//! - `offset.bin`: a [`FixedChain`] of 8-byte big-endian cumulative end
//!   offsets, one per block. Block `i` spans `[offset[i-1] or 0, offset[i])`.
//!
//! A write lands the payload first and extends the offset index second. If
//! the process dies in between, `data.bin` holds bytes no offset points at;
//! [`RecoveryMode`] decides what happens to them at the next open.

use super::io::{open_file, read_exact_at, write_all_at};
use super::{check_read, Chain, FixedChain};
use crate::codec::{U64Codec, VariableCodec};
use crate::config::{ChainConfig, Durability, RecoveryMode};
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{ChainError, Result};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File holding the cumulative end offsets.
pub const OFFSET_FILE: &str = "offset.bin";

/// File holding the concatenated payload.
pub const DATA_FILE: &str = "data.bin";

/// Append-only chain of variable-size blocks.
///
/// Reads and writes both go through one mutex: a read looks up offsets and
/// then the payload, and must not interleave with an append that has written
/// payload but not yet its offsets.
pub struct VariableChain<C: VariableCodec> {
    /// Block codec.
    codec: C,

    /// Chain directory.
    dir: PathBuf,

    /// Payload file; `None` once closed. The mutex guards every operation.
    data: Mutex<Option<File>>,

    /// Cumulative end offsets.
    offsets: FixedChain<U64Codec>,

    config: ChainConfig,
}

impl<C: VariableCodec> VariableChain<C> {
    /// Open or create a variable chain with the default configuration.
    pub fn open(codec: C, dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(codec, dir, ChainConfig::default())
    }

    /// Open or create a variable chain in `dir`.
    pub fn open_with_config(codec: C, dir: impl AsRef<Path>, config: ChainConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let offsets = FixedChain::open_with_config(U64Codec, dir.join(OFFSET_FILE), config.clone())?;
        let data = match open_file(&dir.join(DATA_FILE), &config) {
            Ok(file) => file,
            Err(e) => {
                offsets.close()?;
                return Err(e);
            }
        };

        let chain = Self {
            codec,
            dir,
            data: Mutex::new(None),
            offsets,
            config,
        };
        chain.recover(&data)?;
        *chain.data.lock() = Some(data);

        debug!(dir = %chain.dir.display(), length = chain.len(), "opened variable chain");
        Ok(chain)
    }

    /// Reconcile the payload file with the offset index.
    fn recover(&self, data: &File) -> Result<()> {
        let mut indexed = self.end_offset()?;
        let actual = data.metadata()?.len();

        if actual < indexed {
            if self.config.recovery != RecoveryMode::Rollback {
                return Err(ChainError::TruncatedPayload { indexed, actual });
            }

            let length = self.offsets.len();
            let kept = self.blocks_within(actual)?;
            warn!(
                dir = %self.dir.display(),
                indexed,
                actual,
                dropped = length - kept,
                "rolling back offsets past the payload"
            );
            self.offsets.truncate(kept)?;
            indexed = self.end_offset()?;
        }

        if actual > indexed {
            match self.config.recovery {
                RecoveryMode::Truncate | RecoveryMode::Rollback => {
                    warn!(
                        dir = %self.dir.display(),
                        indexed,
                        actual,
                        "discarding unindexed payload tail"
                    );
                    data.set_len(indexed)?;
                    if self.config.durability == Durability::Synced {
                        data.sync_all()?;
                    }
                }
                RecoveryMode::Ignore => {
                    debug!(
                        dir = %self.dir.display(),
                        unindexed = actual - indexed,
                        "leaving unindexed payload tail"
                    );
                }
            }
        }

        Ok(())
    }

    /// Chain directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of leading blocks whose end offset lies within `size` bytes.
    /// Offsets never decrease, so a binary search suffices.
    fn blocks_within(&self, size: u64) -> Result<u64> {
        let (mut lo, mut hi) = (0u64, self.offsets.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.offsets.read_block(mid)? <= size {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Logical payload size: the end offset of the last block.
    pub fn data_size(&self) -> Result<u64> {
        let data = self.data.lock();
        data.as_ref().ok_or(ChainError::Closed)?;
        self.end_offset()
    }

    /// Force payload and offsets to disk.
    pub fn sync(&self) -> Result<()> {
        let data = self.data.lock();
        data.as_ref().ok_or(ChainError::Closed)?.sync_all()?;
        self.offsets.sync()
    }

    fn end_offset(&self) -> Result<u64> {
        match self.offsets.len() {
            0 => Ok(0),
            length => self.offsets.read_block(length - 1),
        }
    }

    /// Byte offset at which block `index` starts.
    fn start_offset(&self, index: u64) -> Result<u64> {
        if index == 0 {
            Ok(0)
        } else {
            self.offsets.read_block(index - 1)
        }
    }

    fn marshal_run(&self, blocks: &[C::Block], start: u64) -> Result<(Vec<u8>, Vec<u64>)> {
        let mut ends = Vec::with_capacity(blocks.len());
        let mut total = 0usize;
        for block in blocks {
            total += self.codec.size(block);
            ends.push(start + total as u64);
        }

        let mut bytes = vec![0u8; total];
        let mut pos = 0usize;
        for block in blocks {
            let size = self.codec.size(block);
            let mut writer = ByteWriter::new(&mut bytes[pos..pos + size]);
            self.codec.marshal(block, &mut writer)?;
            if writer.remaining() != 0 {
                return Err(ChainError::InconsistentBlockBytes {
                    expected: size,
                    actual: writer.position(),
                });
            }
            pos += size;
        }

        Ok((bytes, ends))
    }

    /// Decode `count` blocks starting at `index`. Caller holds the lock.
    fn read_run(&self, file: &File, index: u64, count: u64) -> Result<Vec<C::Block>> {
        if count == 0 {
            return Err(ChainError::EmptyRead);
        }
        check_read(index, count, self.offsets.len())?;

        let start = self.start_offset(index)?;
        let ends = self.offsets.read_vec(index, count as usize)?;
        let end = ends[ends.len() - 1];
        if end < start {
            return Err(ChainError::InconsistentOffsets { start, end });
        }

        let mut bytes = vec![0u8; (end - start) as usize];
        if !bytes.is_empty() {
            read_exact_at(file, &mut bytes, start)?;
        }

        let mut blocks = Vec::with_capacity(ends.len());
        let mut prev = start;
        for &block_end in &ends {
            if block_end < prev {
                return Err(ChainError::InconsistentOffsets {
                    start: prev,
                    end: block_end,
                });
            }
            let chunk = &bytes[(prev - start) as usize..(block_end - start) as usize];
            let mut reader = ByteReader::new(chunk);
            let block = self.codec.unmarshal(&mut reader)?;
            if reader.remaining() != 0 {
                return Err(ChainError::InconsistentBlockBytes {
                    expected: chunk.len(),
                    actual: reader.position(),
                });
            }
            blocks.push(block);
            prev = block_end;
        }

        Ok(blocks)
    }
}

impl<C: VariableCodec> Chain for VariableChain<C> {
    type Block = C::Block;

    fn close(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.take().is_some() {
            debug!(dir = %self.dir.display(), "closed variable chain");
        }
        self.offsets.close()
    }

    fn len(&self) -> u64 {
        self.offsets.len()
    }

    fn write(&self, index: u64, blocks: &[C::Block]) -> Result<()> {
        let data = self.data.lock();
        let file = data.as_ref().ok_or(ChainError::Closed)?;

        let length = self.offsets.len();
        if index > length {
            return Err(ChainError::WriteGap { index, length });
        }
        if blocks.is_empty() {
            return Ok(());
        }

        let start = self.start_offset(index)?;
        let (bytes, ends) = self.marshal_run(blocks, start)?;
        let end = ends[ends.len() - 1];

        // An overwrite that stops short of the tail must leave every later
        // block where it was.
        let run_end = index + blocks.len() as u64;
        if run_end < length {
            let existing = self.offsets.read_block(run_end - 1)?;
            if existing != end {
                return Err(ChainError::InconsistentOffsets {
                    start: end,
                    end: existing,
                });
            }
        }

        write_all_at(file, &bytes, start)?;
        if self.config.durability == Durability::Synced {
            file.sync_data()?;
        }

        self.offsets.write(index, &ends)
    }

    fn read(&self, index: u64, blocks: &mut [C::Block]) -> Result<()> {
        let data = self.data.lock();
        let file = data.as_ref().ok_or(ChainError::Closed)?;

        let decoded = self.read_run(file, index, blocks.len() as u64)?;
        for (slot, block) in blocks.iter_mut().zip(decoded) {
            *slot = block;
        }
        Ok(())
    }

    fn read_block(&self, index: u64) -> Result<C::Block> {
        let data = self.data.lock();
        let file = data.as_ref().ok_or(ChainError::Closed)?;

        let mut decoded = self.read_run(file, index, 1)?;
        decoded.pop().ok_or(ChainError::EmptyRead)
    }
}
