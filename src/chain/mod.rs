//! Append-only block chains.
//!
//! A chain is an ordered, randomly readable sequence of blocks persisted to
//! one or more files. Blocks are appended (or overwritten) in contiguous runs
//! and read back by index; neither side may reach past the current length.

mod fixed;
mod io;
mod variable;

pub use fixed::FixedChain;
pub use variable::VariableChain;

use crate::error::Result;

/// Append-only, randomly readable sequence of blocks.
pub trait Chain: Send + Sync {
    type Block;

    /// Release the chain's file handles. Idempotent; data stays on disk.
    fn close(&self) -> Result<()>;

    /// Number of populated indices.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a contiguous run starting at `index`.
    ///
    /// `index` may not exceed the current length. The length grows only if
    /// the run reaches past it.
    fn write(&self, index: u64, blocks: &[Self::Block]) -> Result<()>;

    /// Fill `blocks` from the run starting at `index`. The whole run must lie
    /// below the current length.
    fn read(&self, index: u64, blocks: &mut [Self::Block]) -> Result<()>;

    /// Read a single block.
    fn read_block(&self, index: u64) -> Result<Self::Block>;

    /// Read `count` blocks into a new vector.
    fn read_vec(&self, index: u64, count: usize) -> Result<Vec<Self::Block>>
    where
        Self::Block: Default + Clone,
    {
        let mut blocks = vec![Self::Block::default(); count];
        self.read(index, &mut blocks)?;
        Ok(blocks)
    }
}

/// Reject a read of `count` blocks at `index` that reaches past `length`.
pub(crate) fn check_read(index: u64, count: u64, length: u64) -> Result<u64> {
    match index.checked_add(count) {
        Some(end) if end <= length => Ok(end),
        _ => Err(crate::ChainError::ReadGap {
            index,
            count,
            length,
        }),
    }
}
