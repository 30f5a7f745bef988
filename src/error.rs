//! Error types for chain operations.

use thiserror::Error;

/// Main error type for chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Writing with gap: index {index} beyond length {length}")]
    WriteGap { index: u64, length: u64 },

    #[error("Reading with gap: {count} blocks at index {index} exceed length {length}")]
    ReadGap { index: u64, count: u64, length: u64 },

    #[error("Inconsistent chain lengths: derived {derived}, source {source_len}")]
    InconsistentLengths { derived: u64, source_len: u64 },

    #[error("Inconsistent offsets: start {start}, end {end}")]
    InconsistentOffsets { start: u64, end: u64 },

    #[error("Truncated payload: offsets index {indexed} bytes, file holds {actual}")]
    TruncatedPayload { indexed: u64, actual: u64 },

    #[error("Inconsistent block bytes: expected {expected}, got {actual}")]
    InconsistentBlockBytes { expected: usize, actual: usize },

    #[error("Codec declares a zero block size")]
    ZeroBlockSize,

    #[error("Read of zero blocks")]
    EmptyRead,

    #[error("Too few indices: {0} (at least 2 required)")]
    TooFewIndices(usize),

    #[error("Buffer length mismatch: expected {expected}, got {actual}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Indices not strictly ascending at position {position}")]
    NotAscending { position: usize },

    #[error("Invalid aggregation level: {level} (chain has {levels})")]
    InvalidLevel { level: usize, levels: usize },

    #[error("Chain is closed")]
    Closed,

    #[error("Chain file is locked by another instance")]
    Locked,
}

impl ChainError {
    /// Whether the error is a gap on either side of a chain's valid range.
    pub fn is_gap(&self) -> bool {
        matches!(self, ChainError::WriteGap { .. } | ChainError::ReadGap { .. })
    }
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
