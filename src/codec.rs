//! Block codec contracts.
//!
//! Chains never interpret block bytes themselves: the caller supplies a codec
//! that knows each block's marshaled size and how to move it through a
//! [`ByteWriter`] / [`ByteReader`]. A codec must consume exactly the bytes it
//! declares, otherwise the chain reports
//! [`ChainError::InconsistentBlockBytes`](crate::ChainError::InconsistentBlockBytes).

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::Result;

/// Codec for blocks with a constant marshaled size.
pub trait FixedCodec: Send + Sync {
    type Block;

    /// Marshaled size of every block, in bytes.
    fn block_size(&self) -> usize;

    fn marshal(&self, block: &Self::Block, writer: &mut ByteWriter<'_>) -> Result<()>;

    fn unmarshal(&self, reader: &mut ByteReader<'_>) -> Result<Self::Block>;
}

/// Codec for blocks whose marshaled size depends on the value.
pub trait VariableCodec: Send + Sync {
    type Block;

    /// Marshaled size of this block, in bytes.
    fn size(&self, block: &Self::Block) -> usize;

    fn marshal(&self, block: &Self::Block, writer: &mut ByteWriter<'_>) -> Result<()>;

    /// Decode one block. The reader is bounded to exactly this block's bytes.
    fn unmarshal(&self, reader: &mut ByteReader<'_>) -> Result<Self::Block>;
}

/// 8-byte big-endian unsigned integers.
#[derive(Clone, Copy, Debug, Default)]
pub struct U64Codec;

impl FixedCodec for U64Codec {
    type Block = u64;

    fn block_size(&self) -> usize {
        8
    }

    fn marshal(&self, block: &u64, writer: &mut ByteWriter<'_>) -> Result<()> {
        writer.write_u64(*block)
    }

    fn unmarshal(&self, reader: &mut ByteReader<'_>) -> Result<u64> {
        reader.read_u64()
    }
}

/// Blocks that are their own raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl VariableCodec for BytesCodec {
    type Block = Vec<u8>;

    fn size(&self, block: &Vec<u8>) -> usize {
        block.len()
    }

    fn marshal(&self, block: &Vec<u8>, writer: &mut ByteWriter<'_>) -> Result<()> {
        writer.write_bytes(block)
    }

    fn unmarshal(&self, reader: &mut ByteReader<'_>) -> Result<Vec<u8>> {
        let len = reader.remaining();
        Ok(reader.read_bytes(len)?.to_vec())
    }
}
