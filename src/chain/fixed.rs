//! Chain of fixed-size blocks in a single flat file.
//!
//! Block `i` occupies bytes `[i * block_size, (i + 1) * block_size)`. There is
//! no header: the length is the file size divided by the block size, computed
//! once at open and cached afterwards.

use super::io::{open_file, read_exact_at, write_all_at};
use super::{check_read, Chain};
use crate::codec::FixedCodec;
use crate::config::{ChainConfig, Durability};
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{ChainError, Result};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Append-only chain of fixed-size blocks.
///
/// Writers are serialized by an internal mutex. Readers do not take it: they
/// check their range against the cached length, which only moves after a
/// write has landed, so a reader never sees a half-written tail.
pub struct FixedChain<C: FixedCodec> {
    /// Block codec.
    codec: C,

    /// Path to the backing file.
    path: PathBuf,

    /// Backing file; `None` once closed.
    file: RwLock<Option<File>>,

    /// Serializes writers.
    write_lock: Mutex<()>,

    /// Cached block count. Process-local, recomputed on every open.
    length: AtomicU64,

    config: ChainConfig,
}

impl<C: FixedCodec> FixedChain<C> {
    /// Open or create a fixed chain with the default configuration.
    pub fn open(codec: C, path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(codec, path, ChainConfig::default())
    }

    /// Open or create a fixed chain.
    pub fn open_with_config(codec: C, path: impl AsRef<Path>, config: ChainConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let block_size = codec.block_size() as u64;
        if block_size == 0 {
            return Err(ChainError::ZeroBlockSize);
        }

        let file = open_file(&path, &config)?;
        let file_size = file.metadata()?.len();
        let length = file_size / block_size;

        if file_size % block_size != 0 {
            debug!(
                path = %path.display(),
                trailing = file_size % block_size,
                "ignoring partial trailing block"
            );
        }
        debug!(path = %path.display(), length, "opened fixed chain");

        Ok(Self {
            codec,
            path,
            file: RwLock::new(Some(file)),
            write_lock: Mutex::new(()),
            length: AtomicU64::new(length),
            config,
        })
    }

    /// Marshaled size of each block.
    pub fn block_size(&self) -> usize {
        self.codec.block_size()
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Force written blocks to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.read();
        file.as_ref().ok_or(ChainError::Closed)?.sync_all()?;
        Ok(())
    }

    /// Drop every block from `length` on. Used by open-time recovery only.
    pub(crate) fn truncate(&self, length: u64) -> Result<()> {
        let _lock = self.write_lock.lock();
        if length >= self.len() {
            return Ok(());
        }

        let file = self.file.read();
        let file = file.as_ref().ok_or(ChainError::Closed)?;
        file.set_len(length * self.codec.block_size() as u64)?;
        if self.config.durability == Durability::Synced {
            file.sync_all()?;
        }

        self.length.store(length, Ordering::Release);
        debug!(path = %self.path.display(), length, "truncated fixed chain");
        Ok(())
    }

    fn marshal_run(&self, blocks: &[C::Block]) -> Result<Vec<u8>> {
        let block_size = self.codec.block_size();
        let mut bytes = vec![0u8; block_size * blocks.len()];
        for (block, chunk) in blocks.iter().zip(bytes.chunks_exact_mut(block_size)) {
            let mut writer = ByteWriter::new(chunk);
            self.codec.marshal(block, &mut writer)?;
            if writer.remaining() != 0 {
                return Err(ChainError::InconsistentBlockBytes {
                    expected: block_size,
                    actual: writer.position(),
                });
            }
        }
        Ok(bytes)
    }

    fn unmarshal_one(&self, chunk: &[u8]) -> Result<C::Block> {
        let mut reader = ByteReader::new(chunk);
        let block = self.codec.unmarshal(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(ChainError::InconsistentBlockBytes {
                expected: chunk.len(),
                actual: reader.position(),
            });
        }
        Ok(block)
    }

    fn read_bytes(&self, index: u64, count: u64) -> Result<Vec<u8>> {
        check_read(index, count, self.len())?;

        let block_size = self.codec.block_size();
        let mut bytes = vec![0u8; block_size * count as usize];
        if count > 0 {
            let file = self.file.read();
            let file = file.as_ref().ok_or(ChainError::Closed)?;
            read_exact_at(file, &mut bytes, index * block_size as u64)?;
        }
        Ok(bytes)
    }
}

impl<C: FixedCodec> Chain for FixedChain<C> {
    type Block = C::Block;

    fn close(&self) -> Result<()> {
        let _lock = self.write_lock.lock();
        if self.file.write().take().is_some() {
            debug!(path = %self.path.display(), "closed fixed chain");
        }
        Ok(())
    }

    fn len(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    fn write(&self, index: u64, blocks: &[C::Block]) -> Result<()> {
        let _lock = self.write_lock.lock();

        let length = self.len();
        if index > length {
            return Err(ChainError::WriteGap { index, length });
        }

        let bytes = self.marshal_run(blocks)?;

        let file = self.file.read();
        let file = file.as_ref().ok_or(ChainError::Closed)?;
        if blocks.is_empty() {
            return Ok(());
        }

        write_all_at(file, &bytes, index * self.codec.block_size() as u64)?;
        if self.config.durability == Durability::Synced {
            file.sync_data()?;
        }

        let end = index + blocks.len() as u64;
        if end > length {
            self.length.store(end, Ordering::Release);
        }

        Ok(())
    }

    fn read(&self, index: u64, blocks: &mut [C::Block]) -> Result<()> {
        let bytes = self.read_bytes(index, blocks.len() as u64)?;
        let block_size = self.codec.block_size();
        for (slot, chunk) in blocks.iter_mut().zip(bytes.chunks_exact(block_size)) {
            *slot = self.unmarshal_one(chunk)?;
        }
        Ok(())
    }

    fn read_block(&self, index: u64) -> Result<C::Block> {
        let bytes = self.read_bytes(index, 1)?;
        self.unmarshal_one(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::U64Codec;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// A codec that claims 8 bytes but only marshals 4.
    struct ShortCodec;

    impl FixedCodec for ShortCodec {
        type Block = u32;

        fn block_size(&self) -> usize {
            8
        }

        fn marshal(&self, block: &u32, writer: &mut ByteWriter<'_>) -> Result<()> {
            writer.write_u32(*block)
        }

        fn unmarshal(&self, reader: &mut ByteReader<'_>) -> Result<u32> {
            reader.read_u32()
        }
    }

    /// A codec with nothing to store.
    struct EmptyCodec;

    impl FixedCodec for EmptyCodec {
        type Block = ();

        fn block_size(&self) -> usize {
            0
        }

        fn marshal(&self, _block: &(), _writer: &mut ByteWriter<'_>) -> Result<()> {
            Ok(())
        }

        fn unmarshal(&self, _reader: &mut ByteReader<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let chain = FixedChain::open(U64Codec, dir.path().join("chain.bin")).unwrap();
        assert!(chain.is_empty());

        let blocks: Vec<u64> = (0..100).map(|i| i * 3).collect();
        chain.write(0, &blocks).unwrap();
        assert_eq!(chain.len(), 100);

        let mut read = vec![0u64; 100];
        chain.read(0, &mut read).unwrap();
        assert_eq!(read, blocks);
        assert_eq!(chain.read_block(42).unwrap(), 126);
        assert_eq!(chain.read_vec(98, 2).unwrap(), vec![294, 297]);
    }

    #[test]
    fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.bin");
        let chain = FixedChain::open(U64Codec, &path).unwrap();
        chain.write(0, &[1, 0x0203]).unwrap();
        chain.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 2, 3]);
    }

    #[test]
    fn test_gaps() {
        let dir = TempDir::new().unwrap();
        let chain = FixedChain::open(U64Codec, dir.path().join("chain.bin")).unwrap();
        chain.write(0, &[1, 2, 3]).unwrap();

        let err = chain.write(4, &[9]).unwrap_err();
        assert!(matches!(err, ChainError::WriteGap { index: 4, length: 3 }));

        let mut buf = [0u64; 2];
        let err = chain.read(2, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            ChainError::ReadGap { index: 2, count: 2, length: 3 }
        ));
        assert!(chain.read_block(3).unwrap_err().is_gap());
        assert!(chain.read(u64::MAX, &mut buf).unwrap_err().is_gap());

        // Appending exactly at the tail is fine.
        chain.write(3, &[4]).unwrap();
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn test_overwrite_keeps_length() {
        let dir = TempDir::new().unwrap();
        let chain = FixedChain::open(U64Codec, dir.path().join("chain.bin")).unwrap();
        chain.write(0, &[1, 2, 3, 4]).unwrap();
        chain.write(1, &[20, 30]).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.read_vec(0, 4).unwrap(), vec![1, 20, 30, 4]);

        // Overwrite that runs past the tail extends it.
        chain.write(3, &[40, 50]).unwrap();
        assert_eq!(chain.len(), 5);
    }

    #[test]
    fn test_length_recomputed_on_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.bin");
        {
            let chain = FixedChain::open(U64Codec, &path).unwrap();
            chain.write(0, &[7; 10]).unwrap();
        }

        // A torn trailing block is not counted.
        let file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.set_len(10 * 8 + 3).unwrap();
        drop(file);

        let chain = FixedChain::open(U64Codec, &path).unwrap();
        assert_eq!(chain.len(), 10);
        chain.write(10, &[8]).unwrap();
        assert_eq!(chain.read_block(10).unwrap(), 8);
    }

    #[test]
    fn test_inconsistent_block_bytes() {
        let dir = TempDir::new().unwrap();
        let chain = FixedChain::open(ShortCodec, dir.path().join("chain.bin")).unwrap();
        let err = chain.write(0, &[1]).unwrap_err();
        assert!(matches!(
            err,
            ChainError::InconsistentBlockBytes { expected: 8, actual: 4 }
        ));
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.bin");
        let result = FixedChain::open(EmptyCodec, &path);
        assert!(matches!(result, Err(ChainError::ZeroBlockSize)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let chain = FixedChain::open(U64Codec, dir.path().join("chain.bin")).unwrap();
        chain.write(0, &[1]).unwrap();
        chain.close().unwrap();
        chain.close().unwrap();

        assert!(matches!(chain.read_block(0), Err(ChainError::Closed)));
        assert!(matches!(chain.write(1, &[2]), Err(ChainError::Closed)));
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.bin");
        let config = ChainConfig {
            exclusive: true,
            ..Default::default()
        };
        let first = FixedChain::open_with_config(U64Codec, &path, config.clone()).unwrap();
        let second = FixedChain::open_with_config(U64Codec, &path, config.clone());
        assert!(matches!(second, Err(ChainError::Locked)));

        first.close().unwrap();
        FixedChain::open_with_config(U64Codec, &path, config).unwrap();
    }

    #[test]
    fn test_concurrent_reader_and_writer() {
        let dir = TempDir::new().unwrap();
        let chain = Arc::new(FixedChain::open(U64Codec, dir.path().join("chain.bin")).unwrap());
        let base: Vec<u64> = (0..1000).collect();
        chain.write(0, &base).unwrap();

        std::thread::scope(|s| {
            let writer = Arc::clone(&chain);
            s.spawn(move || {
                for i in 0..200u64 {
                    let run: Vec<u64> = (0..50).map(|j| 1000 + i * 50 + j).collect();
                    writer.write(writer.len(), &run).unwrap();
                }
            });

            for _ in 0..200 {
                let mut buf = vec![0u64; 1000];
                chain.read(0, &mut buf).unwrap();
                assert_eq!(buf, base);

                // Whatever length is visible is fully readable.
                let visible = chain.len();
                let tail = chain.read_block(visible - 1).unwrap();
                assert_eq!(tail, visible - 1);
            }
        });

        assert_eq!(chain.len(), 11_000);
    }
}
