//! An in-memory [`ChunkStore`].

use crate::codec::Codec;
use crate::error::StoreError;

use super::ChunkStore;

/// An in-memory chunk store: chunks live in a `Vec<Vec<u8>>` of codec-compressed bytes.
///
/// Used for ephemeral arrays and as the store of choice in tests; [`file::FileChunkStore`](super::file::FileChunkStore)
/// is the persistent sibling.
#[derive(Debug, Clone)]
pub struct MemoryChunkStore {
    codec: Codec,
    chunk_bytes: usize,
    chunks: Vec<Vec<u8>>,
    metadata: Vec<u8>,
}

impl MemoryChunkStore {
    /// Open an empty store with a fixed decoded chunk byte size and codec.
    #[must_use]
    pub fn create(chunk_bytes: usize, codec: Codec) -> Self {
        log::debug!("MemoryChunkStore::create chunk_bytes={chunk_bytes} codec={codec:?}");
        Self {
            codec,
            chunk_bytes,
            chunks: Vec::new(),
            metadata: Vec::new(),
        }
    }
}

impl ChunkStore for MemoryChunkStore {
    fn append(&mut self, buf: &[u8]) -> Result<u64, StoreError> {
        debug_assert_eq!(buf.len(), self.chunk_bytes);
        let encoded = self.codec.encode(buf)?;
        self.chunks.push(encoded);
        Ok(self.chunks.len() as u64)
    }

    fn replace_chunk(&mut self, index: u64, buf: &[u8]) -> Result<(), StoreError> {
        debug_assert_eq!(buf.len(), self.chunk_bytes);
        let slot = self
            .chunks
            .get_mut(index as usize)
            .ok_or(StoreError::IndexOutOfRange {
                index,
                count: self.chunks.len() as u64,
            })?;
        *slot = self.codec.encode(buf)?;
        Ok(())
    }

    fn decompress_chunk(&self, index: u64, dst: &mut [u8]) -> Result<(), StoreError> {
        if dst.len() < self.chunk_bytes {
            return Err(StoreError::DestinationTooSmall {
                dst_bytes: dst.len(),
                chunk_bytes: self.chunk_bytes,
            });
        }
        let encoded = self
            .chunks
            .get(index as usize)
            .ok_or(StoreError::IndexOutOfRange {
                index,
                count: self.chunks.len() as u64,
            })?;
        let decoded = self.codec.decode(encoded)?;
        dst[..self.chunk_bytes].copy_from_slice(&decoded);
        Ok(())
    }

    fn chunk_count(&self) -> u64 {
        self.chunks.len() as u64
    }

    fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    fn set_metadata(&mut self, metadata: Vec<u8>) {
        self.metadata = metadata;
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
