//! The degenerate "plain buffer" backend: a single uncompressed chunk equal to the whole array.

use crate::error::StoreError;

use super::ChunkStore;

/// A store with exactly one chunk, used when `chunk_shape == shape` (the plain-buffer case).
///
/// There is no codec and no padding bookkeeping beyond what `Array` itself already does; this
/// type exists purely so that the degenerate case is just another [`ChunkStore`] implementor
/// rather than a special case threaded through `Array`.
#[derive(Debug, Clone)]
pub struct PlainBufferStore {
    chunk_bytes: usize,
    chunk: Option<Vec<u8>>,
    metadata: Vec<u8>,
}

impl PlainBufferStore {
    /// Open an empty store for a single chunk of `chunk_bytes` decoded bytes.
    #[must_use]
    pub fn create(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes,
            chunk: None,
            metadata: Vec::new(),
        }
    }
}

impl ChunkStore for PlainBufferStore {
    fn append(&mut self, buf: &[u8]) -> Result<u64, StoreError> {
        debug_assert_eq!(buf.len(), self.chunk_bytes);
        if self.chunk.is_some() {
            return Err(StoreError::Codec(
                "a plain buffer store holds exactly one chunk".to_string(),
            ));
        }
        self.chunk = Some(buf.to_vec());
        Ok(1)
    }

    fn replace_chunk(&mut self, index: u64, buf: &[u8]) -> Result<(), StoreError> {
        debug_assert_eq!(buf.len(), self.chunk_bytes);
        if index != 0 || self.chunk.is_none() {
            return Err(StoreError::IndexOutOfRange { index, count: self.chunk_count() });
        }
        self.chunk = Some(buf.to_vec());
        Ok(())
    }

    fn decompress_chunk(&self, index: u64, dst: &mut [u8]) -> Result<(), StoreError> {
        if dst.len() < self.chunk_bytes {
            return Err(StoreError::DestinationTooSmall {
                dst_bytes: dst.len(),
                chunk_bytes: self.chunk_bytes,
            });
        }
        let chunk = self
            .chunk
            .as_ref()
            .filter(|_| index == 0)
            .ok_or(StoreError::IndexOutOfRange { index, count: self.chunk_count() })?;
        dst[..self.chunk_bytes].copy_from_slice(chunk);
        Ok(())
    }

    fn chunk_count(&self) -> u64 {
        u64::from(self.chunk.is_some())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_exactly_one_chunk() {
        let mut store = PlainBufferStore::create(4);
        store.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(store.chunk_count(), 1);
        assert!(store.append(&[5, 6, 7, 8]).is_err());
    }

    #[test]
    fn replace_then_read_back() {
        let mut store = PlainBufferStore::create(4);
        store.append(&[0, 0, 0, 0]).unwrap();
        store.replace_chunk(0, &[7, 7, 7, 7]).unwrap();
        let mut dst = [0u8; 4];
        store.decompress_chunk(0, &mut dst).unwrap();
        assert_eq!(dst, [7, 7, 7, 7]);
    }
}
