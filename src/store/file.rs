//! The persistent, file-backed [`ChunkStore`].
//!
//! Chunks are buffered decoded in memory while the store is open and flushed to disk on
//! [`FileChunkStore::close`], compressing all buffered chunks in parallel with `rayon`, the one
//! place in this crate parallelism is sanctioned, since it happens entirely inside the store and
//! the core never observes or waits on it mid-operation.
//!
//! ## On-disk format
//!
//! ```text
//! magic:        b"NDCK1"
//! header_len:   u64 (little-endian)
//! header:       JSON-encoded FileHeader, header_len bytes
//! metadata:     header.metadata_len bytes, opaque (the persisted record, JSON-encoded by the caller)
//! chunk[0..chunk_count]:
//!     encoded_len: u64
//!     crc32c:      u32 (0 if header.checksums is false)
//!     encoded:     encoded_len bytes
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::StoreError;

use super::ChunkStore;

const MAGIC: &[u8; 5] = b"NDCK1";

#[derive(Serialize, Deserialize)]
struct FileHeader {
    chunk_bytes: usize,
    codec: Codec,
    checksums: bool,
    chunk_count: u64,
    metadata_len: usize,
}

/// A file-backed chunk store.
///
/// Chunks appended or replaced while the store is open live decoded in memory; nothing touches
/// disk until [`FileChunkStore::close`] is called (or the store is dropped without being closed,
/// in which case buffered writes are lost; callers must call `close` explicitly).
pub struct FileChunkStore {
    path: PathBuf,
    chunk_bytes: usize,
    codec: Codec,
    checksums: bool,
    chunks: Vec<Vec<u8>>,
    metadata: Vec<u8>,
}

impl FileChunkStore {
    /// Create a new, empty file-backed store at `path`. Nothing is written until `close`.
    #[must_use]
    pub fn create(path: impl Into<PathBuf>, chunk_bytes: usize, codec: Codec, checksums: bool) -> Self {
        let path = path.into();
        log::debug!("FileChunkStore::create path={path:?} chunk_bytes={chunk_bytes} codec={codec:?}");
        Self {
            path,
            chunk_bytes,
            codec,
            checksums,
            chunks: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Open an existing file-backed store, decoding every chunk into memory.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the file cannot be read, [`StoreError::Metadata`] if the
    /// header is malformed, or [`StoreError::Corruption`] if a checksum fails to verify.
    pub fn open(path: impl Into<PathBuf>, validate_checksums: bool) -> Result<Self, StoreError> {
        let path = path.into();
        log::debug!("FileChunkStore::open path={path:?}");
        let mut reader = BufReader::new(File::open(&path)?);

        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(StoreError::Corruption(0));
        }

        let header_len = read_u64(&mut reader)?;
        let mut header_bytes = vec![0u8; header_len as usize];
        reader.read_exact(&mut header_bytes)?;
        let header: FileHeader = serde_json::from_slice(&header_bytes)?;

        let mut metadata = vec![0u8; header.metadata_len];
        reader.read_exact(&mut metadata)?;

        let mut chunks = Vec::with_capacity(header.chunk_count as usize);
        for index in 0..header.chunk_count {
            let encoded_len = read_u64(&mut reader)?;
            let mut crc_bytes = [0u8; 4];
            reader.read_exact(&mut crc_bytes)?;
            let stored_crc = u32::from_le_bytes(crc_bytes);
            let mut encoded = vec![0u8; encoded_len as usize];
            reader.read_exact(&mut encoded)?;

            if validate_checksums && header.checksums {
                #[cfg(feature = "crc32c")]
                {
                    let actual = crc32c::crc32c(&encoded);
                    if actual != stored_crc {
                        return Err(StoreError::Corruption(index));
                    }
                }
                #[cfg(not(feature = "crc32c"))]
                {
                    let _ = stored_crc;
                }
            }

            let decoded = header.codec.decode(&encoded)?;
            chunks.push(decoded);
        }

        Ok(Self {
            path,
            chunk_bytes: header.chunk_bytes,
            codec: header.codec,
            checksums: header.checksums,
            chunks,
            metadata,
        })
    }

    /// The path this store reads from and writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkStore for FileChunkStore {
    fn append(&mut self, buf: &[u8]) -> Result<u64, StoreError> {
        debug_assert_eq!(buf.len(), self.chunk_bytes);
        self.chunks.push(buf.to_vec());
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
        slot.copy_from_slice(buf);
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
            .chunks
            .get(index as usize)
            .ok_or(StoreError::IndexOutOfRange {
                index,
                count: self.chunks.len() as u64,
            })?;
        dst[..self.chunk_bytes].copy_from_slice(chunk);
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
        log::info!(
            "FileChunkStore::close path={:?} chunks={}",
            self.path,
            self.chunks.len()
        );

        let codec = self.codec;
        let checksums = self.checksums;
        let encoded: Vec<Vec<u8>> = self
            .chunks
            .par_iter()
            .map(|decoded| codec.encode(decoded))
            .collect::<Result<_, _>>()?;

        let header = FileHeader {
            chunk_bytes: self.chunk_bytes,
            codec: self.codec,
            checksums,
            chunk_count: encoded.len() as u64,
            metadata_len: self.metadata.len(),
        };
        let header_bytes = serde_json::to_vec(&header)?;

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
        writer.write_all(&header_bytes)?;
        writer.write_all(&self.metadata)?;

        for chunk in &encoded {
            #[cfg(feature = "crc32c")]
            let crc = if checksums { crc32c::crc32c(chunk) } else { 0 };
            #[cfg(not(feature = "crc32c"))]
            let crc: u32 = 0;
            writer.write_all(&(chunk.len() as u64).to_le_bytes())?;
            writer.write_all(&crc.to_le_bytes())?;
            writer.write_all(chunk)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_u64(reader: &mut impl Read) -> Result<u64, StoreError> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}
