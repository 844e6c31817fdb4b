//! Chunk stores ([`ChunkStore`] implementors).
//!
//! A [`ChunkStore`] is an opaque external collaborator: an appendable sequence of fixed-size
//! byte blobs, one per chunk, addressable by chunk index, with in-memory or file-backed
//! lifetime. The core (`crate::array`) never compresses, decompresses, or touches a filesystem
//! directly, it only calls through this trait.
//!
//! Three implementors are provided:
//! - [`memory::MemoryChunkStore`], chunks live in a `Vec<Vec<u8>>`, compressed with a [`Codec`](crate::codec::Codec).
//! - [`file::FileChunkStore`], the persistent, file-backed store behind `from_file`.
//! - [`plain_buffer::PlainBufferStore`], the degenerate "plain buffer" backend: a single
//!   uncompressed chunk equal to the whole array.

pub mod file;
pub mod memory;
pub mod plain_buffer;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The required capabilities of a chunk store.
///
/// Every method here operates on exactly one chunk and is treated by the core as an atomic,
/// blocking step: the core is single-threaded and synchronous, and never issues overlapping
/// calls into a single store. An implementation is free to parallelize internally (e.g. a
/// file-backed store compressing many buffered chunks on `close`).
pub trait ChunkStore: Send + Sync {
    /// Append one already-padded, decoded chunk (`chunk_bytes` long) to the store.
    ///
    /// Returns the new chunk count.
    ///
    /// # Errors
    /// Returns [`StoreError`] on an allocation or I/O failure.
    fn append(&mut self, buf: &[u8]) -> Result<u64, StoreError>;

    /// Overwrite the chunk at `index` with a new decoded buffer, re-encoding it.
    ///
    /// This is the primitive `set_slice_buffer` needs: a mutation path for a built array
    /// requires a way to replace an existing chunk's bytes without resizing the store. See
    /// `DESIGN.md`.
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`] if `index >= get_chunk_count()`, or a codec/I/O
    /// error.
    fn replace_chunk(&mut self, index: u64, buf: &[u8]) -> Result<(), StoreError>;

    /// Materialize chunk `index` into `dst`. `dst` must be at least `chunk_bytes()` long.
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`], [`StoreError::DestinationTooSmall`],
    /// [`StoreError::Corruption`], or an I/O/codec error.
    fn decompress_chunk(&self, index: u64, dst: &mut [u8]) -> Result<(), StoreError>;

    /// The number of chunks currently stored.
    fn chunk_count(&self) -> u64;

    /// The fixed decoded byte length of every chunk in this store.
    fn chunk_bytes(&self) -> usize;

    /// The opaque user-metadata bytes set with [`ChunkStore::set_metadata`], or empty if unset.
    fn metadata(&self) -> &[u8];

    /// Set the opaque user-metadata bytes (a record the caller JSON-encodes).
    fn set_metadata(&mut self, metadata: Vec<u8>);

    /// Release the store, flushing to its backing medium if applicable.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a flush failure.
    fn close(&mut self) -> Result<(), StoreError>;
}

impl<T: ChunkStore + ?Sized> ChunkStore for Box<T> {
    fn append(&mut self, buf: &[u8]) -> Result<u64, StoreError> {
        (**self).append(buf)
    }
    fn replace_chunk(&mut self, index: u64, buf: &[u8]) -> Result<(), StoreError> {
        (**self).replace_chunk(index, buf)
    }
    fn decompress_chunk(&self, index: u64, dst: &mut [u8]) -> Result<(), StoreError> {
        (**self).decompress_chunk(index, dst)
    }
    fn chunk_count(&self) -> u64 {
        (**self).chunk_count()
    }
    fn chunk_bytes(&self) -> usize {
        (**self).chunk_bytes()
    }
    fn metadata(&self) -> &[u8] {
        (**self).metadata()
    }
    fn set_metadata(&mut self, metadata: Vec<u8>) {
        (**self).set_metadata(metadata);
    }
    fn close(&mut self) -> Result<(), StoreError> {
        (**self).close()
    }
}

/// The persisted user-metadata record: `ndim`, `shape`, `chunk_shape`, and `item_size`.
///
/// Encoded as JSON and stored as the opaque bytes returned by [`ChunkStore::metadata`]. Forward
/// compatible: unknown keys are ignored by `serde` on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkStoreMetadata {
    /// Number of dimensions, `1..=8`.
    pub ndim: u8,
    /// The logical shape.
    pub shape: Vec<u64>,
    /// The chunk shape.
    pub chunk_shape: Vec<u64>,
    /// Bytes per element.
    pub item_size: usize,
}

impl ChunkStoreMetadata {
    /// Serialize to the opaque bytes a [`ChunkStore`] stores.
    ///
    /// # Errors
    /// Returns [`StoreError`] if serialization fails (infallible in practice for this type).
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from the opaque bytes a [`ChunkStore`] returns from `get_metadata`.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the bytes are not a valid metadata record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
