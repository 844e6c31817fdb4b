//! The error taxonomy returned by every public operation.

use thiserror::Error;

/// A failure surfaced by a [`ChunkStore`](crate::store::ChunkStore) implementation.
///
/// Mirrors the error modes of the `ChunkStore` operation table: index out of range, corruption,
/// I/O, and allocation failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A chunk index was requested that does not exist in the store.
    #[error("chunk index {index} out of range (store has {count} chunks)")]
    IndexOutOfRange {
        /// The requested chunk index.
        index: u64,
        /// The number of chunks actually present.
        count: u64,
    },
    /// A chunk failed a corruption check (e.g. a checksum mismatch) on decompression.
    #[error("chunk {0} failed its corruption check")]
    Corruption(u64),
    /// The destination buffer passed to `decompress_chunk` was smaller than `chunk_bytes`.
    #[error("destination buffer of {dst_bytes} bytes is smaller than the chunk size of {chunk_bytes} bytes")]
    DestinationTooSmall {
        /// The size of the caller-supplied destination buffer.
        dst_bytes: usize,
        /// The expected chunk byte length.
        chunk_bytes: usize,
    },
    /// An underlying I/O failure (file-backed stores only).
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A failure encoding or decoding the store's metadata record.
    #[error(transparent)]
    Metadata(#[from] serde_json::Error),
    /// A codec-level failure (compression or decompression).
    #[error("codec error: {0}")]
    Codec(String),
}

/// The error taxonomy for every public operation on [`Array`](crate::array::Array).
#[derive(Debug, Error)]
pub enum ArrayError {
    /// Rank out of range, zero extent, `chunk_shape[i] > shape[i]`, a region with `stop <=
    /// start` or exceeding `shape`, an item size mismatch, or a squeeze refusal.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation requires an empty array but it is built, or vice versa.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A failure surfaced by the `ChunkStore`.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Scratch buffer allocation failed.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),
}

impl From<std::io::Error> for ArrayError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(StoreError::Io(err))
    }
}

impl From<serde_json::Error> for ArrayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(StoreError::Metadata(err))
    }
}
