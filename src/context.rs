//! User-supplied allocator pair and compression parameters, threaded through every operation.

use std::sync::Arc;

use crate::codec::Codec;

/// An allocator for scratch chunk buffers.
///
/// [`Context::default`] selects the global Rust allocator by simply using `Vec`/`vec!` directly
/// rather than invoking this trait; the trait exists for callers who need to track or bound
/// scratch allocations (e.g. pooling, accounting).
pub trait ChunkAllocator: Send + Sync {
    /// Allocate a zeroed scratch buffer of `len` bytes.
    fn alloc(&self, len: usize) -> Vec<u8>;
}

/// The default allocator: the global Rust allocator via `vec![0; len]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl ChunkAllocator for DefaultAllocator {
    fn alloc(&self, len: usize) -> Vec<u8> {
        vec![0u8; len]
    }
}

/// Compression parameters forwarded opaquely to a [`ChunkStore`](crate::store::ChunkStore) on
/// `create`.
///
/// `item_size` (the "typesize") is carried here and must match [`Array::item_size`](crate::array::Array::item_size).
#[derive(Clone, Copy, Debug)]
pub struct CompressionParams {
    /// The codec used to compress each chunk.
    pub codec: Codec,
    /// The element size in bytes. Must match the owning array's `item_size`.
    pub item_size: usize,
}

impl CompressionParams {
    /// Create compression parameters for the given item size, using the default codec.
    #[must_use]
    pub fn new(item_size: usize) -> Self {
        Self {
            codec: Codec::default(),
            item_size,
        }
    }

    /// Use a specific codec.
    #[must_use]
    pub const fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

/// Decompression parameters forwarded opaquely to a [`ChunkStore`](crate::store::ChunkStore) on
/// reads.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecompressionParams {
    /// When true, a file-backed store validates the per-chunk checksum (if present) before
    /// returning decompressed bytes.
    pub validate_checksums: bool,
}

/// User-supplied allocator and compression/decompression parameters, threaded through all
/// operations.
///
/// A `Context` is read-only for the duration of any single `Array` operation and may be shared by
/// multiple arrays on a single thread (it is `Send + Sync`, but the core itself never mutates or
/// locks it).
#[derive(Clone)]
pub struct Context {
    allocator: Arc<dyn ChunkAllocator>,
    compression: CompressionParams,
    decompression: DecompressionParams,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("compression", &self.compression)
            .field("decompression", &self.decompression)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a new context with the platform-default allocator.
    #[must_use]
    pub fn new(compression: CompressionParams, decompression: DecompressionParams) -> Self {
        Self {
            allocator: Arc::new(DefaultAllocator),
            compression,
            decompression,
        }
    }

    /// Create a new context with an explicit allocator.
    #[must_use]
    pub fn with_allocator(
        allocator: Arc<dyn ChunkAllocator>,
        compression: CompressionParams,
        decompression: DecompressionParams,
    ) -> Self {
        Self {
            allocator,
            compression,
            decompression,
        }
    }

    /// Allocate a zeroed scratch chunk buffer of `len` bytes via the configured allocator.
    #[must_use]
    pub fn alloc(&self, len: usize) -> Vec<u8> {
        self.allocator.alloc(len)
    }

    /// The compression parameters.
    #[must_use]
    pub const fn compression(&self) -> &CompressionParams {
        &self.compression
    }

    /// The decompression parameters.
    #[must_use]
    pub const fn decompression(&self) -> &DecompressionParams {
        &self.decompression
    }
}
