//! A chunked, compressed, multi-dimensional array container with a pluggable storage backend.
//!
//! The hard part, and the sole concern of this crate's core, is the N-D chunking engine: the
//! mapping between logical element coordinates and the physical offset inside a serialized chunk
//! padded up to the chunk shape, the decomposition of arbitrary axis-aligned slice requests into
//! the minimum set of chunks and contiguous runs to touch, and the scatter/gather between a
//! contiguous user buffer and a sequence of padded chunks.
//!
//! Byte-level compression and the persistent container that holds compressed chunks are treated
//! as an external, pluggable [`store::ChunkStore`]; the core never assumes a particular
//! compressor, thread count, or filter pipeline.
//!
//! ```
//! use ndchunk::array::Array;
//! use ndchunk::codec::Codec;
//! use ndchunk::context::{CompressionParams, Context, DecompressionParams};
//! use ndchunk::dims::Dims;
//! use ndchunk::store::memory::MemoryChunkStore;
//!
//! let chunk_shape = Dims::new(&[2, 2]).unwrap();
//! let item_size = 4;
//! let store = MemoryChunkStore::create(chunk_shape.product() as usize * item_size, Codec::None);
//! let ctx = Context::new(CompressionParams::new(item_size), DecompressionParams::default());
//!
//! let mut array = Array::empty(ctx, chunk_shape, item_size, None, store).unwrap();
//! let src: Vec<u8> = (0..9i32).flat_map(i32::to_le_bytes).collect();
//! array.from_buffer(Dims::new(&[3, 3]).unwrap(), &src).unwrap();
//!
//! let mut out = vec![0u8; src.len()];
//! array.to_buffer(&mut out).unwrap();
//! assert_eq!(out, src);
//! ```

pub mod array;
pub mod codec;
pub mod context;
pub mod dims;
pub mod error;
pub mod geometry;
pub mod store;

pub use array::Array;
pub use context::Context;
pub use dims::Dims;
pub use error::{ArrayError, StoreError};
