//! Per-chunk byte compression.
//!
//! The core chunking engine treats compression as an opaque, external concern: [`Codec`] is the
//! concrete type a [`crate::store::ChunkStore`] forwards [`CompressionParams`]/
//! [`DecompressionParams`] to, selected by name rather than by a plugin registry, since the set
//! of compiled-in codecs is fixed at build time by Cargo features.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The compression codec used to encode a chunk before it is appended to a store.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum Codec {
    /// Store chunk bytes uncompressed.
    None,
    /// Zstandard, at the given compression level.
    #[cfg(feature = "zstd")]
    Zstd {
        /// Compression level, typically `1..=22`.
        level: i32,
    },
    /// Deflate (gzip container), at the given compression level `0..=9`.
    #[cfg(feature = "gzip")]
    Gzip {
        /// Compression level, `0..=9`.
        level: u32,
    },
    /// Bzip2, at the given compression level `1..=9`.
    #[cfg(feature = "bz2")]
    Bz2 {
        /// Compression level, `1..=9`.
        level: u32,
    },
}

impl Default for Codec {
    fn default() -> Self {
        #[cfg(feature = "zstd")]
        {
            Self::Zstd { level: 3 }
        }
        #[cfg(not(feature = "zstd"))]
        {
            Self::None
        }
    }
}

impl Codec {
    /// Compress `decoded` with this codec.
    ///
    /// # Errors
    /// Returns a [`StoreError::Codec`] if the underlying compressor fails.
    pub fn encode(&self, decoded: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self {
            Self::None => Ok(decoded.to_vec()),
            #[cfg(feature = "zstd")]
            Self::Zstd { level } => {
                zstd::encode_all(decoded, *level).map_err(|e| StoreError::Codec(e.to_string()))
            }
            #[cfg(feature = "gzip")]
            Self::Gzip { level } => {
                let mut encoder = flate2::write::GzEncoder::new(
                    Vec::new(),
                    flate2::Compression::new(*level),
                );
                encoder
                    .write_all(decoded)
                    .map_err(|e| StoreError::Codec(e.to_string()))?;
                encoder.finish().map_err(|e| StoreError::Codec(e.to_string()))
            }
            #[cfg(feature = "bz2")]
            Self::Bz2 { level } => {
                let mut encoder = bzip2::write::BzEncoder::new(
                    Vec::new(),
                    bzip2::Compression::new(*level),
                );
                encoder
                    .write_all(decoded)
                    .map_err(|e| StoreError::Codec(e.to_string()))?;
                encoder.finish().map_err(|e| StoreError::Codec(e.to_string()))
            }
        }
    }

    /// Decompress `encoded`, which must have been produced by [`Codec::encode`] with the same
    /// variant.
    ///
    /// # Errors
    /// Returns a [`StoreError::Codec`] if the underlying decompressor fails.
    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self {
            Self::None => Ok(encoded.to_vec()),
            #[cfg(feature = "zstd")]
            Self::Zstd { .. } => {
                zstd::decode_all(encoded).map_err(|e| StoreError::Codec(e.to_string()))
            }
            #[cfg(feature = "gzip")]
            Self::Gzip { .. } => {
                let mut decoder = flate2::read::GzDecoder::new(encoded);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| StoreError::Codec(e.to_string()))?;
                Ok(out)
            }
            #[cfg(feature = "bz2")]
            Self::Bz2 { .. } => {
                let mut decoder = bzip2::read::BzDecoder::new(encoded);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| StoreError::Codec(e.to_string()))?;
                Ok(out)
            }
        }
    }
}
