//! Bounded axis-extent tuples.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#array-metadata> for the
//! conceptually equivalent `shape` field this type generalises to a fixed maximum rank.

use crate::error::ArrayError;

/// The maximum supported number of array dimensions.
///
/// This is a contract, not an implementation detail: [`Dims`] and every chunk geometry routine
/// in [`crate::geometry`] loop over a fixed 8-way extent and treat unused axes as extent 1.
/// Lifting the cap requires updating every geometry loop.
pub const MAX_DIMS: usize = 8;

/// A bounded tuple of axis extents (`rank` ≤ [`MAX_DIMS`]).
///
/// Immutable after construction. Axes beyond `rank` are defined to be `1`, so algorithms that
/// operate on the padded [`Dims::full`] representation can treat rank as always [`MAX_DIMS`].
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Dims {
    ext: [u64; MAX_DIMS],
    rank: u8,
}

impl Dims {
    /// Create a [`Dims`] from a slice of extents.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidArgument`] if `extents` is empty, longer than [`MAX_DIMS`],
    /// or contains a zero extent.
    pub fn new(extents: &[u64]) -> Result<Self, ArrayError> {
        if extents.is_empty() || extents.len() > MAX_DIMS {
            return Err(ArrayError::InvalidArgument(format!(
                "rank {} is outside [1, {MAX_DIMS}]",
                extents.len()
            )));
        }
        if let Some(axis) = extents.iter().position(|&e| e == 0) {
            return Err(ArrayError::InvalidArgument(format!(
                "axis {axis} has zero extent"
            )));
        }
        let mut ext = [1u64; MAX_DIMS];
        ext[..extents.len()].copy_from_slice(extents);
        Ok(Self {
            ext,
            rank: extents.len() as u8,
        })
    }

    /// The number of real (non-padding) axes.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank as usize
    }

    /// The extents of the real axes, `[0, rank)`.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.ext[..self.rank()]
    }

    /// The extents padded to [`MAX_DIMS`] with trailing `1`s.
    ///
    /// Geometry routines use this so they can loop over a fixed 8-way extent regardless of the
    /// real rank.
    #[must_use]
    pub const fn full(&self) -> [u64; MAX_DIMS] {
        self.ext
    }

    /// The product of the real axis extents.
    #[must_use]
    pub fn product(&self) -> u64 {
        self.as_slice().iter().product()
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_slice())
    }
}

impl TryFrom<&[u64]> for Dims {
    type Error = ArrayError;
    fn try_from(value: &[u64]) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Vec<u64>> for Dims {
    type Error = ArrayError;
    fn try_from(value: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}
