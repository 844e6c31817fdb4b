//! Pure, stateless chunk geometry.
//!
//! This module is the sole algorithmic primitive the array operations are built on: every one of
//! `from_buffer`, `to_buffer`, `fill`, `get_slice`, `set_slice_buffer`, `get_slice_buffer`, and
//! `repart` reduces to "decompose a region into per-chunk last-axis contiguous runs". Nothing
//! here allocates a chunk buffer or touches a store; it only computes coordinates and offsets
//! over fixed 8-element extent arrays (padded axes carry extent `1`, so a loop over `MAX_DIMS`
//! behaves as a no-op past `rank`).

use crate::dims::MAX_DIMS;

/// `ext_shape[i] = ceil(shape[i] / chunk_shape[i]) * chunk_shape[i]`.
#[must_use]
pub fn ext_shape(shape: &[u64; MAX_DIMS], chunk_shape: &[u64; MAX_DIMS]) -> [u64; MAX_DIMS] {
    let mut out = [1u64; MAX_DIMS];
    for i in 0..MAX_DIMS {
        out[i] = shape[i].div_ceil(chunk_shape[i]) * chunk_shape[i];
    }
    out
}

/// The chunk grid shape `G[i] = ext_shape[i] / chunk_shape[i]`.
#[must_use]
pub fn grid_shape(ext_shape: &[u64; MAX_DIMS], chunk_shape: &[u64; MAX_DIMS]) -> [u64; MAX_DIMS] {
    let mut out = [1u64; MAX_DIMS];
    for i in 0..MAX_DIMS {
        out[i] = ext_shape[i] / chunk_shape[i];
    }
    out
}

/// Ravel an ND coordinate to a linear row-major index over `extents`, considering only the first
/// `rank` axes (axes beyond `rank` are assumed to be coordinate `0` in an extent-`1` axis and
/// contribute nothing).
#[must_use]
pub fn ravel_row_major(coord: &[u64; MAX_DIMS], extents: &[u64; MAX_DIMS], rank: usize) -> u64 {
    let mut index = 0u64;
    let mut stride = 1u64;
    for i in (0..rank).rev() {
        index += coord[i] * stride;
        stride *= extents[i];
    }
    index
}

/// The inverse of [`ravel_row_major`]: unravel a linear row-major index into an ND coordinate.
#[must_use]
pub fn unravel_row_major(mut index: u64, extents: &[u64; MAX_DIMS], rank: usize) -> [u64; MAX_DIMS] {
    let mut coord = [0u64; MAX_DIMS];
    for i in (0..rank).rev() {
        coord[i] = index % extents[i];
        index /= extents[i];
    }
    coord
}

/// The chunk index of chunk-grid coordinate `g`, in row-major order over the chunk grid.
#[must_use]
pub fn chunk_index(grid_coord: &[u64; MAX_DIMS], grid_shape: &[u64; MAX_DIMS], rank: usize) -> u64 {
    ravel_row_major(grid_coord, grid_shape, rank)
}

/// The in-chunk element offset of in-chunk coordinate `r`, in row-major order over `chunk_shape`.
#[must_use]
pub fn in_chunk_offset_items(
    local: &[u64; MAX_DIMS],
    chunk_shape: &[u64; MAX_DIMS],
    rank: usize,
) -> u64 {
    ravel_row_major(local, chunk_shape, rank)
}

/// A chunk touched by a region request, together with the in-chunk-local bounding box of the
/// intersection between the chunk and the region.
#[derive(Clone, Copy, Debug)]
pub struct ChunkRegion {
    /// The chunk's coordinate in the chunk grid.
    pub grid_coord: [u64; MAX_DIMS],
    /// The chunk's linear index (row-major over the chunk grid).
    pub chunk_index: u64,
    /// Inclusive lower bound of the intersection, in in-chunk-local coordinates.
    pub lo: [u64; MAX_DIMS],
    /// Exclusive upper bound of the intersection, in in-chunk-local coordinates.
    pub hi: [u64; MAX_DIMS],
}

/// A contiguous last-axis run within a chunk: `len_items` elements starting at in-chunk-local
/// coordinate `local`.
#[derive(Clone, Copy, Debug)]
pub struct Run {
    /// The in-chunk-local coordinate of the first element of the run.
    pub local: [u64; MAX_DIMS],
    /// The number of contiguous elements in the run (along the last axis).
    pub len_items: u64,
}

/// Decompose the half-open region `[start, stop)` (in the coordinate space tiled by
/// `chunk_shape`) into the chunks it touches.
///
/// `grid_shape` must be the chunk grid shape belonging to the same geometry as `chunk_shape`
/// (i.e. `grid_shape(ext_shape(shape, chunk_shape), chunk_shape)`), so that [`ChunkRegion::chunk_index`]
/// matches the storage order of the array being read or written.
#[must_use]
pub fn decompose_region(
    rank: usize,
    chunk_shape: &[u64; MAX_DIMS],
    grid_shape: &[u64; MAX_DIMS],
    start: &[u64; MAX_DIMS],
    stop: &[u64; MAX_DIMS],
) -> Vec<ChunkRegion> {
    let mut g_start = [0u64; MAX_DIMS];
    let mut g_stop = [1u64; MAX_DIMS];
    for i in 0..rank {
        g_start[i] = start[i] / chunk_shape[i];
        g_stop[i] = stop[i].div_ceil(chunk_shape[i]);
    }

    let mut out = Vec::new();
    let mut grid_coord = g_start;
    if rank == 0 || (0..rank).any(|i| g_start[i] >= g_stop[i]) {
        return out;
    }
    loop {
        let mut lo = [0u64; MAX_DIMS];
        let mut hi = [1u64; MAX_DIMS];
        for i in 0..rank {
            let chunk_origin = grid_coord[i] * chunk_shape[i];
            lo[i] = start[i].max(chunk_origin) - chunk_origin;
            hi[i] = stop[i].min(chunk_origin + chunk_shape[i]) - chunk_origin;
        }
        out.push(ChunkRegion {
            grid_coord,
            chunk_index: chunk_index(&grid_coord, grid_shape, rank),
            lo,
            hi,
        });

        // Odometer increment over [g_start, g_stop) across the first `rank` axes.
        let mut axis = rank;
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            grid_coord[axis] += 1;
            if grid_coord[axis] < g_stop[axis] {
                break;
            }
            grid_coord[axis] = g_start[axis];
        }
    }
}

/// Enumerate the contiguous last-axis runs within a [`ChunkRegion`]'s bounding box.
///
/// This is invoked once per fixed prefix `(r_0, ..., r_{rank-2})` in the intersection; each call
/// to `visit` receives the run's starting in-chunk-local coordinate and its length in elements.
pub fn for_each_run(rank: usize, region: &ChunkRegion, mut visit: impl FnMut(Run)) {
    if rank == 0 {
        return;
    }
    let last = rank - 1;
    if region.lo[last] >= region.hi[last] {
        return;
    }
    let len_items = region.hi[last] - region.lo[last];
    if rank == 1 {
        visit(Run {
            local: region.lo,
            len_items,
        });
        return;
    }

    let mut prefix = region.lo;
    loop {
        let mut local = prefix;
        local[last] = region.lo[last];
        visit(Run { local, len_items });

        let mut axis = last;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            prefix[axis] += 1;
            if prefix[axis] < region.hi[axis] {
                break;
            }
            prefix[axis] = region.lo[axis];
        }
    }
}
