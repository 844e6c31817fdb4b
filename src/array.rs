//! The chunked, compressed N-dimensional array container.
//!
//! [`Array`] owns a [`ChunkStore`] handle plus the geometry triple `(shape, chunk_shape,
//! ext_shape)` and implements build/materialize/slice/fill/squeeze on top of the single
//! `crate::geometry` primitive: decompose a region into per-chunk, last-axis contiguous runs.
//!
//! The "chunked" and "plain buffer" backends are not a discriminated union here:
//! `Array<TStore: ChunkStore>` is generic over the store, so
//! [`crate::store::plain_buffer::PlainBufferStore`] is just another `ChunkStore` implementor with
//! no special-casing in this module.

use crate::context::Context;
use crate::dims::{Dims, MAX_DIMS};
use crate::error::ArrayError;
use crate::geometry;
use crate::store::ChunkStore;

fn mul_rank(a: &[u64; MAX_DIMS], b: &[u64; MAX_DIMS], rank: usize) -> [u64; MAX_DIMS] {
    let mut out = [0u64; MAX_DIMS];
    for i in 0..rank {
        out[i] = a[i] * b[i];
    }
    out
}

fn add_rank(a: &[u64; MAX_DIMS], b: &[u64; MAX_DIMS], rank: usize) -> [u64; MAX_DIMS] {
    let mut out = [0u64; MAX_DIMS];
    for i in 0..rank {
        out[i] = a[i] + b[i];
    }
    out
}

fn sub_rank(a: &[u64; MAX_DIMS], b: &[u64; MAX_DIMS], rank: usize) -> [u64; MAX_DIMS] {
    let mut out = [0u64; MAX_DIMS];
    for i in 0..rank {
        out[i] = a[i] - b[i];
    }
    out
}

/// A chunked, compressed N-dimensional array backed by a [`ChunkStore`] of type `TStore`.
pub struct Array<TStore: ChunkStore> {
    ctx: Context,
    store: TStore,
    item_size: usize,
    chunk_shape: Dims,
    shape: Option<Dims>,
    ext_shape: [u64; MAX_DIMS],
    grid_shape: [u64; MAX_DIMS],
}

impl<TStore: ChunkStore> Array<TStore> {
    /// Construct an array around an already-created, empty `store`.
    ///
    /// `shape` may be omitted (the chunked backend records it on the first `from_buffer`/`fill`/
    /// `update_shape`); pass it directly when the caller already knows the logical shape (the
    /// plain-buffer backend always does, since `chunk_shape == shape` there).
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidState`] if `store` is not empty, or
    /// [`ArrayError::InvalidArgument`] if `item_size` is zero, `store.chunk_bytes()` does not
    /// match `chunk_shape.product() * item_size`, or `shape` is supplied but incompatible with
    /// `chunk_shape`.
    pub fn empty(
        ctx: Context,
        chunk_shape: Dims,
        item_size: usize,
        shape: Option<Dims>,
        store: TStore,
    ) -> Result<Self, ArrayError> {
        if item_size == 0 {
            return Err(ArrayError::InvalidArgument("item_size must be > 0".to_string()));
        }
        if ctx.compression().item_size != item_size {
            return Err(ArrayError::InvalidArgument(format!(
                "ctx compression item_size {} does not match array item_size {item_size}",
                ctx.compression().item_size
            )));
        }
        if store.chunk_count() != 0 {
            return Err(ArrayError::InvalidState(
                "store passed to Array::empty must be empty".to_string(),
            ));
        }
        let expected_chunk_bytes = chunk_shape.product() as usize * item_size;
        if store.chunk_bytes() != expected_chunk_bytes {
            return Err(ArrayError::InvalidArgument(format!(
                "store chunk_bytes {} does not match chunk_shape.product() * item_size = {expected_chunk_bytes}",
                store.chunk_bytes()
            )));
        }
        let mut array = Self {
            ctx,
            store,
            item_size,
            ext_shape: chunk_shape.full(),
            grid_shape: [1u64; MAX_DIMS],
            chunk_shape,
            shape: None,
        };
        if let Some(shape) = shape {
            array.update_shape(shape)?;
        }
        Ok(array)
    }

    /// Record the logical shape of a not-yet-built array, fixing `ext_shape` and the chunk grid.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidState`] if the shape is already set, or
    /// [`ArrayError::InvalidArgument`] if `shape`'s rank does not match `chunk_shape`'s, or any
    /// `chunk_shape[i] > shape[i]`.
    pub fn update_shape(&mut self, shape: Dims) -> Result<(), ArrayError> {
        if self.shape.is_some() {
            return Err(ArrayError::InvalidState(
                "array shape is already set".to_string(),
            ));
        }
        if shape.rank() != self.chunk_shape.rank() {
            return Err(ArrayError::InvalidArgument(format!(
                "shape rank {} does not match chunk_shape rank {}",
                shape.rank(),
                self.chunk_shape.rank()
            )));
        }
        let rank = shape.rank();
        let shape_full = shape.full();
        let chunk_full = self.chunk_shape.full();
        for i in 0..rank {
            if chunk_full[i] > shape_full[i] {
                return Err(ArrayError::InvalidArgument(format!(
                    "chunk_shape[{i}]={} exceeds shape[{i}]={}",
                    chunk_full[i], shape_full[i]
                )));
            }
        }
        let ext = geometry::ext_shape(&shape_full, &chunk_full);
        self.grid_shape = geometry::grid_shape(&ext, &chunk_full);
        self.ext_shape = ext;
        self.shape = Some(shape);
        Ok(())
    }

    /// Populate an empty array from a contiguous row-major buffer of `shape.product() *
    /// item_size` bytes, appending exactly `Π grid_shape[i]` chunks to the store in row-major
    /// grid order.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidState`] if the array is already built, or
    /// [`ArrayError::InvalidArgument`] if `src`'s length does not match, or an
    /// [`ArrayError::Store`] error from the underlying store.
    pub fn from_buffer(&mut self, shape: Dims, src: &[u8]) -> Result<(), ArrayError> {
        if self.shape.is_some() {
            return Err(ArrayError::InvalidState("array is already built".to_string()));
        }
        self.update_shape(shape)?;
        let rank = self.rank();
        let shape_full = self.shape.as_ref().unwrap().full();
        let chunk_full = self.chunk_shape.full();
        let item_size = self.item_size;

        let expected_len = self.n_items() as usize * item_size;
        if src.len() != expected_len {
            return Err(ArrayError::InvalidArgument(format!(
                "src has {} bytes, expected {expected_len}",
                src.len()
            )));
        }

        let chunk_bytes = self.chunk_items() as usize * item_size;
        let zero = [0u64; MAX_DIMS];
        let regions = geometry::decompose_region(rank, &chunk_full, &self.grid_shape, &zero, &shape_full);
        log::debug!("from_buffer: scattering {} chunks for shape {shape_full:?}", regions.len());
        for region in &regions {
            let chunk_origin = mul_rank(&region.grid_coord, &chunk_full, rank);
            let mut buf = self.ctx.alloc(chunk_bytes);
            geometry::for_each_run(rank, region, |run| {
                let global = add_rank(&chunk_origin, &run.local, rank);
                let src_off = geometry::ravel_row_major(&global, &shape_full, rank) as usize * item_size;
                let dst_off = geometry::ravel_row_major(&run.local, &chunk_full, rank) as usize * item_size;
                let len = run.len_items as usize * item_size;
                buf[dst_off..dst_off + len].copy_from_slice(&src[src_off..src_off + len]);
            });
            self.store.append(&buf)?;
        }

        let expected_chunks: u64 = (0..rank).map(|i| self.grid_shape[i]).product();
        if self.store.chunk_count() != expected_chunks {
            return Err(ArrayError::InvalidState(format!(
                "store has {} chunks after from_buffer, expected {expected_chunks}",
                self.store.chunk_count()
            )));
        }
        Ok(())
    }

    /// Populate an empty array such that every logical element equals `value` (`item_size`
    /// bytes). Padding bytes remain unspecified.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidState`] if the array is already built, or
    /// [`ArrayError::InvalidArgument`] if `value.len() != item_size`.
    pub fn fill(&mut self, shape: Dims, value: &[u8]) -> Result<(), ArrayError> {
        if self.shape.is_some() {
            return Err(ArrayError::InvalidState("array is already built".to_string()));
        }
        if value.len() != self.item_size {
            return Err(ArrayError::InvalidArgument(format!(
                "value has {} bytes, expected item_size {}",
                value.len(),
                self.item_size
            )));
        }
        self.update_shape(shape)?;
        let rank = self.rank();
        let shape_full = self.shape.as_ref().unwrap().full();
        let chunk_full = self.chunk_shape.full();
        let item_size = self.item_size;
        let chunk_bytes = self.chunk_items() as usize * item_size;
        let zero = [0u64; MAX_DIMS];
        let regions = geometry::decompose_region(rank, &chunk_full, &self.grid_shape, &zero, &shape_full);
        for region in &regions {
            let mut buf = self.ctx.alloc(chunk_bytes);
            geometry::for_each_run(rank, region, |run| {
                let dst_off = geometry::ravel_row_major(&run.local, &chunk_full, rank) as usize * item_size;
                for i in 0..run.len_items as usize {
                    let off = dst_off + i * item_size;
                    buf[off..off + item_size].copy_from_slice(value);
                }
            });
            self.store.append(&buf)?;
        }
        Ok(())
    }

    /// Copy every logical element, in row-major order over `shape`, into `dest`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidState`] if the array is not built, or
    /// [`ArrayError::InvalidArgument`] if `dest` is the wrong length.
    pub fn to_buffer(&self, dest: &mut [u8]) -> Result<(), ArrayError> {
        let shape = self.shape.ok_or_else(|| ArrayError::InvalidState("array is not built".to_string()))?;
        let shape_full = shape.full();
        let expected_len = shape.product() as usize * self.item_size;
        if dest.len() != expected_len {
            return Err(ArrayError::InvalidArgument(format!(
                "dest has {} bytes, expected {expected_len}",
                dest.len()
            )));
        }
        let zero = [0u64; MAX_DIMS];
        self.gather_region(&zero, &shape_full, &zero, &shape_full, dest)
    }

    /// Copy the region `[start, stop)` into a contiguous buffer `dest` of `(stop -
    /// start).product() * item_size` bytes, in row-major order over `stop - start`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidArgument`] if the region is invalid or `dest` is the wrong
    /// length, or [`ArrayError::InvalidState`] if the array is not built.
    pub fn get_slice_buffer(&self, start: Dims, stop: Dims, dest: &mut [u8]) -> Result<(), ArrayError> {
        let shape = self.shape.ok_or_else(|| ArrayError::InvalidState("array is not built".to_string()))?;
        let rank = self.rank();
        let (start_full, stop_full, region_shape_full) = self.validate_region(&shape, &start, &stop)?;
        let expected_len = (0..rank).map(|i| region_shape_full[i]).product::<u64>() as usize * self.item_size;
        if dest.len() != expected_len {
            return Err(ArrayError::InvalidArgument(format!(
                "dest has {} bytes, expected {expected_len}",
                dest.len()
            )));
        }
        let zero = [0u64; MAX_DIMS];
        self.gather_region(&start_full, &stop_full, &zero, &region_shape_full, dest)
    }

    /// Overwrite the region `[start, stop)` from a contiguous buffer `src`, the only mutation
    /// operation on a built array. Leaves all invariants intact: no chunk is resized or added.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidArgument`] if the region is invalid or `src` is the wrong
    /// length, or [`ArrayError::InvalidState`] if the array is not built.
    pub fn set_slice_buffer(&mut self, start: Dims, stop: Dims, src: &[u8]) -> Result<(), ArrayError> {
        let shape = self.shape.ok_or_else(|| ArrayError::InvalidState("array is not built".to_string()))?;
        let rank = self.rank();
        let (start_full, stop_full, region_shape_full) = self.validate_region(&shape, &start, &stop)?;
        let item_size = self.item_size;
        let expected_len = (0..rank).map(|i| region_shape_full[i]).product::<u64>() as usize * item_size;
        if src.len() != expected_len {
            return Err(ArrayError::InvalidArgument(format!(
                "src has {} bytes, expected {expected_len}",
                src.len()
            )));
        }

        let chunk_full = self.chunk_shape.full();
        let chunk_bytes = self.chunk_items() as usize * item_size;
        let regions = geometry::decompose_region(rank, &chunk_full, &self.grid_shape, &start_full, &stop_full);
        for region in &regions {
            let chunk_origin = mul_rank(&region.grid_coord, &chunk_full, rank);
            let mut buf = self.ctx.alloc(chunk_bytes);
            self.store.decompress_chunk(region.chunk_index, &mut buf)?;
            geometry::for_each_run(rank, region, |run| {
                let global = add_rank(&chunk_origin, &run.local, rank);
                let region_local = sub_rank(&global, &start_full, rank);
                let src_off = geometry::ravel_row_major(&region_local, &region_shape_full, rank) as usize * item_size;
                let dst_off = geometry::ravel_row_major(&run.local, &chunk_full, rank) as usize * item_size;
                let len = run.len_items as usize * item_size;
                buf[dst_off..dst_off + len].copy_from_slice(&src[src_off..src_off + len]);
            });
            self.store.replace_chunk(region.chunk_index, &buf)?;
        }
        Ok(())
    }

    /// Drop every axis `i` with `shape[i] == 1 && chunk_shape[i] == 1`. Rewrites only the
    /// geometry metadata; the ChunkStore is untouched.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidState`] if the array is not built, or
    /// [`ArrayError::InvalidArgument`] if an axis has `shape[i] == 1` but `chunk_shape[i] != 1`
    /// (removing it would change the serialized chunk layout), or if every axis would be
    /// removed.
    pub fn squeeze(&mut self) -> Result<(), ArrayError> {
        let shape = self.shape.ok_or_else(|| ArrayError::InvalidState("array is not built".to_string()))?;
        let rank = self.rank();
        let shape_full = shape.full();
        let chunk_full = self.chunk_shape.full();

        let mut kept_shape = Vec::with_capacity(rank);
        let mut kept_chunk = Vec::with_capacity(rank);
        for i in 0..rank {
            if shape_full[i] == 1 {
                if chunk_full[i] != 1 {
                    return Err(ArrayError::InvalidArgument(format!(
                        "axis {i} has shape 1 but chunk_shape {} != 1; squeeze would change chunk layout",
                        chunk_full[i]
                    )));
                }
                continue;
            }
            kept_shape.push(shape_full[i]);
            kept_chunk.push(chunk_full[i]);
        }
        if kept_shape.is_empty() {
            return Err(ArrayError::InvalidArgument(
                "squeeze would reduce rank below 1".to_string(),
            ));
        }

        log::debug!("squeeze: rank {rank} -> {}", kept_shape.len());
        let new_shape = Dims::new(&kept_shape)?;
        let new_chunk_shape = Dims::new(&kept_chunk)?;
        let new_shape_full = new_shape.full();
        let new_chunk_full = new_chunk_shape.full();
        let ext = geometry::ext_shape(&new_shape_full, &new_chunk_full);
        self.grid_shape = geometry::grid_shape(&ext, &new_chunk_full);
        self.ext_shape = ext;
        self.chunk_shape = new_chunk_shape;
        self.shape = Some(new_shape);
        Ok(())
    }

    /// The logical shape, if the array has been built.
    #[must_use]
    pub const fn shape(&self) -> Option<Dims> {
        self.shape
    }

    /// The chunk shape, fixed at construction.
    #[must_use]
    pub const fn chunk_shape(&self) -> Dims {
        self.chunk_shape
    }

    /// The extended shape (padded up to a multiple of `chunk_shape`).
    #[must_use]
    pub const fn ext_shape(&self) -> [u64; MAX_DIMS] {
        self.ext_shape
    }

    /// Bytes per element.
    #[must_use]
    pub const fn item_size(&self) -> usize {
        self.item_size
    }

    /// The number of dimensions, fixed at construction by `chunk_shape`.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.chunk_shape.rank()
    }

    /// `Π shape[i]`, or 0 if not built.
    #[must_use]
    pub fn n_items(&self) -> u64 {
        self.shape.map_or(0, |s| s.product())
    }

    /// `Π chunk_shape[i]`.
    #[must_use]
    pub fn chunk_items(&self) -> u64 {
        self.chunk_shape.product()
    }

    /// `Π ext_shape[i]`.
    #[must_use]
    pub fn ext_items(&self) -> u64 {
        self.ext_shape[..self.rank()].iter().product()
    }

    /// Whether the array has been built (has a recorded shape).
    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.shape.is_some()
    }

    /// The context this array was constructed with.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    /// A reference to the underlying store.
    #[must_use]
    pub const fn store(&self) -> &TStore {
        &self.store
    }

    /// A mutable reference to the underlying store.
    pub fn store_mut(&mut self) -> &mut TStore {
        &mut self.store
    }

    /// Release the underlying store, flushing it if applicable.
    ///
    /// # Errors
    /// Returns [`ArrayError::Store`] on a flush failure.
    pub fn close(mut self) -> Result<(), ArrayError> {
        self.store.close()?;
        Ok(())
    }

    fn validate_region(
        &self,
        shape: &Dims,
        start: &Dims,
        stop: &Dims,
    ) -> Result<([u64; MAX_DIMS], [u64; MAX_DIMS], [u64; MAX_DIMS]), ArrayError> {
        let rank = self.rank();
        if start.rank() != rank || stop.rank() != rank {
            return Err(ArrayError::InvalidArgument(
                "start/stop rank must match the array's rank".to_string(),
            ));
        }
        let shape_full = shape.full();
        let start_full = start.full();
        let stop_full = stop.full();
        let mut region_shape = Vec::with_capacity(rank);
        for i in 0..rank {
            if start_full[i] >= stop_full[i] || stop_full[i] > shape_full[i] {
                return Err(ArrayError::InvalidArgument(format!(
                    "region axis {i}: start={} stop={} must satisfy start < stop <= shape={}",
                    start_full[i], stop_full[i], shape_full[i]
                )));
            }
            region_shape.push(stop_full[i] - start_full[i]);
        }
        let mut region_shape_full = [1u64; MAX_DIMS];
        region_shape_full[..rank].copy_from_slice(&region_shape);
        Ok((start_full, stop_full, region_shape_full))
    }

    /// Gather the region `[region_start, region_stop)` of this array's store into `dst`, which
    /// is addressed with stride shape `dst_shape_full` starting at local origin `dst_origin`.
    ///
    /// This is the single read-side primitive `to_buffer`, `get_slice_buffer`, and `get_slice`
    /// are built on: decompose the region against this array's own chunk geometry, decompress
    /// each touched chunk once, and copy its contiguous runs directly into `dst`.
    fn gather_region(
        &self,
        region_start: &[u64; MAX_DIMS],
        region_stop: &[u64; MAX_DIMS],
        dst_origin: &[u64; MAX_DIMS],
        dst_shape_full: &[u64; MAX_DIMS],
        dst: &mut [u8],
    ) -> Result<(), ArrayError> {
        let rank = self.rank();
        let item_size = self.item_size;
        let chunk_full = self.chunk_shape.full();
        let chunk_bytes = self.chunk_items() as usize * item_size;
        let regions = geometry::decompose_region(rank, &chunk_full, &self.grid_shape, region_start, region_stop);
        log::trace!(
            "gather_region: region [{region_start:?}, {region_stop:?}) touches {} chunks",
            regions.len()
        );
        for region in &regions {
            let chunk_origin = mul_rank(&region.grid_coord, &chunk_full, rank);
            let mut scratch = self.ctx.alloc(chunk_bytes);
            self.store.decompress_chunk(region.chunk_index, &mut scratch)?;
            geometry::for_each_run(rank, region, |run| {
                let global = add_rank(&chunk_origin, &run.local, rank);
                let dst_local = add_rank(&sub_rank(&global, region_start, rank), dst_origin, rank);
                let src_off = geometry::ravel_row_major(&run.local, &chunk_full, rank) as usize * item_size;
                let dst_off = geometry::ravel_row_major(&dst_local, dst_shape_full, rank) as usize * item_size;
                let len = run.len_items as usize * item_size;
                dst[dst_off..dst_off + len].copy_from_slice(&scratch[src_off..src_off + len]);
            });
        }
        Ok(())
    }
}

impl Array<crate::store::file::FileChunkStore> {
    /// Reconstruct an array from a persistent file-backed store, recovering `shape`,
    /// `chunk_shape`, and `item_size` from the store's user metadata.
    ///
    /// # Errors
    /// Returns [`ArrayError::Store`] if the file cannot be opened or its metadata is missing or
    /// malformed, or [`ArrayError::InvalidState`] if the recovered geometry does not reproduce
    /// the store's actual chunk count.
    pub fn from_file(
        ctx: Context,
        path: impl Into<std::path::PathBuf>,
        validate_checksums: bool,
    ) -> Result<Self, ArrayError> {
        let store = crate::store::file::FileChunkStore::open(path, validate_checksums)?;
        let metadata = crate::store::ChunkStoreMetadata::from_bytes(store.metadata())?;
        let shape = Dims::new(&metadata.shape)?;
        let chunk_shape = Dims::new(&metadata.chunk_shape)?;
        if chunk_shape.rank() != metadata.ndim as usize {
            return Err(ArrayError::InvalidArgument(format!(
                "metadata ndim {} does not match chunk_shape rank {}",
                metadata.ndim,
                chunk_shape.rank()
            )));
        }
        if metadata.item_size == 0 {
            return Err(ArrayError::InvalidArgument("item_size must be > 0".to_string()));
        }
        if ctx.compression().item_size != metadata.item_size {
            return Err(ArrayError::InvalidArgument(format!(
                "ctx compression item_size {} does not match stored item_size {}",
                ctx.compression().item_size,
                metadata.item_size
            )));
        }
        let rank = chunk_shape.rank();
        let shape_full = shape.full();
        let chunk_full = chunk_shape.full();
        for i in 0..rank {
            if chunk_full[i] > shape_full[i] {
                return Err(ArrayError::InvalidArgument(format!(
                    "chunk_shape[{i}]={} exceeds shape[{i}]={}",
                    chunk_full[i], shape_full[i]
                )));
            }
        }
        let ext_shape = geometry::ext_shape(&shape_full, &chunk_full);
        let grid_shape = geometry::grid_shape(&ext_shape, &chunk_full);
        let expected_chunks: u64 = (0..rank).map(|i| grid_shape[i]).product();
        if store.chunk_count() != expected_chunks {
            return Err(ArrayError::InvalidState(format!(
                "store has {} chunks, geometry expects {expected_chunks}",
                store.chunk_count()
            )));
        }
        let expected_chunk_bytes = chunk_shape.product() as usize * metadata.item_size;
        if store.chunk_bytes() != expected_chunk_bytes {
            return Err(ArrayError::InvalidArgument(format!(
                "store chunk_bytes {} does not match chunk_shape.product() * item_size = {expected_chunk_bytes}",
                store.chunk_bytes()
            )));
        }
        Ok(Self {
            ctx,
            store,
            item_size: metadata.item_size,
            chunk_shape,
            shape: Some(shape),
            ext_shape,
            grid_shape,
        })
    }
}

/// Produce `dest` (empty at entry) as the slice `src[start..stop]`, using `dest`'s own
/// pre-configured `chunk_shape`.
///
/// For every logical coordinate `c` in `dest`, `dest[c] == src[c + start]`. `dest`'s chunks are
/// appended in row-major grid order; each is filled by re-decomposing its source region against
/// `src`'s own (possibly different) chunk geometry.
///
/// # Errors
/// Returns [`ArrayError::InvalidState`] if `dest` is already built or `src` is not built, or
/// [`ArrayError::InvalidArgument`] if the region is invalid or `dest.item_size() !=
/// src.item_size()`.
pub fn get_slice<S1: ChunkStore, S2: ChunkStore>(
    dest: &mut Array<S2>,
    src: &Array<S1>,
    start: Dims,
    stop: Dims,
) -> Result<(), ArrayError> {
    if dest.is_built() {
        return Err(ArrayError::InvalidState("dest must be empty".to_string()));
    }
    if dest.item_size() != src.item_size() {
        return Err(ArrayError::InvalidArgument(format!(
            "dest.item_size()={} does not match src.item_size()={}",
            dest.item_size(),
            src.item_size()
        )));
    }
    let src_shape = src
        .shape()
        .ok_or_else(|| ArrayError::InvalidState("src is not built".to_string()))?;
    let rank = src.rank();
    if dest.rank() != rank || start.rank() != rank || stop.rank() != rank {
        return Err(ArrayError::InvalidArgument(
            "dest/start/stop rank must match src's rank".to_string(),
        ));
    }
    let src_shape_full = src_shape.full();
    let start_full = start.full();
    let stop_full = stop.full();
    let mut dest_shape_vec = Vec::with_capacity(rank);
    for i in 0..rank {
        if start_full[i] >= stop_full[i] || stop_full[i] > src_shape_full[i] {
            return Err(ArrayError::InvalidArgument(format!(
                "region axis {i}: start={} stop={} must satisfy start < stop <= shape={}",
                start_full[i], stop_full[i], src_shape_full[i]
            )));
        }
        dest_shape_vec.push(stop_full[i] - start_full[i]);
    }
    let dest_shape = Dims::new(&dest_shape_vec)?;
    dest.update_shape(dest_shape)?;

    let item_size = dest.item_size();
    let dest_chunk_full = dest.chunk_shape().full();
    let dest_chunk_bytes = dest.chunk_items() as usize * item_size;
    let src_chunk_full = src.chunk_shape().full();

    let zero = [0u64; MAX_DIMS];
    let dest_shape_full = dest_shape.full();
    let dest_regions = geometry::decompose_region(rank, &dest_chunk_full, &dest.grid_shape, &zero, &dest_shape_full);

    for dest_region in &dest_regions {
        let chunk_origin_dest = mul_rank(&dest_region.grid_coord, &dest_chunk_full, rank);
        let base = add_rank(&start_full, &chunk_origin_dest, rank);
        let region_start = add_rank(&base, &dest_region.lo, rank);
        let region_stop = add_rank(&base, &dest_region.hi, rank);

        let mut scratch = dest.ctx.alloc(dest_chunk_bytes);
        let src_regions = geometry::decompose_region(rank, &src_chunk_full, &src.grid_shape, &region_start, &region_stop);
        for src_region in &src_regions {
            let src_chunk_origin = mul_rank(&src_region.grid_coord, &src_chunk_full, rank);
            let mut src_scratch = src.ctx.alloc(src.chunk_items() as usize * item_size);
            src.store.decompress_chunk(src_region.chunk_index, &mut src_scratch)?;
            geometry::for_each_run(rank, src_region, |run| {
                let global = add_rank(&src_chunk_origin, &run.local, rank);
                let dest_local = sub_rank(&global, &base, rank);
                let src_off = geometry::ravel_row_major(&run.local, &src_chunk_full, rank) as usize * item_size;
                let dst_off = geometry::ravel_row_major(&dest_local, &dest_chunk_full, rank) as usize * item_size;
                let len = run.len_items as usize * item_size;
                scratch[dst_off..dst_off + len].copy_from_slice(&src_scratch[src_off..src_off + len]);
            });
        }
        dest.store.append(&scratch)?;
    }
    Ok(())
}

/// Rewrite `src` into `dest`'s pre-configured chunk shape. Equivalent to, and must match bit for
/// bit, `get_slice(dest, src, 0, src.shape())`.
///
/// # Errors
/// Propagates every error [`get_slice`] can return.
pub fn repart<S1: ChunkStore, S2: ChunkStore>(dest: &mut Array<S2>, src: &Array<S1>) -> Result<(), ArrayError> {
    let shape = src
        .shape()
        .ok_or_else(|| ArrayError::InvalidState("src is not built".to_string()))?;
    let rank = shape.rank();
    let start = Dims::new(&vec![0u64; rank])?;
    get_slice(dest, src, start, shape)
}

/// Compare two built arrays element-wise by materializing through [`Array::to_buffer`].
/// Fails fast on a `shape` or `item_size` mismatch.
///
/// # Errors
/// Returns [`ArrayError::InvalidState`] if either array is not built, or
/// [`ArrayError::InvalidArgument`] on a shape/item_size mismatch. A store read failure surfaces
/// as [`ArrayError::Store`].
pub fn arrays_equal_data<S1: ChunkStore, S2: ChunkStore>(a: &Array<S1>, b: &Array<S2>) -> Result<bool, ArrayError> {
    let a_shape = a
        .shape()
        .ok_or_else(|| ArrayError::InvalidState("array a is not built".to_string()))?;
    let b_shape = b
        .shape()
        .ok_or_else(|| ArrayError::InvalidState("array b is not built".to_string()))?;
    if a.item_size() != b.item_size() {
        return Err(ArrayError::InvalidArgument(format!(
            "item_size mismatch: {} vs {}",
            a.item_size(),
            b.item_size()
        )));
    }
    if a_shape.as_slice() != b_shape.as_slice() {
        return Err(ArrayError::InvalidArgument(format!(
            "shape mismatch: {a_shape} vs {b_shape}"
        )));
    }
    let mut buf_a = vec![0u8; a_shape.product() as usize * a.item_size()];
    let mut buf_b = vec![0u8; b_shape.product() as usize * b.item_size()];
    a.to_buffer(&mut buf_a)?;
    b.to_buffer(&mut buf_b)?;
    Ok(buf_a == buf_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::context::{CompressionParams, DecompressionParams};
    use crate::store::memory::MemoryChunkStore;

    fn ctx(item_size: usize) -> Context {
        Context::new(CompressionParams::new(item_size).with_codec(Codec::None), DecompressionParams::default())
    }

    fn build_array(shape: &[u64], chunk_shape: &[u64], item_size: usize, src: &[u8]) -> Array<MemoryChunkStore> {
        let chunk_shape = Dims::new(chunk_shape).unwrap();
        let chunk_bytes = chunk_shape.product() as usize * item_size;
        let store = MemoryChunkStore::create(chunk_bytes, Codec::None);
        let mut array = Array::empty(ctx(item_size), chunk_shape, item_size, None, store).unwrap();
        array.from_buffer(Dims::new(shape).unwrap(), src).unwrap();
        array
    }

    #[test]
    fn round_trip_36_doubles() {
        let src: Vec<u8> = (0..36u64).flat_map(|v| (v as f64).to_le_bytes()).collect();
        let array = build_array(&[4, 3, 3], &[2, 2, 2], 8, &src);
        assert_eq!(array.store().chunk_count(), 2 * 2 * 2);
        let mut out = vec![0u8; src.len()];
        array.to_buffer(&mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn chunk_count_law_134_56_204() {
        let n: u64 = 134 * 56 * 204;
        let src = vec![0u8; n as usize * 8];
        let array = build_array(&[134, 56, 204], &[26, 17, 34], 8, &src);
        assert_eq!(array.store().chunk_count(), 6 * 4 * 6);
    }

    #[test]
    fn rank_7_heavy_padding_round_trips() {
        let shape = [12u64, 15, 24, 16, 12, 8, 7];
        let chunk_shape = [5u64, 7, 9, 8, 5, 3, 7];
        let n: u64 = shape.iter().product();
        let src: Vec<u8> = (0..n).map(|v| (v % 251) as u8).collect();
        let array = build_array(&shape, &chunk_shape, 1, &src);
        let mut out = vec![0u8; src.len()];
        array.to_buffer(&mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn get_slice_matches_offset_formula() {
        let mut src = vec![0u8; 100 * 8];
        for i in 0..10u64 {
            for j in 0..10u64 {
                let v = (i * 10 + j) as f64;
                let off = ((i * 10 + j) * 8) as usize;
                src[off..off + 8].copy_from_slice(&v.to_le_bytes());
            }
        }
        let source = build_array(&[10, 10], &[3, 3], 8, &src);

        let dest_chunk_shape = Dims::new(&[3, 3]).unwrap();
        let dest_store = MemoryChunkStore::create(dest_chunk_shape.product() as usize * 8, Codec::None);
        let mut dest = Array::empty(ctx(8), dest_chunk_shape, 8, None, dest_store).unwrap();
        get_slice(&mut dest, &source, Dims::new(&[2, 2]).unwrap(), Dims::new(&[8, 9]).unwrap()).unwrap();

        assert_eq!(dest.shape().unwrap().as_slice(), &[6, 7]);
        let mut out = vec![0u8; 6 * 7 * 8];
        dest.to_buffer(&mut out).unwrap();
        for a in 0..6u64 {
            for b in 0..7u64 {
                let expected = ((a + 2) * 10 + (b + 2)) as f64;
                let off = ((a * 7 + b) * 8) as usize;
                let actual = f64::from_le_bytes(out[off..off + 8].try_into().unwrap());
                assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn single_chunk_degenerate_round_trips() {
        let shape = [4u64, 3, 8, 5, 10, 12, 6, 4];
        let n: u64 = shape.iter().product();
        let src: Vec<u8> = (0..n).map(|v| (v % 251) as u8).collect();
        let array = build_array(&shape, &shape, 1, &src);
        assert_eq!(array.store().chunk_count(), 1);
        let mut out = vec![0u8; src.len()];
        array.to_buffer(&mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn squeeze_drops_unit_axes_and_preserves_data() {
        let n: u64 = 7 * 1 * 5;
        let src: Vec<u8> = (0..n).map(|v| v as u8).collect();
        let mut array = build_array(&[7, 1, 5], &[3, 1, 2], 1, &src);
        array.squeeze().unwrap();
        assert_eq!(array.shape().unwrap().as_slice(), &[7, 5]);
        assert_eq!(array.chunk_shape().as_slice(), &[3, 2]);
        let mut out = vec![0u8; src.len()];
        array.to_buffer(&mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn squeeze_refuses_padded_unit_axis() {
        let src = vec![0u8; 7 * 1 * 5];
        let mut array = build_array(&[7, 1, 5], &[3, 2, 2], 1, &src);
        assert!(array.squeeze().is_err());
    }

    #[test]
    fn fill_is_idempotent_over_shape() {
        let chunk_shape = Dims::new(&[2, 2]).unwrap();
        let store = MemoryChunkStore::create(chunk_shape.product() as usize * 4, Codec::None);
        let mut array = Array::empty(ctx(4), chunk_shape, 4, None, store).unwrap();
        array.fill(Dims::new(&[5, 5]).unwrap(), &42u32.to_le_bytes()).unwrap();
        let mut out = vec![0u8; 5 * 5 * 4];
        array.to_buffer(&mut out).unwrap();
        for chunk in out.chunks(4) {
            assert_eq!(u32::from_le_bytes(chunk.try_into().unwrap()), 42);
        }
    }

    #[test]
    fn set_slice_buffer_mutates_in_place_without_resizing() {
        let src = vec![0u8; 10 * 10];
        let mut array = build_array(&[10, 10], &[3, 3], 1, &src);
        let count_before = array.store().chunk_count();
        let patch = vec![9u8; 4 * 4];
        array
            .set_slice_buffer(Dims::new(&[2, 2]).unwrap(), Dims::new(&[6, 6]).unwrap(), &patch)
            .unwrap();
        assert_eq!(array.store().chunk_count(), count_before);
        let mut region = vec![0u8; 4 * 4];
        array
            .get_slice_buffer(Dims::new(&[2, 2]).unwrap(), Dims::new(&[6, 6]).unwrap(), &mut region)
            .unwrap();
        assert_eq!(region, patch);
    }

    #[test]
    fn repart_matches_get_slice_bit_for_bit() {
        let src: Vec<u8> = (0..(134 * 56 * 204u64)).map(|v| (v % 251) as u8).collect();
        let source = build_array(&[134, 56, 204], &[26, 17, 34], 1, &src);

        let new_chunk_shape = Dims::new(&[40, 40, 40]).unwrap();
        let dest_store = MemoryChunkStore::create(new_chunk_shape.product() as usize, Codec::None);
        let mut dest = Array::empty(ctx(1), new_chunk_shape, 1, None, dest_store).unwrap();
        repart(&mut dest, &source).unwrap();

        assert!(arrays_equal_data(&dest, &source).unwrap());
    }
}
