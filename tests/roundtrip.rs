//! End-to-end round-trip and scenario coverage, plus the padding-invisibility and persistence
//! properties that don't fit naturally in a `#[cfg(test)]` unit test.

use ndchunk::array::{self, Array};
use ndchunk::codec::Codec;
use ndchunk::context::{CompressionParams, Context, DecompressionParams};
use ndchunk::dims::Dims;
use ndchunk::store::file::FileChunkStore;
use ndchunk::store::memory::MemoryChunkStore;
use ndchunk::store::ChunkStore;

fn ctx(item_size: usize) -> Context {
    Context::new(CompressionParams::new(item_size).with_codec(Codec::None), DecompressionParams::default())
}

fn memory_array(chunk_shape: &[u64], item_size: usize) -> Array<MemoryChunkStore> {
    let chunk_shape = Dims::new(chunk_shape).unwrap();
    let chunk_bytes = chunk_shape.product() as usize * item_size;
    let store = MemoryChunkStore::create(chunk_bytes, Codec::None);
    Array::empty(ctx(item_size), chunk_shape, item_size, None, store).unwrap()
}

/// Every rank 1..=8, a shape/chunk_shape pair that doesn't divide evenly, and every item size in
/// {1, 2, 3, 4, 8}: `to_buffer(from_buffer(buf)) == buf`.
#[test]
fn round_trip_every_rank_and_item_size() {
    for rank in 1..=8usize {
        let shape: Vec<u64> = (0..rank).map(|i| 3 + (i as u64 % 2)).collect();
        let chunk_shape: Vec<u64> = shape.iter().map(|&s| (s / 2).max(1)).collect();
        let n: u64 = shape.iter().product();
        for &item_size in &[1usize, 2, 3, 4, 8] {
            let src: Vec<u8> = (0..n * item_size as u64).map(|v| (v % 251) as u8).collect();
            let mut array = memory_array(&chunk_shape, item_size);
            array.from_buffer(Dims::new(&shape).unwrap(), &src).unwrap();
            let mut out = vec![0u8; src.len()];
            array.to_buffer(&mut out).unwrap();
            assert_eq!(out, src, "rank={rank} item_size={item_size}");
        }
    }
}

#[test]
fn scenario_36_doubles() {
    let src: Vec<u8> = (0..36u64).flat_map(|v| (v as f64).to_le_bytes()).collect();
    let mut array = memory_array(&[2, 2, 2], 8);
    array.from_buffer(Dims::new(&[4, 3, 3]).unwrap(), &src).unwrap();
    assert_eq!(array.store().chunk_count(), 8);
    let mut out = vec![0u8; src.len()];
    array.to_buffer(&mut out).unwrap();
    assert_eq!(out, src);
}

#[test]
fn scenario_chunk_count_law_134_56_204() {
    let n: u64 = 134 * 56 * 204;
    let src = vec![0u8; n as usize * 8];
    let mut array = memory_array(&[26, 17, 34], 8);
    array.from_buffer(Dims::new(&[134, 56, 204]).unwrap(), &src).unwrap();
    assert_eq!(array.store().chunk_count(), 6 * 4 * 6);
    let mut out = vec![0u8; src.len()];
    array.to_buffer(&mut out).unwrap();
    assert_eq!(out, src);
}

#[test]
fn scenario_rank_7_heavy_padding() {
    let shape = [12u64, 15, 24, 16, 12, 8, 7];
    let chunk_shape = [5u64, 7, 9, 8, 5, 3, 7];
    let n: u64 = shape.iter().product();
    let src: Vec<u8> = (0..n).map(|v| (v % 251) as u8).collect();
    let mut array = memory_array(&chunk_shape, 1);
    array.from_buffer(Dims::new(&shape).unwrap(), &src).unwrap();
    let mut out = vec![0u8; src.len()];
    array.to_buffer(&mut out).unwrap();
    assert_eq!(out, src);
}

#[test]
fn scenario_get_slice_offset_formula() {
    let mut src = vec![0u8; 100 * 8];
    for i in 0..10u64 {
        for j in 0..10u64 {
            let v = (i * 10 + j) as f64;
            let off = ((i * 10 + j) * 8) as usize;
            src[off..off + 8].copy_from_slice(&v.to_le_bytes());
        }
    }
    let mut source = memory_array(&[3, 3], 8);
    source.from_buffer(Dims::new(&[10, 10]).unwrap(), &src).unwrap();

    let mut dest = memory_array(&[3, 3], 8);
    array::get_slice(&mut dest, &source, Dims::new(&[2, 2]).unwrap(), Dims::new(&[8, 9]).unwrap()).unwrap();

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
fn scenario_single_chunk_degenerate() {
    let shape = [4u64, 3, 8, 5, 10, 12, 6, 4];
    let n: u64 = shape.iter().product();
    let src: Vec<u8> = (0..n).map(|v| (v % 251) as u8).collect();
    let mut array = memory_array(&shape, 1);
    array.from_buffer(Dims::new(&shape).unwrap(), &src).unwrap();
    assert_eq!(array.store().chunk_count(), 1);
    let mut out = vec![0u8; src.len()];
    array.to_buffer(&mut out).unwrap();
    assert_eq!(out, src);
}

#[test]
fn scenario_squeeze_unit_axes() {
    let n: u64 = 7 * 1 * 5;
    let src: Vec<u8> = (0..n).map(|v| v as u8).collect();
    let mut array = memory_array(&[3, 1, 2], 1);
    array.from_buffer(Dims::new(&[7, 1, 5]).unwrap(), &src).unwrap();
    array.squeeze().unwrap();
    assert_eq!(array.shape().unwrap().as_slice(), &[7, 5]);
    assert_eq!(array.chunk_shape().as_slice(), &[3, 2]);
    let mut out = vec![0u8; src.len()];
    array.to_buffer(&mut out).unwrap();
    assert_eq!(out, src);
}

/// Poison every border chunk's padding area directly in the store, then assert no poison byte
/// ever surfaces through `to_buffer` or `get_slice_buffer`.
#[test]
fn padding_bytes_are_never_observable() {
    const POISON: u8 = 0xAA;

    let shape = Dims::new(&[7, 5]).unwrap();
    let chunk_shape = Dims::new(&[3, 2]).unwrap();
    let chunk_full = chunk_shape.full();
    let chunk_bytes = chunk_shape.product() as usize;
    let store = MemoryChunkStore::create(chunk_bytes, Codec::None);
    let mut array = Array::empty(ctx(1), chunk_shape, 1, None, store).unwrap();

    let n = shape.product();
    let src: Vec<u8> = (0..n).map(|v| ((v % 150) + 1) as u8).collect();
    array.from_buffer(shape, &src).unwrap();

    let shape_full = shape.full();
    let ext_shape = ndchunk::geometry::ext_shape(&shape_full, &chunk_full);
    let grid_shape = ndchunk::geometry::grid_shape(&ext_shape, &chunk_full);
    let zero = [0u64; 8];
    let regions = ndchunk::geometry::decompose_region(2, &chunk_full, &grid_shape, &zero, &shape_full);

    // Every chunk coordinate outside the region's logical [lo, hi) box is padding: poison it
    // directly in the store, bypassing the `Array` API (which never writes padding itself).
    for region in &regions {
        let mut buf = vec![0u8; chunk_bytes];
        array.store().decompress_chunk(region.chunk_index, &mut buf).unwrap();
        for r0 in 0..chunk_full[0] {
            for r1 in 0..chunk_full[1] {
                let is_logical = r0 >= region.lo[0] && r0 < region.hi[0] && r1 >= region.lo[1] && r1 < region.hi[1];
                if !is_logical {
                    let off = (r0 * chunk_full[1] + r1) as usize;
                    buf[off] = POISON;
                }
            }
        }
        array.store_mut().replace_chunk(region.chunk_index, &buf).unwrap();
    }

    let mut out = vec![0u8; n as usize];
    array.to_buffer(&mut out).unwrap();
    assert_eq!(out, src, "to_buffer must reproduce exactly the logical bytes, unaffected by poisoned padding");
    assert!(!out.contains(&POISON), "to_buffer leaked a padding poison byte");

    let mut region_buf = vec![0u8; 6 * 4];
    array
        .get_slice_buffer(Dims::new(&[0, 0]).unwrap(), Dims::new(&[6, 4]).unwrap(), &mut region_buf)
        .unwrap();
    assert!(!region_buf.contains(&POISON), "get_slice_buffer leaked a padding poison byte");
}

#[test]
fn repart_matches_get_slice_bit_for_bit() {
    let src: Vec<u8> = (0..(40 * 40 * 40u64)).map(|v| (v % 251) as u8).collect();
    let mut source = memory_array(&[13, 11, 9], 1);
    source.from_buffer(Dims::new(&[40, 40, 40]).unwrap(), &src).unwrap();

    let mut dest = memory_array(&[20, 20, 20], 1);
    array::repart(&mut dest, &source).unwrap();

    assert!(array::arrays_equal_data(&dest, &source).unwrap());
}

#[test]
fn persisted_array_round_trips_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("array.ndck");

    let shape = Dims::new(&[10, 9]).unwrap();
    let chunk_shape = Dims::new(&[4, 4]).unwrap();
    let chunk_bytes = chunk_shape.product() as usize * 4;
    let store = FileChunkStore::create(&path, chunk_bytes, Codec::None, true);
    let mut array = Array::empty(
        Context::new(CompressionParams::new(4).with_codec(Codec::None), DecompressionParams::default()),
        chunk_shape,
        4,
        None,
        store,
    )
    .unwrap();

    let n = shape.product();
    let src: Vec<u8> = (0..n as u32).flat_map(u32::to_le_bytes).collect();
    array.from_buffer(shape, &src).unwrap();

    let metadata = ndchunk::store::ChunkStoreMetadata {
        ndim: shape.rank() as u8,
        shape: shape.as_slice().to_vec(),
        chunk_shape: chunk_shape.as_slice().to_vec(),
        item_size: 4,
    };
    array.store_mut().set_metadata(metadata.to_bytes().unwrap());
    array.close().unwrap();

    let reopened = Array::<FileChunkStore>::from_file(
        Context::new(CompressionParams::new(4).with_codec(Codec::None), DecompressionParams::default()),
        &path,
        true,
    )
    .unwrap();
    assert_eq!(reopened.shape().unwrap().as_slice(), shape.as_slice());
    assert_eq!(reopened.chunk_shape().as_slice(), chunk_shape.as_slice());

    let mut out = vec![0u8; src.len()];
    reopened.to_buffer(&mut out).unwrap();
    assert_eq!(out, src);
}
