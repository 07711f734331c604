use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::warn;

use crate::chunk::ChunkCoord;
use crate::chunk::volume::{ChunkLookup, PaddedVolume, VoxelSource};

impl<V: VoxelSource, S: BuildHasher> ChunkLookup for HashMap<ChunkCoord, V, S> {
  type Source = V;

  #[inline]
  fn try_get_chunk(&self, coord: ChunkCoord) -> Option<&V> { self.get(&coord) }
}

/// Copies the boundary cells of each of the 26 neighbors of chunk `coord` into the padding ring of `volume`. Padding
/// facing an absent neighbor keeps its previous value. Returns the number of neighbors that were copied from.
#[profiling::function]
pub fn stitch(volume: &mut PaddedVolume, coord: ChunkCoord, lookup: &impl ChunkLookup) -> usize {
  let shape = volume.shape();
  let logical = shape.logical();
  let mut stitched = 0;
  for dz in -1..=1 {
    for dy in -1..=1 {
      for dx in -1..=1 {
        if dx == 0 && dy == 0 && dz == 0 { continue; }
        let neighbor_coord = coord.offset(dx, dy, dz);
        let Some(neighbor) = lookup.try_get_chunk(neighbor_coord) else { continue; };
        if neighbor.shape() != shape {
          warn!("Not stitching chunk {:?} from neighbor {:?}: shape {:?} differs from {:?}", coord, neighbor_coord, neighbor.shape(), shape);
          continue;
        }
        let src = neighbor.voxels();
        let (src_y, dst_y) = ranges(dy, logical.y);
        let (src_z, dst_z) = ranges(dz, logical.z);
        let (src_x, dst_x) = ranges(dx, logical.x);
        let row_len = (src_x.1 - src_x.0 + 1) as usize;
        let dst = volume.cells_mut();
        for (sz, tz) in (src_z.0..=src_z.1).zip(dst_z.0..=dst_z.1) {
          for (sy, ty) in (src_y.0..=src_y.1).zip(dst_y.0..=dst_y.1) {
            let s = shape.index_unchecked(src_x.0, sy, sz);
            let t = shape.index_unchecked(dst_x.0, ty, tz);
            dst[t..t + row_len].copy_from_slice(&src[s..s + row_len]);
          }
        }
        stitched += 1;
      }
    }
  }
  stitched
}

/// Inclusive source and destination ranges along one axis for a neighbor in direction `d`.
#[inline]
fn ranges(d: i32, logical: u32) -> ((u32, u32), (u32, u32)) {
  match d {
    -1 => ((logical, logical), (0, 0)),
    0 => ((1, logical), (1, logical)),
    _ => ((1, 1), (logical + 1, logical + 1)),
  }
}


#[cfg(test)]
mod tests {
  use rustc_hash::FxHashMap;
  use ultraviolet::{IVec3, UVec3};

  use crate::block::ivec3_to_vec3;
  use crate::cell::VoxelCell;
  use crate::chunk::chunk_to_world;
  use crate::chunk::shape::PaddedShape;
  use crate::generate::{DensityGenerator, Sphere, SphereSettings};
  use crate::isosurface::dual_vertex;

  use super::*;

  fn marked_volume(shape: PaddedShape, material: u16) -> PaddedVolume {
    PaddedVolume::from_fn(shape, |_| VoxelCell::block(material))
  }

  #[test]
  fn copies_faces_edges_and_corners() {
    let shape = PaddedShape::new(UVec3::new(2, 3, 4));
    let mut lookup = FxHashMap::default();
    let mut material = 1;
    ChunkCoord::new(0, 0, 0).for_each_neighbor(|coord| {
      lookup.insert(coord, marked_volume(shape, material));
      material += 1;
    });
    let mut volume = PaddedVolume::new(shape);
    assert_eq!(stitch(&mut volume, ChunkCoord::new(0, 0, 0), &lookup), 26);

    let padded = shape.padded();
    for z in 0..padded.z as i32 {
      for y in 0..padded.y as i32 {
        for x in 0..padded.x as i32 {
          let pos = IVec3::new(x, y, z);
          let cell = volume.get(pos);
          if shape.is_logical(pos) {
            assert_eq!(cell, VoxelCell::AIR);
            continue;
          }
          let d = |c: i32, l: u32| if c == 0 { -1 } else if c as u32 == l + 1 { 1 } else { 0 };
          let neighbor = ChunkCoord::new(d(x, shape.logical().x), d(y, shape.logical().y), d(z, shape.logical().z));
          assert_eq!(cell, lookup[&neighbor].get(IVec3::new(1, 1, 1)), "Padding {:?} not copied from {:?}", pos, neighbor);
        }
      }
    }
  }

  #[test]
  fn copies_boundary_cells_of_neighbor() {
    let shape = PaddedShape::cubic(3);
    // Neighbor at +x: its logical cells are numbered by position.
    let neighbor = PaddedVolume::from_fn(shape, |pos| VoxelCell::block((1 + pos.x + 4 * pos.y + 16 * pos.z) as u16));
    let mut lookup = FxHashMap::default();
    lookup.insert(ChunkCoord::new(1, 0, 0), neighbor.clone());
    let mut volume = PaddedVolume::new(shape);
    assert_eq!(stitch(&mut volume, ChunkCoord::new(0, 0, 0), &lookup), 1);
    for z in 1..=3 {
      for y in 1..=3 {
        assert_eq!(volume.get(IVec3::new(4, y, z)), neighbor.get(IVec3::new(1, y, z)));
        assert_eq!(volume.get(IVec3::new(0, y, z)), VoxelCell::AIR);
      }
    }
  }

  #[test]
  fn absent_neighbors_keep_padding() {
    let shape = PaddedShape::cubic(2);
    let lookup: FxHashMap<ChunkCoord, PaddedVolume> = FxHashMap::default();
    let mut volume = marked_volume(shape, 9);
    assert_eq!(stitch(&mut volume, ChunkCoord::new(0, 0, 0), &lookup), 0);
    assert!(volume.voxels().iter().all(|c| *c == VoxelCell::block(9)));
  }

  #[test]
  fn mismatched_shape_is_skipped() {
    let mut lookup = FxHashMap::default();
    lookup.insert(ChunkCoord::new(0, 1, 0), marked_volume(PaddedShape::cubic(3), 1));
    let mut volume = PaddedVolume::new(PaddedShape::cubic(2));
    assert_eq!(stitch(&mut volume, ChunkCoord::new(0, 0, 0), &lookup), 0);
  }

  #[test]
  fn feature_points_match_across_chunk_boundary() {
    let shape = PaddedShape::cubic(8);
    let generator = Sphere::new(SphereSettings { center: [8.3, 4.1, 3.7], radius: 5.2, material: 1 });
    let a_coord = ChunkCoord::new(0, 0, 0);
    let b_coord = ChunkCoord::new(1, 0, 0);
    let mut chunks = FxHashMap::default();
    for coord in [a_coord, b_coord] {
      let mut volume = generator.generate_chunk(coord, shape);
      volume.fill_padding(VoxelCell::AIR);
      chunks.insert(coord, volume);
    }
    let mut a = chunks[&a_coord].clone();
    let mut b = chunks[&b_coord].clone();
    stitch(&mut a, a_coord, &chunks);
    stitch(&mut b, b_coord, &chunks);

    let l = shape.logical().x as i32;
    let a_origin = ivec3_to_vec3(chunk_to_world(a_coord, shape.logical()));
    let b_origin = ivec3_to_vec3(chunk_to_world(b_coord, shape.logical()));
    let mut compared = 0;
    // Dual cells on the shared face whose corners only touch cells of the two chunks.
    for z in 1..l {
      for y in 1..l {
        let in_a = dual_vertex(&a, IVec3::new(l, y, z));
        let in_b = dual_vertex(&b, IVec3::new(0, y, z));
        let world_a = a_origin + ivec3_to_vec3(IVec3::new(l - 1, y - 1, z - 1)) + in_a.feature_point;
        let world_b = b_origin + ivec3_to_vec3(IVec3::new(-1, y - 1, z - 1)) + in_b.feature_point;
        assert!((world_a - world_b).mag() <= 1e-5, "{:?} != {:?}", world_a, world_b);
        assert!((in_a.normal - in_b.normal).mag() <= 1e-5);
        if in_a.feature_point != crate::isosurface::CENTROID { compared += 1; }
      }
    }
    assert!(compared > 0, "Surface does not cross the shared face");
  }
}
