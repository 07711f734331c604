//! Block extraction: quads for the exposed faces of block voxels, either one quad per face (culling), or rectangles of
//! identical exposed faces merged into a single quad (greedy merging).

use ultraviolet::{IVec3, Vec3, Vec4};

use crate::cell::VoxelCell;
use crate::chunk::shape::PaddedShape;
use crate::chunk::volume::VoxelSource;
use crate::mesh::{Quad, QuadSink};

// Direction

#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Direction {
  PosX = 0,
  NegX = 1,
  PosY = 2,
  NegY = 3,
  PosZ = 4,
  NegZ = 5,
}

impl Direction {
  pub const ALL: [Direction; 6] = [Direction::PosX, Direction::NegX, Direction::PosY, Direction::NegY, Direction::PosZ, Direction::NegZ];

  /// Axis (`0` = x, `1` = y, `2` = z) this direction points along.
  #[inline]
  pub const fn axis(self) -> usize { self as usize / 2 }

  #[inline]
  pub const fn is_positive(self) -> bool { self as usize % 2 == 0 }

  #[inline]
  pub const fn sign(self) -> i32 { if self.is_positive() { 1 } else { -1 } }

  /// Axes spanning a face in this direction, ordered such that `u × v` is the outward normal.
  #[inline]
  pub const fn uv_axes(self) -> (usize, usize) {
    match self {
      Direction::PosX => (1, 2),
      Direction::NegX => (2, 1),
      Direction::PosY => (2, 0),
      Direction::NegY => (0, 2),
      Direction::PosZ => (0, 1),
      Direction::NegZ => (1, 0),
    }
  }

  #[inline]
  pub fn offset(self) -> IVec3 { axis_ivec3(self.axis(), self.sign()) }

  #[inline]
  pub fn normal(self) -> Vec3 { axis_vec3(self.axis(), self.sign() as f32) }

  /// Direction from a unit axis-aligned normal.
  #[inline]
  pub fn from_normal(normal: Vec3) -> Option<Direction> {
    Direction::ALL.into_iter().find(|d| (d.normal() - normal).mag_sq() < 1e-6)
  }
}

#[inline]
pub(crate) fn axis_ivec3(axis: usize, value: i32) -> IVec3 {
  let mut v = [0; 3];
  v[axis] = value;
  IVec3::new(v[0], v[1], v[2])
}

#[inline]
pub(crate) fn axis_vec3(axis: usize, value: f32) -> Vec3 {
  let mut v = [0.0; 3];
  v[axis] = value;
  Vec3::new(v[0], v[1], v[2])
}

#[inline]
pub(crate) fn ivec3_to_vec3(v: IVec3) -> Vec3 { Vec3::new(v.x as f32, v.y as f32, v.z as f32) }

#[inline]
pub(crate) fn ivec3_component(v: IVec3, axis: usize) -> i32 {
  match axis {
    0 => v.x,
    1 => v.y,
    _ => v.z,
  }
}

/// Quad on the `direction` face of the cell at logical position `cell`, spanning `width` cells along the face's u axis
/// and `height` cells along its v axis.
#[inline]
pub fn block_face(cell: IVec3, direction: Direction, width: u32, height: u32, material: u16) -> Quad {
  let (u_axis, v_axis) = direction.uv_axes();
  let (w, h) = (width as f32, height as f32);
  let origin = ivec3_to_vec3(cell) + if direction.is_positive() { axis_vec3(direction.axis(), 1.0) } else { Vec3::zero() };
  let u = axis_vec3(u_axis, w);
  let v = axis_vec3(v_axis, h);
  let material = material as f32;
  Quad {
    positions: [origin, origin + u, origin + u + v, origin + v],
    normals: [direction.normal(); 4],
    uvs: [
      Vec4::new(0.0, 0.0, material, 0.0),
      Vec4::new(w, 0.0, material, 0.0),
      Vec4::new(w, h, material, 0.0),
      Vec4::new(0.0, h, material, 0.0),
    ],
  }
}

/// Whether the `direction` face of `cell` is exposed: `cell` is a block and its neighbor `neighbor` is not. Air and
/// isosurface neighbors are both open.
#[inline]
pub fn is_face_exposed(cell: VoxelCell, neighbor: VoxelCell) -> bool {
  cell.is_block() && !neighbor.is_block()
}


// Strategy

#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BlockStrategy {
  Culling,
  #[default]
  Greedy,
}


// Extractor

/// Block extractor, keeping its greedy merging scratch buffers around for reuse.
#[derive(Default, Clone, Debug)]
pub struct BlockExtractor {
  mask: Vec<u16>,
  visited: Vec<bool>,
}

impl BlockExtractor {
  #[inline]
  pub fn new() -> Self { Self::default() }

  #[inline]
  pub fn extract(&mut self, source: &impl VoxelSource, strategy: BlockStrategy, sink: &mut impl QuadSink) {
    match strategy {
      BlockStrategy::Culling => Self::extract_culled(source, sink),
      BlockStrategy::Greedy => self.extract_greedy(source, sink),
    }
  }

  /// Emits a unit quad for every exposed face of every logical block.
  #[profiling::function]
  pub fn extract_culled(source: &impl VoxelSource, sink: &mut impl QuadSink) {
    let padding = PaddedShape::PADDING as i32;
    let padding = IVec3::new(padding, padding, padding);
    source.shape().for_each_logical(|pos| {
      let cell = source.get(pos);
      if !cell.is_block() { return; }
      for direction in Direction::ALL {
        if is_face_exposed(cell, source.get(pos + direction.offset())) {
          sink.push_quad(block_face(pos - padding, direction, 1, 1, cell.material()));
        }
      }
    });
  }

  /// Sweeps every slice perpendicular to each direction, merging exposed faces of identical material into maximal
  /// rectangles. Rectangles first grow along the v axis, then along the u axis while every cell of the next column
  /// extends to the same height.
  #[profiling::function]
  pub fn extract_greedy(&mut self, source: &impl VoxelSource, sink: &mut impl QuadSink) {
    let shape = source.shape();
    let logical = shape.logical();
    let logical = [logical.x as usize, logical.y as usize, logical.z as usize];
    let padding = PaddedShape::PADDING as i32;
    for direction in Direction::ALL {
      let axis = direction.axis();
      let (u_axis, v_axis) = direction.uv_axes();
      let (u_len, v_len) = (logical[u_axis], logical[v_axis]);
      let offset = direction.offset();
      let cell_position = |slice: usize, u: usize, v: usize| {
        let mut p = [0; 3];
        p[axis] = slice as i32 + padding;
        p[u_axis] = u as i32 + padding;
        p[v_axis] = v as i32 + padding;
        IVec3::new(p[0], p[1], p[2])
      };

      for slice in 0..logical[axis] {
        // Material of each exposed face in this slice, 0 where there is none. Blocks never have material 0.
        self.mask.clear();
        self.mask.resize(u_len * v_len, 0);
        self.visited.clear();
        self.visited.resize(u_len * v_len, false);
        for v in 0..v_len {
          for u in 0..u_len {
            let pos = cell_position(slice, u, v);
            let cell = source.get(pos);
            if is_face_exposed(cell, source.get(pos + offset)) {
              self.mask[u + v * u_len] = cell.material();
            }
          }
        }

        for u in 0..u_len {
          for v in 0..v_len {
            let material = self.mask[u + v * u_len];
            if material == 0 || self.visited[u + v * u_len] { continue; }
            let matches = |mask: &[u16], visited: &[bool], u: usize, v: usize| {
              let i = u + v * u_len;
              mask[i] == material && !visited[i]
            };

            let mut height = 1;
            while v + height < v_len && matches(&self.mask, &self.visited, u, v + height) {
              height += 1;
            }
            let mut width = 1;
            while u + width < u_len && (0..height).all(|h| matches(&self.mask, &self.visited, u + width, v + h)) {
              width += 1;
            }

            for du in 0..width {
              for dv in 0..height {
                self.visited[(u + du) + (v + dv) * u_len] = true;
              }
            }
            let cell = cell_position(slice, u, v) - IVec3::new(padding, padding, padding);
            sink.push_quad(block_face(cell, direction, width as u32, height as u32, material));
          }
        }
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use rand::prelude::*;
  use rustc_hash::FxHashSet;
  use ultraviolet::UVec3;

  use crate::chunk::volume::PaddedVolume;
  use crate::mesh::MeshAssembler;
  use crate::test_util::random_volume;

  use super::*;

  fn extract(volume: &PaddedVolume, strategy: BlockStrategy) -> Vec<Quad> {
    let mut quads = Vec::new();
    BlockExtractor::new().extract(volume, strategy, &mut quads);
    quads
  }

  type UnitFace = (i32, i32, i32, Direction, u16);

  /// Splits quads into the unit faces they cover.
  fn unit_faces(quads: &[Quad]) -> Vec<UnitFace> {
    let mut faces = Vec::new();
    for quad in quads {
      let direction = Direction::from_normal(quad.normals[0]).unwrap();
      let (u_axis, v_axis) = direction.uv_axes();
      let origin = quad.positions[0];
      let width = (quad.positions[1] - origin).mag().round() as i32;
      let height = (quad.positions[3] - origin).mag().round() as i32;
      let material = quad.uvs[0].z as u16;
      let origin = IVec3::new(origin.x.round() as i32, origin.y.round() as i32, origin.z.round() as i32);
      let origin = if direction.is_positive() { origin - direction.offset() } else { origin };
      for du in 0..width {
        for dv in 0..height {
          let cell = origin + axis_ivec3(u_axis, du) + axis_ivec3(v_axis, dv);
          faces.push((cell.x, cell.y, cell.z, direction, material));
        }
      }
    }
    faces
  }

  #[test]
  fn direction_table_is_right_handed() {
    for direction in Direction::ALL {
      let (u, v) = direction.uv_axes();
      assert_eq!(axis_vec3(u, 1.0).cross(axis_vec3(v, 1.0)), direction.normal(), "{:?}", direction);
      assert_ne!(u, direction.axis());
      assert_ne!(v, direction.axis());
      assert_eq!(Direction::from_normal(direction.normal()), Some(direction));
    }
  }

  #[test]
  fn single_block() {
    let mut volume = PaddedVolume::new(PaddedShape::cubic(3));
    volume.set_local(UVec3::new(0, 0, 0), VoxelCell::block(3));
    for strategy in [BlockStrategy::Culling, BlockStrategy::Greedy] {
      let mut assembler = MeshAssembler::new(volume.shape());
      BlockExtractor::new().extract(&volume, strategy, &mut assembler);
      let mesh = assembler.finish();
      assert_eq!(mesh.quad_count(), 6, "{:?}", strategy);
      assert_eq!(mesh.vertex_count(), 24, "{:?}", strategy);
      assert_eq!(mesh.index_count(), 36, "{:?}", strategy);
      for vertex in mesh.vertices() {
        assert_eq!(vertex.uv.z, 3.0);
        for c in [vertex.position.x, vertex.position.y, vertex.position.z] {
          assert!(c == 0.0 || c == 1.0);
        }
      }
    }
  }

  #[test]
  fn solid_single_cell_chunk() {
    let volume = PaddedVolume::from_fn(PaddedShape::cubic(1), |pos| {
      if pos == IVec3::new(1, 1, 1) { VoxelCell::block(1) } else { VoxelCell::AIR }
    });
    for strategy in [BlockStrategy::Culling, BlockStrategy::Greedy] {
      let quads = extract(&volume, strategy);
      assert_eq!(quads.len(), 6);
      for quad in &quads {
        let direction = Direction::from_normal(quad.normals[0]).unwrap();
        assert_eq!(quad.winding_normal(), direction.normal());
        assert_eq!(quad.uvs[2], Vec4::new(1.0, 1.0, 1.0, 0.0));
      }
    }
  }

  #[test]
  fn neighbor_blocks_in_padding_hide_faces() {
    let volume = PaddedVolume::from_fn(PaddedShape::cubic(1), |_| VoxelCell::block(1));
    assert!(extract(&volume, BlockStrategy::Culling).is_empty());
    assert!(extract(&volume, BlockStrategy::Greedy).is_empty());
  }

  #[test]
  fn isosurface_neighbors_are_open() {
    let volume = PaddedVolume::from_fn(PaddedShape::cubic(1), |pos| {
      if pos == IVec3::new(1, 1, 1) { VoxelCell::block(1) } else { VoxelCell::isosurface(2, 1.0) }
    });
    assert_eq!(extract(&volume, BlockStrategy::Culling).len(), 6);
  }

  #[test]
  fn greedy_merges_slab() {
    let mut volume = PaddedVolume::new(PaddedShape::cubic(4));
    for x in 0..4 {
      for z in 0..4 {
        volume.set_local(UVec3::new(x, 0, z), VoxelCell::block(5));
      }
    }
    let greedy = extract(&volume, BlockStrategy::Greedy);
    assert_eq!(greedy.len(), 6);
    assert_eq!(extract(&volume, BlockStrategy::Culling).len(), 16 * 2 + 4 * 4);
    let top = greedy.iter().find(|q| q.normals[0] == Vec3::unit_y()).unwrap();
    assert_eq!(top.uvs[2], Vec4::new(4.0, 4.0, 5.0, 0.0));
    assert!(top.positions.iter().all(|p| p.y == 1.0));
  }

  #[test]
  fn greedy_does_not_merge_different_materials() {
    let mut volume = PaddedVolume::new(PaddedShape::new(UVec3::new(2, 1, 1)));
    volume.set_local(UVec3::new(0, 0, 0), VoxelCell::block(1));
    volume.set_local(UVec3::new(1, 0, 0), VoxelCell::block(2));
    assert_eq!(extract(&volume, BlockStrategy::Greedy).len(), 10);
  }

  #[test]
  fn greedy_covers_same_faces_as_culling() {
    let mut rng = StdRng::seed_from_u64(0xb10c);
    for _ in 0..500 {
      let shape = PaddedShape::new(UVec3::new(rng.gen_range(1..6), rng.gen_range(1..6), rng.gen_range(1..6)));
      let volume = random_volume(&mut rng, shape);
      let mut culled = unit_faces(&extract(&volume, BlockStrategy::Culling));
      let mut greedy = unit_faces(&extract(&volume, BlockStrategy::Greedy));
      assert_eq!(culled.len(), greedy.len());
      let culled_set: FxHashSet<UnitFace> = culled.iter().copied().collect();
      assert_eq!(culled_set.len(), culled.len(), "Culling emitted a face twice");
      culled.sort_by_key(|f| (f.0, f.1, f.2, f.3 as u8, f.4));
      greedy.sort_by_key(|f| (f.0, f.1, f.2, f.3 as u8, f.4));
      assert_eq!(culled, greedy);
    }
  }

  #[test]
  fn greedy_winding_matches_normal() {
    let mut rng = StdRng::seed_from_u64(0xface);
    for _ in 0..100 {
      let volume = random_volume(&mut rng, PaddedShape::cubic(4));
      for quad in extract(&volume, BlockStrategy::Greedy) {
        let winding = quad.winding_normal().normalized();
        assert!((winding - quad.normals[0]).mag() < 1e-5);
      }
    }
  }
}
