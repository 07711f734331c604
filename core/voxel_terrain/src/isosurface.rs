//! Dual contouring of the density field of isosurface voxels. Every sign change between two neighboring non-block cells
//! emits a quad connecting the feature points of the four dual cells around the edge between them.
//!
//! Dual cell `c` is the cube spanned by the centers of cells `c` to `c + (1, 1, 1)`. Positions are in the same frame as
//! block faces: logical cell `l` is the unit cube at `l`, and its density is sampled at its center `l + 0.5`.
//!
//! A chunk owns the edges that end in one of its logical cells, `pos - axis -> pos`. The edge from its last logical
//! layer into the positive padding belongs to the neighbor, so every edge on a chunk boundary is emitted once.

use ultraviolet::{IVec3, Vec3, Vec4};

use crate::block::{axis_ivec3, ivec3_to_vec3};
use crate::cell::{sign_changed, VoxelCell};
use crate::chunk::shape::PaddedShape;
use crate::chunk::volume::VoxelSource;
use crate::mesh::{Quad, QuadSink};

// Dual vertex

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DualVertex {
  /// Feature point relative to the dual cell's minimum corner, inside `[0, 1]` on every axis.
  pub feature_point: Vec3,
  /// Unit outward normal.
  pub normal: Vec3,
}

pub const FALLBACK_NORMAL: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };
pub const CENTROID: Vec3 = Vec3 { x: 0.5, y: 0.5, z: 0.5 };

/// Computes the feature point and normal of dual cell `cell` (padded coordinates of its minimum corner).
#[inline]
pub fn dual_vertex(source: &impl VoxelSource, cell: IVec3) -> DualVertex {
  let corners = CORNERS.map(|[x, y, z]| source.get(cell + IVec3::new(x, y, z)));
  let feature_point = feature_point(&corners);
  DualVertex {
    feature_point,
    normal: normal(&corners, feature_point),
  }
}

/// Average of the zero crossings on the edges of a dual cell with `corners`, or its centroid when no edge crosses.
/// Edges touching a block are skipped.
#[inline]
fn feature_point(corners: &[VoxelCell; 8]) -> Vec3 {
  let mut count = 0;
  let mut sum = Vec3::zero();
  for &[a, b] in EDGE_TO_CORNER_INDICES.iter() {
    let (a, b) = (a as usize, b as usize);
    let (cell_a, cell_b) = (corners[a], corners[b]);
    if cell_a.is_block() || cell_b.is_block() || !sign_changed(cell_a, cell_b) { continue; }
    let (density_a, density_b) = (cell_a.density(), cell_b.density());
    let t = ((0.0 - density_a) / (density_b - density_a)).clamp(0.0, 1.0);
    if !t.is_finite() { continue; }
    let position_a = corner_position(a);
    let position_b = corner_position(b);
    sum += position_a + (position_b - position_a) * t;
    count += 1;
  }
  if count == 0 { return CENTROID; }
  let feature_point = sum / count as f32;
  if feature_point.x.is_finite() && feature_point.y.is_finite() && feature_point.z.is_finite() {
    feature_point
  } else {
    CENTROID
  }
}

/// Negated density gradient at position `at` inside a dual cell with `corners`, normalized. Along each axis this is the
/// central difference across the dual cell, interpolated over the other two axes at `at`. Falls back to
/// [`FALLBACK_NORMAL`] when the gradient vanishes.
#[inline]
fn normal(corners: &[VoxelCell; 8], at: Vec3) -> Vec3 {
  let d = corners.map(|c| c.density());
  let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
  // Corner index bits are (x, y, z) = (1, 2, 4).
  let gx = lerp(lerp(d[1] - d[0], d[3] - d[2], at.y), lerp(d[5] - d[4], d[7] - d[6], at.y), at.z);
  let gy = lerp(lerp(d[2] - d[0], d[3] - d[1], at.x), lerp(d[6] - d[4], d[7] - d[5], at.x), at.z);
  let gz = lerp(lerp(d[4] - d[0], d[5] - d[1], at.x), lerp(d[6] - d[2], d[7] - d[3], at.x), at.y);
  let gradient = Vec3::new(gx, gy, gz);
  let mag = gradient.mag();
  if !(mag > f32::EPSILON) || !mag.is_finite() { return FALLBACK_NORMAL; }
  let normal = -gradient / mag;
  if normal.x.is_finite() && normal.y.is_finite() && normal.z.is_finite() {
    normal
  } else {
    FALLBACK_NORMAL
  }
}

/// Material of a quad between `a` and `b`: the material of the inside cell, or of the other cell when the inside cell
/// has no material.
#[inline]
pub fn quad_material(a: VoxelCell, b: VoxelCell) -> u16 {
  let (inside, other) = if a.is_inside() { (a, b) } else { (b, a) };
  if inside.material() != 0 { inside.material() } else { other.material() }
}


// Extractor

/// Isosurface extractor, caching dual vertices per dual cell during a single extraction.
#[derive(Default, Clone, Debug)]
pub struct IsosurfaceExtractor {
  dual_vertices: Vec<Option<DualVertex>>,
}

impl IsosurfaceExtractor {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Emits a quad for every sign change along the x, y, and z edges ending at each logical cell, where both cells of the
  /// edge are not blocks.
  #[profiling::function]
  pub fn extract(&mut self, source: &impl VoxelSource, sink: &mut impl QuadSink) {
    let shape = source.shape();
    self.dual_vertices.clear();
    self.dual_vertices.resize(shape.padded_len(), None);
    let padding = PaddedShape::PADDING as i32;
    // Moves the center of padded cell `p` to logical position `p - padding + 0.5`.
    let offset = CENTROID - ivec3_to_vec3(IVec3::new(padding, padding, padding));

    shape.for_each_logical(|pos| {
      let neighbor = source.get(pos);
      if neighbor.is_block() { return; }
      for (axis, adjacent) in ADJACENT.iter().enumerate() {
        let start = pos - axis_ivec3(axis, 1);
        let cell = source.get(start);
        if cell.is_block() || !sign_changed(cell, neighbor) { continue; }

        let mut positions = [Vec3::zero(); 4];
        let mut normals = [Vec3::zero(); 4];
        for (i, &[x, y, z]) in adjacent.iter().enumerate() {
          let dual_cell = start + IVec3::new(x, y, z);
          let dual_vertex = self.dual_vertex(source, shape, dual_cell);
          positions[i] = ivec3_to_vec3(dual_cell) + offset + dual_vertex.feature_point;
          normals[i] = dual_vertex.normal;
        }
        if !cell.is_inside() {
          positions.reverse();
          normals.reverse();
        }
        let material = quad_material(cell, neighbor) as f32;
        sink.push_quad(Quad {
          positions,
          normals,
          uvs: [Vec4::new(0.0, 0.0, material, 1.0); 4],
        });
      }
    });
  }

  #[inline]
  fn dual_vertex(&mut self, source: &impl VoxelSource, shape: PaddedShape, dual_cell: IVec3) -> DualVertex {
    let Some(index) = shape.index(dual_cell) else {
      return dual_vertex(source, dual_cell);
    };
    if let Some(dual_vertex) = self.dual_vertices[index] {
      return dual_vertex;
    }
    let dual_vertex = dual_vertex(source, dual_cell);
    self.dual_vertices[index] = Some(dual_vertex);
    dual_vertex
  }
}


// Tables

/// Offsets of the corners of a dual cell; corner index bits are (x, y, z) = (1, 2, 4).
const CORNERS: [[i32; 3]; 8] = [
  [0, 0, 0],
  [1, 0, 0],
  [0, 1, 0],
  [1, 1, 0],
  [0, 0, 1],
  [1, 0, 1],
  [0, 1, 1],
  [1, 1, 1],
];

const EDGE_TO_CORNER_INDICES: [[u8; 2]; 12] = [
  [0b000, 0b001],
  [0b000, 0b010],
  [0b000, 0b100],
  [0b001, 0b011],
  [0b001, 0b101],
  [0b010, 0b011],
  [0b010, 0b110],
  [0b011, 0b111],
  [0b100, 0b101],
  [0b100, 0b110],
  [0b101, 0b111],
  [0b110, 0b111],
];

/// Minimum corners of the four dual cells around the edge from a cell to its neighbor along each axis, relative to the
/// cell, in counter-clockwise order around the axis.
const ADJACENT: [[[i32; 3]; 4]; 3] = [
  [[0, 0, 0], [0, -1, 0], [0, -1, -1], [0, 0, -1]],
  [[0, 0, 0], [0, 0, -1], [-1, 0, -1], [-1, 0, 0]],
  [[0, 0, 0], [-1, 0, 0], [-1, -1, 0], [0, -1, 0]],
];

#[inline]
fn corner_position(corner: usize) -> Vec3 {
  let [x, y, z] = CORNERS[corner];
  Vec3::new(x as f32, y as f32, z as f32)
}
