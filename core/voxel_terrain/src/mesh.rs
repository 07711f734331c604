use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use ultraviolet::{Vec3, Vec4};

use crate::chunk::shape::PaddedShape;

// Vertex

#[repr(C)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
  pub position: Vec3,
  pub normal: Vec3,
  /// `(u, v, material, kind)` where `kind` is `0.0` for block and `1.0` for isosurface vertices.
  pub uv: Vec4,
}

impl Vertex {
  #[inline]
  pub fn new(position: Vec3, normal: Vec3, uv: Vec4) -> Self { Self { position, normal, uv } }
}


// Quad

/// Four vertices forming two triangles with indices [`Quad::INDICES`]. Corners are in counter-clockwise order when
/// looking at the front face.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quad {
  pub positions: [Vec3; 4],
  pub normals: [Vec3; 4],
  pub uvs: [Vec4; 4],
}

impl Quad {
  pub const INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

  #[inline]
  pub fn vertex(&self, i: usize) -> Vertex { Vertex::new(self.positions[i], self.normals[i], self.uvs[i]) }

  /// Normal of the plane through the first triangle, following the winding order.
  #[inline]
  pub fn winding_normal(&self) -> Vec3 {
    let [a, b, c, _] = self.positions;
    (b - a).cross(c - a)
  }
}


// Quad sink

/// Receives quads from extractors.
pub trait QuadSink {
  fn push_quad(&mut self, quad: Quad);
}

impl QuadSink for Vec<Quad> {
  #[inline]
  fn push_quad(&mut self, quad: Quad) { self.push(quad); }
}


// Mesh assembler

/// Output buffers pre-sized for the worst case number of faces of a chunk shape, and an atomic face counter that hands
/// out a unique slot to every emitted quad. Multiple extraction passes may write into the same assembler; their slots
/// never collide.
#[derive(Debug)]
pub struct MeshAssembler {
  max_faces: usize,
  vertices: Vec<Vertex>,
  indices: Vec<u32>,
  face_count: AtomicU32,
}

impl MeshAssembler {
  pub fn new(shape: PaddedShape) -> Self {
    Self::with_max_faces(shape.max_faces())
  }

  pub fn with_max_faces(max_faces: usize) -> Self {
    Self {
      max_faces,
      vertices: vec![Vertex::zeroed(); max_faces * 4],
      indices: vec![0; max_faces * 6],
      face_count: AtomicU32::new(0),
    }
  }


  #[inline]
  pub fn max_faces(&self) -> usize { self.max_faces }

  /// Whether this assembler can hold every face of a chunk of `shape`.
  #[inline]
  pub fn fits(&self, shape: PaddedShape) -> bool { shape.max_faces() <= self.max_faces }

  #[inline]
  pub fn face_count(&self) -> u32 { self.face_count.load(Ordering::Acquire) }
  #[inline]
  pub fn vertex_count(&self) -> usize { self.face_count() as usize * 4 }
  #[inline]
  pub fn index_count(&self) -> usize { self.face_count() as usize * 6 }


  /// Reserves the next face slot.
  ///
  /// # Panics
  ///
  /// Panics when all slots are taken, which means the worst case bound this assembler was sized for is wrong.
  #[inline]
  pub fn reserve_face(&self) -> usize {
    let face = self.face_count.fetch_add(1, Ordering::AcqRel) as usize;
    assert!(face < self.max_faces, "Mesh assembler overrun: face {} reserved, but only {} faces fit", face, self.max_faces);
    face
  }

  /// Writes `quad` into face slot `face`.
  #[inline]
  pub fn write_quad(&mut self, face: usize, quad: &Quad) {
    let vertex_offset = face * 4;
    for i in 0..4 {
      self.vertices[vertex_offset + i] = quad.vertex(i);
    }
    let index_offset = face * 6;
    let base = vertex_offset as u32;
    for (i, index) in Quad::INDICES.iter().enumerate() {
      self.indices[index_offset + i] = base + index;
    }
  }

  /// Vertices that have been written so far.
  #[inline]
  pub fn vertices(&self) -> &[Vertex] { &self.vertices[..self.vertex_count().min(self.vertices.len())] }
  /// Indices that have been written so far.
  #[inline]
  pub fn indices(&self) -> &[u32] { &self.indices[..self.index_count().min(self.indices.len())] }

  /// Copies out the written part of the buffers into a [`ChunkMesh`], and resets the face counter so that this
  /// assembler can be reused.
  #[profiling::function]
  pub fn finish(&mut self) -> ChunkMesh {
    let mesh = ChunkMesh::new(self.vertices().to_vec(), self.indices().to_vec());
    self.reset();
    mesh
  }

  #[inline]
  pub fn reset(&mut self) {
    *self.face_count.get_mut() = 0;
  }
}

impl QuadSink for MeshAssembler {
  #[inline]
  fn push_quad(&mut self, quad: Quad) {
    let face = self.reserve_face();
    self.write_quad(face, &quad);
  }
}


// Bounds

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
  pub min: Vec3,
  pub max: Vec3,
}

impl Bounds {
  #[inline]
  pub fn from_points(points: impl IntoIterator<Item=Vec3>) -> Option<Self> {
    let mut points = points.into_iter();
    let first = points.next()?;
    let mut bounds = Self { min: first, max: first };
    for point in points {
      bounds.min = bounds.min.min_by_component(point);
      bounds.max = bounds.max.max_by_component(point);
    }
    Some(bounds)
  }

  #[inline]
  pub fn size(&self) -> Vec3 { self.max - self.min }
}


// Mesh

/// Triangle mesh of a single chunk, in logical coordinates of that chunk.
#[derive(Clone, Default, Debug)]
pub struct ChunkMesh {
  vertices: Vec<Vertex>,
  indices: Vec<u32>,
  bounds: Option<Bounds>,
}

impl ChunkMesh {
  #[inline]
  pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
    let bounds = Bounds::from_points(vertices.iter().map(|v| v.position));
    Self { vertices, indices, bounds }
  }


  #[inline]
  pub fn is_empty(&self) -> bool { self.indices.is_empty() }

  #[inline]
  pub fn vertices(&self) -> &[Vertex] { &self.vertices }
  #[inline]
  pub fn indices(&self) -> &[u32] { &self.indices }

  #[inline]
  pub fn vertex_count(&self) -> usize { self.vertices.len() }
  #[inline]
  pub fn index_count(&self) -> usize { self.indices.len() }
  #[inline]
  pub fn quad_count(&self) -> usize { self.indices.len() / 6 }

  /// Axis-aligned bounds of all vertices, or `None` for an empty mesh.
  #[inline]
  pub fn bounds(&self) -> Option<Bounds> { self.bounds }

  /// Iterates over the triangles as vertex position triples.
  #[inline]
  pub fn triangles(&self) -> impl Iterator<Item=[Vec3; 3]> + '_ {
    self.indices.chunks_exact(3).map(|t| [
      self.vertices[t[0] as usize].position,
      self.vertices[t[1] as usize].position,
      self.vertices[t[2] as usize].position,
    ])
  }
}


#[cfg(test)]
mod tests {
  use std::mem::size_of;

  use super::*;

  fn unit_quad(z: f32) -> Quad {
    Quad {
      positions: [Vec3::new(0.0, 0.0, z), Vec3::new(1.0, 0.0, z), Vec3::new(1.0, 1.0, z), Vec3::new(0.0, 1.0, z)],
      normals: [Vec3::unit_z(); 4],
      uvs: [Vec4::zero(); 4],
    }
  }

  #[test]
  fn vertex_layout() {
    assert_eq!(size_of::<Vertex>(), 40);
  }

  #[test]
  fn winding_normal_of_counter_clockwise_quad() {
    assert_eq!(unit_quad(0.0).winding_normal(), Vec3::unit_z());
  }

  #[test]
  fn assembler_writes_indices_relative_to_slot() {
    let mut assembler = MeshAssembler::with_max_faces(2);
    assembler.push_quad(unit_quad(0.0));
    assembler.push_quad(unit_quad(1.0));
    assert_eq!(assembler.face_count(), 2);
    assert_eq!(assembler.indices(), &[0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);

    let mesh = assembler.finish();
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.index_count(), 12);
    assert_eq!(mesh.quad_count(), 2);
    assert_eq!(mesh.bounds(), Some(Bounds { min: Vec3::zero(), max: Vec3::one() }));
    assert_eq!(assembler.face_count(), 0);
    assert!(assembler.vertices().is_empty());
  }

  #[test]
  #[should_panic(expected = "Mesh assembler overrun")]
  fn assembler_overrun_panics() {
    let mut assembler = MeshAssembler::with_max_faces(1);
    assembler.push_quad(unit_quad(0.0));
    assembler.push_quad(unit_quad(1.0));
  }

  #[test]
  fn empty_mesh_has_no_bounds() {
    let mesh = MeshAssembler::new(PaddedShape::cubic(2)).finish();
    assert!(mesh.is_empty());
    assert_eq!(mesh.bounds(), None);
  }
}
