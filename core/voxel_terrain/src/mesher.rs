use crate::block::{BlockExtractor, BlockStrategy};
use crate::chunk::volume::VoxelSource;
use crate::isosurface::IsosurfaceExtractor;
use crate::mesh::{ChunkMesh, MeshAssembler};

/// Runs both extraction passes over a padded volume, keeping the scratch buffers of the extractors for reuse.
#[derive(Default, Clone, Debug)]
pub struct Mesher {
  blocks: BlockExtractor,
  isosurface: IsosurfaceExtractor,
}

impl Mesher {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Runs the block pass and then the isosurface pass on `source`, writing into `assembler`. Returns the number of
  /// faces in the assembler afterwards.
  ///
  /// # Panics
  ///
  /// Panics if `assembler` cannot hold the worst case number of faces of `source`'s shape.
  #[profiling::function]
  pub fn extract(&mut self, source: &impl VoxelSource, strategy: BlockStrategy, assembler: &mut MeshAssembler) -> u32 {
    self.extract_blocks(source, strategy, assembler);
    self.extract_isosurface(source, assembler)
  }

  #[inline]
  pub fn extract_blocks(&mut self, source: &impl VoxelSource, strategy: BlockStrategy, assembler: &mut MeshAssembler) -> u32 {
    assert!(assembler.fits(source.shape()), "Mesh assembler with {} faces is too small for {:?}", assembler.max_faces(), source.shape());
    self.blocks.extract(source, strategy, assembler);
    assembler.face_count()
  }

  #[inline]
  pub fn extract_isosurface(&mut self, source: &impl VoxelSource, assembler: &mut MeshAssembler) -> u32 {
    assert!(assembler.fits(source.shape()), "Mesh assembler with {} faces is too small for {:?}", assembler.max_faces(), source.shape());
    self.isosurface.extract(source, assembler);
    assembler.face_count()
  }

  /// Meshes `source` into a newly allocated assembler, returning the trimmed mesh.
  #[inline]
  pub fn mesh(&mut self, source: &impl VoxelSource, strategy: BlockStrategy) -> ChunkMesh {
    let mut assembler = MeshAssembler::new(source.shape());
    self.extract(source, strategy, &mut assembler);
    assembler.finish()
  }
}
