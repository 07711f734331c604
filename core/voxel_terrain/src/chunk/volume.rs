use std::sync::Arc;

use ultraviolet::{IVec3, UVec3};

use crate::cell::VoxelCell;
use crate::chunk::ChunkCoord;
use crate::chunk::shape::PaddedShape;

// Voxel source

/// Read access to a padded voxel array.
pub trait VoxelSource {
  fn shape(&self) -> PaddedShape;

  /// All cells in padded index order, see [`PaddedShape::index`].
  fn voxels(&self) -> &[VoxelCell];

  /// Gets the cell at padded position `pos`, or [`VoxelCell::AIR`] if `pos` lies outside of the padded array.
  #[inline]
  fn get(&self, pos: IVec3) -> VoxelCell {
    self.shape().index(pos)
      .and_then(|i| self.voxels().get(i).copied())
      .unwrap_or(VoxelCell::AIR)
  }
}

impl<T: VoxelSource + ?Sized> VoxelSource for &T {
  #[inline]
  fn shape(&self) -> PaddedShape { (**self).shape() }
  #[inline]
  fn voxels(&self) -> &[VoxelCell] { (**self).voxels() }
}

impl<T: VoxelSource + ?Sized> VoxelSource for Arc<T> {
  #[inline]
  fn shape(&self) -> PaddedShape { (**self).shape() }
  #[inline]
  fn voxels(&self) -> &[VoxelCell] { (**self).voxels() }
}


// Chunk lookup

/// Looks up the voxels of other chunks by coordinate. Returns `None` for chunks that are absent or not yet generated.
pub trait ChunkLookup {
  type Source: VoxelSource;

  fn try_get_chunk(&self, coord: ChunkCoord) -> Option<&Self::Source>;
}


// Padded volume

/// Owned padded voxel array of a single chunk.
#[derive(Clone, Debug)]
pub struct PaddedVolume {
  shape: PaddedShape,
  cells: Vec<VoxelCell>,
}

impl PaddedVolume {
  /// Creates a volume of `shape` filled with air.
  #[inline]
  pub fn new(shape: PaddedShape) -> Self {
    Self { shape, cells: vec![VoxelCell::AIR; shape.padded_len()] }
  }

  /// Creates a volume of `shape` from `cells`, returning `None` if the number of cells does not match the padded shape.
  #[inline]
  pub fn from_cells(shape: PaddedShape, cells: Vec<VoxelCell>) -> Option<Self> {
    if cells.len() != shape.padded_len() { return None; }
    Some(Self { shape, cells })
  }

  /// Creates a volume of `shape` by running `f` for every padded position.
  pub fn from_fn(shape: PaddedShape, mut f: impl FnMut(IVec3) -> VoxelCell) -> Self {
    let padded = shape.padded();
    let mut cells = Vec::with_capacity(shape.padded_len());
    for z in 0..padded.z as i32 {
      for y in 0..padded.y as i32 {
        for x in 0..padded.x as i32 {
          cells.push(f(IVec3::new(x, y, z)));
        }
      }
    }
    Self { shape, cells }
  }


  #[inline]
  pub fn cells_mut(&mut self) -> &mut [VoxelCell] { &mut self.cells }

  #[inline]
  pub fn into_cells(self) -> Vec<VoxelCell> { self.cells }

  /// Sets the cell at padded position `pos`, returning `false` without effect if `pos` lies outside of the volume.
  #[inline]
  pub fn set(&mut self, pos: IVec3, cell: VoxelCell) -> bool {
    match self.shape.index(pos) {
      Some(i) => {
        self.cells[i] = cell;
        true
      }
      None => false,
    }
  }

  /// Gets the cell at logical position `local` (`0..logical`).
  #[inline]
  pub fn get_local(&self, local: UVec3) -> VoxelCell {
    self.get(local_to_padded(local))
  }

  /// Sets the cell at logical position `local` (`0..logical`), returning `false` without effect if `local` lies outside
  /// of the logical volume.
  #[inline]
  pub fn set_local(&mut self, local: UVec3, cell: VoxelCell) -> bool {
    let pos = local_to_padded(local);
    if !self.shape.is_logical(pos) { return false; }
    self.set(pos, cell)
  }

  /// Fills the padding ring with `cell`, leaving logical cells untouched.
  pub fn fill_padding(&mut self, cell: VoxelCell) {
    let padded = self.shape.padded();
    for z in 0..padded.z as i32 {
      for y in 0..padded.y as i32 {
        for x in 0..padded.x as i32 {
          let pos = IVec3::new(x, y, z);
          if !self.shape.is_logical(pos) {
            self.set(pos, cell);
          }
        }
      }
    }
  }
}

impl VoxelSource for PaddedVolume {
  #[inline]
  fn shape(&self) -> PaddedShape { self.shape }
  #[inline]
  fn voxels(&self) -> &[VoxelCell] { &self.cells }
}

#[inline]
fn local_to_padded(local: UVec3) -> IVec3 {
  let padding = PaddedShape::PADDING as i32;
  IVec3::new(local.x as i32 + padding, local.y as i32 + padding, local.z as i32 + padding)
}
