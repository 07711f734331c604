use std::sync::Arc;

use crate::cell::VoxelCell;
use crate::chunk::ChunkCoord;
use crate::chunk::volume::{PaddedVolume, VoxelSource};
use crate::mesh::ChunkMesh;
use crate::terrain::job::SharedAssembler;

// State

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChunkState {
  /// Registered, but generation has not been dispatched yet.
  Uninitialized,
  Generating,
  Meshing,
  /// Has an up-to-date mesh.
  Ready,
  /// Has voxels, but its mesh is missing or stale.
  Dirty,
}


// Handle

#[derive(Debug)]
pub struct ChunkHandle {
  coord: ChunkCoord,
  pub(crate) state: ChunkState,
  pub(crate) voxels: Option<Arc<PaddedVolume>>,
  pub(crate) mesh: Option<Arc<ChunkMesh>>,
  pub(crate) mesh_count: u64,
  /// Sticky: set by edits and neighbor changes, cleared when a remesh is dispatched.
  pub(crate) dirty: bool,
  pub(crate) generation: u64,
  pub(crate) in_flight: Option<InFlight>,
}

#[derive(Debug)]
pub(crate) struct InFlight {
  pub generation: u64,
  pub assembler: SharedAssembler,
}

impl ChunkHandle {
  #[inline]
  pub(crate) fn new(coord: ChunkCoord) -> Self {
    Self {
      coord,
      state: ChunkState::Uninitialized,
      voxels: None,
      mesh: None,
      mesh_count: 0,
      dirty: false,
      generation: 0,
      in_flight: None,
    }
  }


  #[inline]
  pub fn coord(&self) -> ChunkCoord { self.coord }
  #[inline]
  pub fn state(&self) -> ChunkState { self.state }

  #[inline]
  pub fn is_generated(&self) -> bool { self.voxels.is_some() }
  #[inline]
  pub fn is_meshing(&self) -> bool { self.in_flight.is_some() }
  /// Whether a remesh is needed, either because the chunk is dirty or because edits arrived while meshing.
  #[inline]
  pub fn is_dirty(&self) -> bool { self.dirty || self.state == ChunkState::Dirty }

  #[inline]
  pub fn volume(&self) -> Option<&Arc<PaddedVolume>> { self.voxels.as_ref() }
  /// Padded voxel array of this chunk, or an empty slice if it has not been generated yet.
  #[inline]
  pub fn voxels(&self) -> &[VoxelCell] {
    match &self.voxels {
      Some(volume) => volume.voxels(),
      None => &[],
    }
  }

  /// Most recently completed mesh, which may be stale while the chunk is dirty or meshing.
  #[inline]
  pub fn mesh(&self) -> Option<&Arc<ChunkMesh>> { self.mesh.as_ref() }
  /// Number of remeshes of this chunk that have completed.
  #[inline]
  pub fn mesh_count(&self) -> u64 { self.mesh_count }


  /// Takes the in-flight remesh if it was dispatched with `generation`.
  #[inline]
  pub(crate) fn take_in_flight(&mut self, generation: u64) -> Option<InFlight> {
    if self.in_flight.as_ref().map_or(false, |f| f.generation == generation) { self.in_flight.take() } else { None }
  }

  /// Marks this chunk as needing a remesh. Has no effect before generation has completed, as completing generation
  /// always marks the chunk dirty.
  #[inline]
  pub(crate) fn mark_dirty(&mut self) {
    if !self.is_generated() { return; }
    self.dirty = true;
    if self.state == ChunkState::Ready {
      self.state = ChunkState::Dirty;
    }
  }
}


#[cfg(test)]
mod tests {
  use crate::chunk::shape::PaddedShape;

  use super::*;

  #[test]
  fn mark_dirty_requires_voxels() {
    let mut handle = ChunkHandle::new(ChunkCoord::new(0, 0, 0));
    handle.mark_dirty();
    assert!(!handle.is_dirty());
    assert!(handle.voxels().is_empty());

    handle.voxels = Some(Arc::new(PaddedVolume::new(PaddedShape::cubic(2))));
    handle.state = ChunkState::Ready;
    handle.mark_dirty();
    assert_eq!(handle.state(), ChunkState::Dirty);
    assert_eq!(handle.voxels().len(), 64);
  }

  #[test]
  fn mark_dirty_while_meshing_is_sticky() {
    let mut handle = ChunkHandle::new(ChunkCoord::new(0, 0, 0));
    handle.voxels = Some(Arc::new(PaddedVolume::new(PaddedShape::cubic(2))));
    handle.state = ChunkState::Meshing;
    handle.mark_dirty();
    assert_eq!(handle.state(), ChunkState::Meshing);
    assert!(handle.is_dirty());
  }
}
