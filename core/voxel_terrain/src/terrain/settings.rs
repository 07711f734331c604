use thiserror::Error;
use ultraviolet::UVec3;

use crate::block::BlockStrategy;
use crate::chunk::shape::PaddedShape;

// Settings

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TerrainSettings {
  /// Logical cells per chunk along each axis.
  pub chunk_size: UVec3,
  pub block_strategy: BlockStrategy,
  pub job_queue_worker_threads: usize,
  /// Maximum number of chunks being remeshed at the same time.
  pub max_concurrent_remeshes: usize,
  /// Number of idle mesh assemblers kept around for reuse.
  pub mesh_assembler_cache_size: usize,
}

impl Default for TerrainSettings {
  fn default() -> Self {
    Self {
      chunk_size: UVec3::new(16, 16, 16),
      block_strategy: BlockStrategy::Greedy,
      job_queue_worker_threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
      max_concurrent_remeshes: 16,
      mesh_assembler_cache_size: 8,
    }
  }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum SettingsError {
  #[error("Chunk size {0:?} is zero along at least one axis")]
  ZeroChunkSize(UVec3),
  #[error("Chunk size {0:?} has more faces than can be indexed with 32-bit indices")]
  ChunkSizeTooLarge(UVec3),
  #[error("Job queue worker thread count must be at least 1")]
  ZeroWorkerThreads,
  #[error("Maximum number of concurrent remeshes must be at least 1")]
  ZeroConcurrentRemeshes,
}

impl TerrainSettings {
  #[inline]
  pub fn shape(&self) -> PaddedShape { PaddedShape::new(self.chunk_size) }

  pub fn check(&self) -> Result<(), SettingsError> {
    let size = self.chunk_size;
    if size.x == 0 || size.y == 0 || size.z == 0 {
      return Err(SettingsError::ZeroChunkSize(size));
    }
    // Vertex indices of a worst case mesh must fit in 32 bits.
    if self.shape().max_faces() as u64 * 4 > u32::MAX as u64 {
      return Err(SettingsError::ChunkSizeTooLarge(size));
    }
    if self.job_queue_worker_threads == 0 {
      return Err(SettingsError::ZeroWorkerThreads);
    }
    if self.max_concurrent_remeshes == 0 {
      return Err(SettingsError::ZeroConcurrentRemeshes);
    }
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_is_valid() {
    assert_eq!(TerrainSettings::default().check(), Ok(()));
  }

  #[test]
  fn invalid_settings() {
    let settings = TerrainSettings { chunk_size: UVec3::new(16, 0, 16), ..TerrainSettings::default() };
    assert_eq!(settings.check(), Err(SettingsError::ZeroChunkSize(UVec3::new(16, 0, 16))));
    let settings = TerrainSettings { chunk_size: UVec3::new(4096, 4096, 4096), ..TerrainSettings::default() };
    assert_eq!(settings.check(), Err(SettingsError::ChunkSizeTooLarge(UVec3::new(4096, 4096, 4096))));
    let settings = TerrainSettings { job_queue_worker_threads: 0, ..TerrainSettings::default() };
    assert_eq!(settings.check(), Err(SettingsError::ZeroWorkerThreads));
    let settings = TerrainSettings { max_concurrent_remeshes: 0, ..TerrainSettings::default() };
    assert_eq!(settings.check(), Err(SettingsError::ZeroConcurrentRemeshes));
  }
}
