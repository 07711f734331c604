//! Streams a cube of noise terrain chunks through generation and remeshing, applies a sphere edit, and reports mesh
//! statistics.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use ultraviolet::Vec3;

use voxel_terrain::chunk::ChunkCoord;
use voxel_terrain::generate::{DensityGenerator, NoiseTerrain};
use voxel_terrain::terrain::Terrain;

use crate::config::{CONFIG_FILE_PATH, Config, deserialize_config};
use crate::logging::Tracing;

mod config;
mod logging;

fn main() -> ExitCode {
  #[cfg(feature = "profile-with-tracy")]
  tracy_client::Client::start();
  profiling::register_thread!();
  dotenvy::dotenv().ok();
  let _tracing = Tracing::init_from_env();

  let config_path = std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(CONFIG_FILE_PATH));
  let config: Config = deserialize_config(&config_path);
  info!("Using config from '{}': {:?}", config_path.display(), config);

  let generator = NoiseTerrain::new(config.generator);
  let mut terrain = match Terrain::new(config.terrain, generator) {
    Ok(terrain) => terrain,
    Err(e) => {
      error!("Cannot create terrain: {}", e);
      return ExitCode::FAILURE;
    }
  };
  let timeout = Duration::from_secs_f32(config.settle_timeout.max(0.0));

  let start = Instant::now();
  let radius = config.load_radius.max(0);
  for z in -radius..=radius {
    for y in -radius..=radius {
      for x in -radius..=radius {
        terrain.load_chunk(ChunkCoord::new(x, y, z));
      }
    }
  }
  info!("Loaded {} chunks", terrain.chunk_count());
  let settled = settle(&mut terrain, timeout);
  log_statistics(&terrain, "Streamed", start.elapsed(), settled);

  let edit = config.edit;
  let [x, y, z] = edit.center;
  let start = Instant::now();
  let modified = terrain.modify_sphere(Vec3::new(x, y, z), edit.radius, edit.intensity, edit.material);
  info!("Sphere edit modified {} cells", modified);
  let settled = settle(&mut terrain, timeout);
  log_statistics(&terrain, "Edited", start.elapsed(), settled);

  if let Err(e) = terrain.stop_and_join() {
    error!("Job queue thread panicked: {:?}", e);
    return ExitCode::FAILURE;
  }
  ExitCode::SUCCESS
}

fn settle<G: DensityGenerator>(terrain: &mut Terrain<G>, timeout: Duration) -> bool {
  let deadline = Instant::now() + timeout;
  while !terrain.is_settled() {
    if Instant::now() >= deadline {
      warn!("Terrain did not settle within {:?}", timeout);
      return false;
    }
    terrain.update_blocking(Duration::from_millis(100));
    profiling::finish_frame!();
  }
  true
}

fn log_statistics<G: DensityGenerator>(terrain: &Terrain<G>, stage: &str, elapsed: Duration, settled: bool) {
  let mut meshed_chunks = 0;
  let mut vertices = 0;
  let mut indices = 0;
  for chunk in terrain.chunks() {
    let Some(mesh) = chunk.mesh() else { continue; };
    if !mesh.is_empty() { meshed_chunks += 1; }
    vertices += mesh.vertex_count();
    indices += mesh.index_count();
  }
  info!(
    "{} in {:?} (settled: {}): {} chunks, {} with geometry, {} vertices, {} indices, {} triangles",
    stage, elapsed, settled, terrain.chunk_count(), meshed_chunks, vertices, indices, indices / 3
  );
}
