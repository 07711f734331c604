use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ron::de::from_reader;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

use voxel_terrain::generate::NoiseTerrainSettings;
use voxel_terrain::terrain::TerrainSettings;

pub const CONFIG_FILE_PATH: &str = "config.ron";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
  pub terrain: TerrainSettings,
  pub generator: NoiseTerrainSettings,
  /// Chunks within this many chunks of the origin along each axis are loaded.
  pub load_radius: i32,
  /// Maximum number of seconds to wait for the terrain to settle.
  pub settle_timeout: f32,
  pub edit: SphereEdit,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      terrain: TerrainSettings::default(),
      generator: NoiseTerrainSettings::default(),
      load_radius: 2,
      settle_timeout: 60.0,
      edit: SphereEdit::default(),
    }
  }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SphereEdit {
  pub center: [f32; 3],
  pub radius: f32,
  pub intensity: f32,
  pub material: u16,
}

impl Default for SphereEdit {
  fn default() -> Self {
    Self { center: [0.0, 0.0, 0.0], radius: 6.0, intensity: 2.0, material: 3 }
  }
}

/// Deserializes `T` from the RON file at `path`, returning the default when the file does not exist, and logging an
/// error and returning the default when it cannot be read or deserialized.
pub fn deserialize_config<T: DeserializeOwned + Default>(path: &Path) -> T {
  if !path.exists() { return T::default(); }
  match File::open(path) {
    Ok(file) => match from_reader(BufReader::new(file)) {
      Ok(config) => config,
      Err(e) => {
        error!("Cannot deserialize config, returning default config; failed to deserialize from file '{}': {}", path.display(), e);
        T::default()
      }
    }
    Err(e) => {
      error!("Cannot deserialize config, returning default config; failed to open file '{}': {}", path.display(), e);
      T::default()
    }
  }
}


#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("terrain_remesh_{}_{}.ron", name, std::process::id()))
  }

  #[test]
  fn missing_file_yields_default() {
    let config: Config = deserialize_config(&temp_path("missing"));
    assert_eq!(config.load_radius, 2);
  }

  #[test]
  fn partial_file_is_merged_with_defaults() {
    let path = temp_path("partial");
    File::create(&path).unwrap().write_all(b"(load_radius: 1, terrain: (max_concurrent_remeshes: 3))").unwrap();
    let config: Config = deserialize_config(&path);
    std::fs::remove_file(&path).ok();
    assert_eq!(config.load_radius, 1);
    assert_eq!(config.terrain.max_concurrent_remeshes, 3);
    assert_eq!(config.terrain.chunk_size, TerrainSettings::default().chunk_size);
  }

  #[test]
  fn malformed_file_yields_default() {
    let path = temp_path("malformed");
    File::create(&path).unwrap().write_all(b"(load_radius: \"far\"").unwrap();
    let config: Config = deserialize_config(&path);
    std::fs::remove_file(&path).ok();
    assert_eq!(config.load_radius, 2);
  }
}
