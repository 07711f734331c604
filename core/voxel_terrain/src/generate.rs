//! Density generators that fill padded chunk volumes. Generators are deterministic: the same world position always
//! yields the same cell, so neighboring chunks agree on shared cells. Density fields are sampled at cell centers.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use ultraviolet::{IVec3, Vec3};

use crate::cell::VoxelCell;
use crate::chunk::{cell_center, chunk_to_world, ChunkCoord};
use crate::chunk::shape::PaddedShape;
use crate::chunk::volume::PaddedVolume;

// Trait

pub trait DensityGenerator: Clone + Send + Sync + 'static {
  /// Samples the cell at world position `world`, whose center is [`cell_center`]`(world)`.
  fn sample(&self, world: IVec3) -> VoxelCell;

  /// Fills `cells`, in padded index order, with the padded region of `shape` whose padded position `(0, 0, 0)` lies at
  /// world position `origin`.
  #[profiling::function]
  fn generate(&self, origin: IVec3, shape: PaddedShape, cells: &mut [VoxelCell]) {
    let padded = shape.padded();
    let mut i = 0;
    for z in 0..padded.z as i32 {
      for y in 0..padded.y as i32 {
        for x in 0..padded.x as i32 {
          if let Some(cell) = cells.get_mut(i) {
            *cell = self.sample(origin + IVec3::new(x, y, z));
          }
          i += 1;
        }
      }
    }
  }

  /// Generates the padded volume of chunk `coord`.
  #[inline]
  fn generate_chunk(&self, coord: ChunkCoord, shape: PaddedShape) -> PaddedVolume {
    let mut volume = PaddedVolume::new(shape);
    self.generate(padded_origin(coord, shape), shape, volume.cells_mut());
    volume
  }
}

/// World position of padded position `(0, 0, 0)` of chunk `coord`.
#[inline]
pub fn padded_origin(coord: ChunkCoord, shape: PaddedShape) -> IVec3 {
  let padding = PaddedShape::PADDING as i32;
  chunk_to_world(coord, shape.logical()) - IVec3::new(padding, padding, padding)
}


// Plane

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlaneSettings {
  /// Cells with their center below this height are inside.
  pub height: f32,
  pub material: u16,
}

impl Default for PlaneSettings {
  #[inline]
  fn default() -> Self {
    Self { height: 0.0, material: 1 }
  }
}

/// Horizontal half-space isosurface.
#[derive(Copy, Clone, Debug)]
pub struct Plane {
  settings: PlaneSettings,
}

impl Plane {
  #[inline]
  pub fn new(settings: PlaneSettings) -> Self { Self { settings } }
}

impl DensityGenerator for Plane {
  #[inline]
  fn sample(&self, world: IVec3) -> VoxelCell {
    VoxelCell::isosurface(self.settings.material, self.settings.height - cell_center(world).y)
  }
}


// Sphere

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SphereSettings {
  pub center: [f32; 3],
  pub radius: f32,
  pub material: u16,
}

impl Default for SphereSettings {
  #[inline]
  fn default() -> Self {
    Self { center: [0.0; 3], radius: 16.0, material: 1 }
  }
}

/// Isosurface ball.
#[derive(Copy, Clone, Debug)]
pub struct Sphere {
  center: Vec3,
  radius: f32,
  material: u16,
}

impl Sphere {
  #[inline]
  pub fn new(settings: SphereSettings) -> Self {
    let [x, y, z] = settings.center;
    Self { center: Vec3::new(x, y, z), radius: settings.radius, material: settings.material }
  }
}

impl DensityGenerator for Sphere {
  #[inline]
  fn sample(&self, world: IVec3) -> VoxelCell {
    let distance = (cell_center(world) - self.center).mag();
    VoxelCell::isosurface(self.material, self.radius - distance)
  }
}


// Noise terrain

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoiseTerrainSettings {
  pub seed: u32,
  pub frequency: f64,
  pub lacunarity: f64,
  pub persistence: f64,
  pub octaves: usize,
  /// Surface height where the noise is zero.
  pub base_height: f32,
  /// Surface height deviation at noise `1.0`.
  pub amplitude: f32,
  pub material: u16,
  /// Cells deeper below the surface than this are blocks.
  pub block_depth: f32,
  pub block_material: u16,
}

impl Default for NoiseTerrainSettings {
  #[inline]
  fn default() -> Self {
    Self {
      seed: 1337,
      frequency: 0.02,
      lacunarity: 2.0,
      persistence: 0.5,
      octaves: 4,
      base_height: 0.0,
      amplitude: 12.0,
      material: 1,
      block_depth: 8.0,
      block_material: 2,
    }
  }
}

/// Fractal noise heightfield: an isosurface near the surface, and blocks deep below it.
#[derive(Clone, Debug)]
pub struct NoiseTerrain {
  settings: NoiseTerrainSettings,
  noise: Fbm<Perlin>,
}

impl NoiseTerrain {
  pub fn new(settings: NoiseTerrainSettings) -> Self {
    let noise = Fbm::<Perlin>::new(settings.seed)
      .set_frequency(settings.frequency)
      .set_lacunarity(settings.lacunarity)
      .set_persistence(settings.persistence)
      .set_octaves(settings.octaves.max(1));
    Self { settings, noise }
  }

  /// Surface height of the column of cells at `x`, `z`, sampled at the column's center.
  #[inline]
  pub fn surface_height(&self, x: i32, z: i32) -> f32 {
    let noise = self.noise.get([x as f64 + 0.5, z as f64 + 0.5]) as f32;
    self.settings.base_height + noise * self.settings.amplitude
  }
}

impl DensityGenerator for NoiseTerrain {
  #[inline]
  fn sample(&self, world: IVec3) -> VoxelCell {
    let depth = self.surface_height(world.x, world.z) - cell_center(world).y;
    if depth > self.settings.block_depth {
      VoxelCell::block(self.settings.block_material)
    } else {
      VoxelCell::isosurface(self.settings.material, depth)
    }
  }
}


#[cfg(test)]
mod tests {
  use crate::chunk::volume::VoxelSource;

  use super::*;

  #[test]
  fn plane_inside_below_height() {
    let plane = Plane::new(PlaneSettings { height: 0.0, material: 3 });
    assert!(plane.sample(IVec3::new(5, -1, 7)).is_inside());
    assert!(!plane.sample(IVec3::new(5, 0, 7)).is_inside());
    assert_eq!(plane.sample(IVec3::new(5, -10, 7)).density(), 1.0);
    assert_eq!(plane.sample(IVec3::new(5, 10, 7)).material(), 3);
  }

  #[test]
  fn sphere_inside_within_radius() {
    let sphere = Sphere::new(SphereSettings { center: [1.0, 2.0, 3.0], radius: 2.5, material: 4 });
    assert!(sphere.sample(IVec3::new(1, 2, 3)).is_inside());
    assert!(sphere.sample(IVec3::new(2, 2, 3)).is_inside());
    // Center (3.5, 2.5, 3.5) is 2.6 away.
    assert!(!sphere.sample(IVec3::new(3, 2, 3)).is_inside());
    assert!(!sphere.sample(IVec3::new(4, 2, 3)).is_inside());
  }

  #[test]
  fn padded_region_is_offset_by_padding() {
    let plane = Plane::new(PlaneSettings { height: 0.0, material: 1 });
    let shape = PaddedShape::cubic(4);
    let volume = plane.generate_chunk(ChunkCoord::new(0, 0, 0), shape);
    // Padded y 0 is world y -1, padded y 1 is world y 0.
    assert!(volume.get(IVec3::new(2, 0, 2)).is_inside());
    assert!(!volume.get(IVec3::new(2, 1, 2)).is_inside());
    let below = plane.generate_chunk(ChunkCoord::new(0, -1, 0), shape);
    assert!(below.get(IVec3::new(2, 4, 2)).is_inside());
    assert!(!below.get(IVec3::new(2, 5, 2)).is_inside());
  }

  #[test]
  fn noise_terrain_is_deterministic() {
    let settings = NoiseTerrainSettings::default();
    let a = NoiseTerrain::new(settings);
    let b = NoiseTerrain::new(settings);
    let shape = PaddedShape::cubic(8);
    let coord = ChunkCoord::new(1, 0, -2);
    assert_eq!(a.generate_chunk(coord, shape).voxels(), b.generate_chunk(coord, shape).voxels());
  }

  #[test]
  fn noise_terrain_has_blocks_deep_down() {
    let terrain = NoiseTerrain::new(NoiseTerrainSettings::default());
    assert!(terrain.sample(IVec3::new(0, -100, 0)).is_block());
    assert!(!terrain.sample(IVec3::new(0, 100, 0)).is_inside());
  }
}
