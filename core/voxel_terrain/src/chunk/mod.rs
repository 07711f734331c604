use ultraviolet::{IVec3, UVec3, Vec3};

pub mod shape;
pub mod volume;

// Chunk coordinate

/// Coordinate of a chunk in the chunk grid. Chunk `c` covers world cells `c * logical_size .. (c + 1) * logical_size`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ChunkCoord {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

impl ChunkCoord {
  #[inline]
  pub const fn new(x: i32, y: i32, z: i32) -> Self { Self { x, y, z } }

  #[inline]
  pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self { Self::new(self.x + dx, self.y + dy, self.z + dz) }

  /// Runs `run` for each of the 26 chunks surrounding this one.
  #[inline]
  pub fn for_each_neighbor(self, mut run: impl FnMut(ChunkCoord)) {
    for dz in -1..=1 {
      for dy in -1..=1 {
        for dx in -1..=1 {
          if dx == 0 && dy == 0 && dz == 0 { continue; }
          run(self.offset(dx, dy, dz));
        }
      }
    }
  }

  #[inline]
  pub fn to_ivec3(self) -> IVec3 { IVec3::new(self.x, self.y, self.z) }
}

impl From<IVec3> for ChunkCoord {
  #[inline]
  fn from(v: IVec3) -> Self { Self::new(v.x, v.y, v.z) }
}


// Coordinate conversion

/// Chunk containing world cell `world`, for chunks of `logical_size` cells.
#[inline]
pub fn world_to_chunk(world: IVec3, logical_size: UVec3) -> ChunkCoord {
  ChunkCoord::new(
    world.x.div_euclid(logical_size.x as i32),
    world.y.div_euclid(logical_size.y as i32),
    world.z.div_euclid(logical_size.z as i32),
  )
}

/// World position of the first logical cell of chunk `coord`.
#[inline]
pub fn chunk_to_world(coord: ChunkCoord, logical_size: UVec3) -> IVec3 {
  IVec3::new(
    coord.x * logical_size.x as i32,
    coord.y * logical_size.y as i32,
    coord.z * logical_size.z as i32,
  )
}

/// Logical position (`0..logical_size`) of world cell `world` within its chunk.
#[inline]
pub fn world_to_local(world: IVec3, logical_size: UVec3) -> UVec3 {
  UVec3::new(
    world.x.rem_euclid(logical_size.x as i32) as u32,
    world.y.rem_euclid(logical_size.y as i32) as u32,
    world.z.rem_euclid(logical_size.z as i32) as u32,
  )
}

/// Center of world cell `world`, where its density is sampled. Cell `world` is the unit cube at `world`.
#[inline]
pub fn cell_center(world: IVec3) -> Vec3 {
  Vec3::new(world.x as f32 + 0.5, world.y as f32 + 0.5, world.z as f32 + 0.5)
}
