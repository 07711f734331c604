use ultraviolet::{IVec3, UVec3};

// Padded shape

/// Shape of a chunk: `logical` cells per axis, surrounded by a padding ring of one cell on every side. Padded
/// coordinates run from `0` to `logical + 1` inclusive; `1..=logical` are the logical cells.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PaddedShape {
  logical: UVec3,
}

impl PaddedShape {
  pub const PADDING: u32 = 1;

  #[inline]
  pub const fn new(logical: UVec3) -> Self { Self { logical } }
  #[inline]
  pub fn cubic(logical: u32) -> Self { Self::new(UVec3::new(logical, logical, logical)) }


  #[inline]
  pub fn logical(&self) -> UVec3 { self.logical }
  #[inline]
  pub fn padded(&self) -> UVec3 { self.logical + UVec3::new(2, 2, 2) * Self::PADDING }

  #[inline]
  pub fn logical_len(&self) -> usize { (self.logical.x * self.logical.y * self.logical.z) as usize }
  #[inline]
  pub fn padded_len(&self) -> usize {
    let padded = self.padded();
    (padded.x * padded.y * padded.z) as usize
  }


  /// Whether padded position `pos` lies inside the padded array.
  #[inline]
  pub fn contains(&self, pos: IVec3) -> bool {
    let padded = self.padded();
    pos.x >= 0 && pos.y >= 0 && pos.z >= 0 && (pos.x as u32) < padded.x && (pos.y as u32) < padded.y && (pos.z as u32) < padded.z
  }

  /// Whether padded position `pos` is a logical cell.
  #[inline]
  pub fn is_logical(&self, pos: IVec3) -> bool {
    pos.x >= 1 && pos.y >= 1 && pos.z >= 1 && pos.x as u32 <= self.logical.x && pos.y as u32 <= self.logical.y && pos.z as u32 <= self.logical.z
  }

  /// Index of padded position `pos` into the padded array, or `None` if `pos` lies outside.
  #[inline]
  pub fn index(&self, pos: IVec3) -> Option<usize> {
    if !self.contains(pos) { return None; }
    Some(self.index_unchecked(pos.x as u32, pos.y as u32, pos.z as u32))
  }

  /// Index of padded position `(x, y, z)`, which must lie inside the padded array.
  #[inline]
  pub fn index_unchecked(&self, x: u32, y: u32, z: u32) -> usize {
    let padded = self.padded();
    debug_assert!(x < padded.x && y < padded.y && z < padded.z, "Position ({}, {}, {}) is outside of padded shape {:?}", x, y, z, padded);
    (x + padded.x * y + padded.x * padded.y * z) as usize
  }

  /// Runs `run` for every logical cell, in padded coordinates, x fastest.
  #[inline]
  pub fn for_each_logical(&self, mut run: impl FnMut(IVec3)) {
    for z in 1..=self.logical.z as i32 {
      for y in 1..=self.logical.y as i32 {
        for x in 1..=self.logical.x as i32 {
          run(IVec3::new(x, y, z));
        }
      }
    }
  }


  /// Upper bound on the number of faces extracted from a chunk of this shape. Every face lies on a distinct lattice
  /// edge between two cells of which at least one is logical, and there are `(L_a + 1) * L_b * L_c` such edges along
  /// axis `a`.
  #[inline]
  pub fn max_faces(&self) -> usize {
    let l = self.logical;
    let (x, y, z) = (l.x as usize, l.y as usize, l.z as usize);
    (x + 1) * y * z + x * (y + 1) * z + x * y * (z + 1)
  }
}
