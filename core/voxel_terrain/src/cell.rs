use std::fmt::{Debug, Formatter};

use bytemuck::{Pod, Zeroable};

// Kind

#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VoxelKind {
  Air = 0,
  Block = 1,
  Isosurface = 2,
}


// Voxel cell

/// A single voxel, packed into 32 bits: a 2-bit kind tag, a 14-bit material id, and a 16-bit quantized density.
///
/// Blocks always report a density of `1.0`. Air always has material `0` and a density `<= 0.0`, also when decoded from
/// raw bits that carry a material, a positive density, or the unused kind tag. An isosurface cell with density `> 0.0`
/// is filled.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Pod, Zeroable)]
pub struct VoxelCell(u32);

impl VoxelCell {
  pub const AIR: Self = Self::from_parts(VoxelKind::Air, 0, -DENSITY_SCALE);
  pub const MAX_MATERIAL: u16 = (1 << MATERIAL_BITS) - 1;

  /// Creates an air cell with `density`, clamped to `<= 0.0`.
  #[inline]
  pub fn air(density: f32) -> Self {
    Self::from_parts(VoxelKind::Air, 0, quantize(density.min(0.0)))
  }

  /// Creates a block of `material`. Material `0` is reserved for air, so it creates air instead.
  #[inline]
  pub fn block(material: u16) -> Self {
    if material == 0 { return Self::AIR; }
    Self::from_parts(VoxelKind::Block, material, DENSITY_SCALE)
  }

  /// Creates an isosurface cell of `material` with `density`. A materialless cell with density `<= 0.0` is air.
  #[inline]
  pub fn isosurface(material: u16, density: f32) -> Self {
    if material == 0 && !(density > 0.0) { return Self::air(density); }
    Self::from_parts(VoxelKind::Isosurface, material, quantize(density))
  }

  /// Creates a cell from a signed id: a positive id is a block of that type, zero or negative is an isosurface cell
  /// with material `abs(id)` and `density`.
  #[inline]
  pub fn from_signed_id(id: i32, density: f32) -> Self {
    if id > 0 {
      Self::block(clamp_material(id))
    } else {
      Self::isosurface(clamp_material(id.saturating_neg()), density)
    }
  }

  #[inline]
  pub const fn from_bits(bits: u32) -> Self { Self(bits) }
  #[inline]
  pub const fn to_bits(self) -> u32 { self.0 }


  #[inline]
  pub fn kind(self) -> VoxelKind {
    match self.0 >> KIND_SHIFT {
      1 => VoxelKind::Block,
      2 => VoxelKind::Isosurface,
      _ => VoxelKind::Air,
    }
  }
  #[inline]
  pub fn is_air(self) -> bool { self.kind() == VoxelKind::Air }
  #[inline]
  pub fn is_block(self) -> bool { self.kind() == VoxelKind::Block }
  #[inline]
  pub fn is_isosurface(self) -> bool { self.kind() == VoxelKind::Isosurface }

  #[inline]
  pub fn material(self) -> u16 {
    if self.is_air() { return 0; }
    ((self.0 >> MATERIAL_SHIFT) & MATERIAL_MASK) as u16
  }

  /// Quantized density; `i16::MAX` for blocks, at most `0` for air.
  #[inline]
  pub fn quantized_density(self) -> i16 {
    let density = (self.0 & DENSITY_MASK) as u16 as i16;
    match self.kind() {
      VoxelKind::Block => DENSITY_SCALE,
      VoxelKind::Air => density.min(0),
      VoxelKind::Isosurface => density,
    }
  }

  #[inline]
  pub fn density(self) -> f32 { self.quantized_density() as f32 / DENSITY_SCALE as f32 }

  /// Whether this cell is inside the surface: density `> 0`. Blocks are always inside.
  #[inline]
  pub fn is_inside(self) -> bool { self.quantized_density() > 0 }

  /// Inverse of [`Self::from_signed_id`].
  #[inline]
  pub fn signed_id(self) -> i32 {
    match self.kind() {
      VoxelKind::Block => self.material() as i32,
      _ => -(self.material() as i32),
    }
  }


  /// Returns this cell with its density replaced by `density`, keeping blocks as blocks while they stay inside. Cells
  /// that end up outside become air; other cells that end up inside become isosurface cells of `material` (or their own
  /// material when `material` is `0`).
  #[inline]
  pub fn with_density(self, density: f32, material: u16) -> Self {
    if !(density > 0.0) { return Self::air(density); }
    if self.is_block() { return self; }
    let material = if material == 0 { self.material() } else { material };
    Self::isosurface(material, density)
  }


  #[inline]
  const fn from_parts(kind: VoxelKind, material: u16, quantized_density: i16) -> Self {
    Self(((kind as u32) << KIND_SHIFT) | (((material as u32) & MATERIAL_MASK) << MATERIAL_SHIFT) | (quantized_density as u16 as u32))
  }
}

impl Default for VoxelCell {
  #[inline]
  fn default() -> Self { Self::AIR }
}

impl Debug for VoxelCell {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("VoxelCell")
      .field("kind", &self.kind())
      .field("material", &self.material())
      .field("density", &self.density())
      .finish()
  }
}


/// Whether the surface crosses between `a` and `b`: exactly one of them is inside.
#[inline]
pub fn sign_changed(a: VoxelCell, b: VoxelCell) -> bool {
  a.is_inside() != b.is_inside()
}


// Encoding

const DENSITY_BITS: u32 = 16;
const MATERIAL_BITS: u32 = 14;
const MATERIAL_SHIFT: u32 = DENSITY_BITS;
const KIND_SHIFT: u32 = DENSITY_BITS + MATERIAL_BITS;
const DENSITY_MASK: u32 = (1 << DENSITY_BITS) - 1;
const MATERIAL_MASK: u32 = (1 << MATERIAL_BITS) - 1;
const DENSITY_SCALE: i16 = i16::MAX;

#[inline]
fn quantize(density: f32) -> i16 {
  // NaN becomes 0 through the saturating cast.
  (density.clamp(-1.0, 1.0) * DENSITY_SCALE as f32).round() as i16
}

#[inline]
fn clamp_material(material: i32) -> u16 {
  material.clamp(0, VoxelCell::MAX_MATERIAL as i32) as u16
}


#[cfg(test)]
mod tests {
  use rand::prelude::*;

  use crate::test_util::random_cell;

  use super::*;

  #[test]
  fn air_is_outside_and_materialless() {
    assert_eq!(VoxelCell::AIR.kind(), VoxelKind::Air);
    assert_eq!(VoxelCell::AIR.material(), 0);
    assert_eq!(VoxelCell::AIR.density(), -1.0);
    assert!(!VoxelCell::AIR.is_inside());
    assert_eq!(VoxelCell::default(), VoxelCell::AIR);
    assert!(VoxelCell::air(0.5).density() <= 0.0);
    assert_eq!(VoxelCell::zeroed().kind(), VoxelKind::Air);
  }

  #[test]
  fn raw_bits_decode_to_valid_air() {
    let unused_tag = VoxelCell::from_bits((3 << KIND_SHIFT) | (5 << MATERIAL_SHIFT) | 0x4000);
    let positive_air = VoxelCell::from_bits((5 << MATERIAL_SHIFT) | 0x4000);
    for cell in [unused_tag, positive_air] {
      assert!(cell.is_air(), "{:?}", cell);
      assert_eq!(cell.material(), 0);
      assert_eq!(cell.quantized_density(), 0);
      assert!(!cell.is_inside());
      assert!(!sign_changed(cell, VoxelCell::AIR));
      assert_eq!(cell.signed_id(), 0);
    }
    let negative_air = VoxelCell::from_bits(0xC000);
    assert!((negative_air.density() + 0.5).abs() < 1e-3);
  }

  #[test]
  fn block_is_full() {
    let block = VoxelCell::block(3);
    assert_eq!(block.kind(), VoxelKind::Block);
    assert_eq!(block.material(), 3);
    assert_eq!(block.density(), 1.0);
    assert!(block.is_inside());
    assert!(VoxelCell::block(0).is_air());
  }

  #[test]
  fn density_is_quantized() {
    let cell = VoxelCell::isosurface(7, 0.25);
    assert_eq!(cell.kind(), VoxelKind::Isosurface);
    assert_eq!(cell.material(), 7);
    assert!((cell.density() - 0.25).abs() < 1.0 / DENSITY_SCALE as f32);
    assert_eq!(VoxelCell::isosurface(7, 4.0).density(), 1.0);
    assert_eq!(VoxelCell::isosurface(7, -4.0).density(), -1.0);
    assert_eq!(VoxelCell::isosurface(7, -0.0).quantized_density(), 0);
    assert_eq!(VoxelCell::isosurface(7, f32::NAN).quantized_density(), 0);
    assert!(VoxelCell::isosurface(0, -0.5).is_air());
    assert!(VoxelCell::isosurface(0, 0.5).is_isosurface());
  }

  #[test]
  fn material_is_kept_at_maximum() {
    let cell = VoxelCell::isosurface(VoxelCell::MAX_MATERIAL, -1.0);
    assert_eq!(cell.material(), VoxelCell::MAX_MATERIAL);
    assert_eq!(cell.kind(), VoxelKind::Isosurface);
    assert_eq!(cell.density(), -1.0);
  }

  #[test]
  fn signed_id() {
    assert_eq!(VoxelCell::from_signed_id(5, 0.0), VoxelCell::block(5));
    assert_eq!(VoxelCell::from_signed_id(5, 0.0).signed_id(), 5);
    let cell = VoxelCell::from_signed_id(-9, 0.5);
    assert!(cell.is_isosurface());
    assert_eq!(cell.material(), 9);
    assert_eq!(cell.signed_id(), -9);
    assert!(VoxelCell::from_signed_id(0, -0.5).is_air());
    assert_eq!(VoxelCell::from_signed_id(i32::MIN, 0.5).material(), VoxelCell::MAX_MATERIAL);
  }

  #[test]
  fn with_density() {
    let block = VoxelCell::block(2);
    assert_eq!(block.with_density(0.5, 9), block);
    assert!(block.with_density(-0.5, 9).is_air());
    let cell = VoxelCell::AIR.with_density(0.5, 9);
    assert!(cell.is_isosurface());
    assert_eq!(cell.material(), 9);
    assert_eq!(VoxelCell::isosurface(4, -0.1).with_density(0.3, 0).material(), 4);
  }

  #[test]
  fn sign_changed_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..10_000 {
      let a = random_cell(&mut rng);
      let b = random_cell(&mut rng);
      assert_eq!(sign_changed(a, b), sign_changed(b, a), "{:?} {:?}", a, b);
      assert!(!sign_changed(a, a));
    }
  }
}
