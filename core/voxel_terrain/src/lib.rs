//! Voxel terrain meshing: block faces (culled or greedily merged) and dual-contoured isosurfaces extracted from padded
//! chunks of voxels, with chunk generation and remeshing scheduled on a job queue.

pub mod cell;
pub mod chunk;
pub mod mesh;
pub mod block;
pub mod isosurface;
pub mod stitch;
pub mod generate;
pub mod mesher;
pub mod terrain;
