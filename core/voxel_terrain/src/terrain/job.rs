use std::sync::Arc;

use job_queue::{DependencyOutputs, Handler, JobQueue, JobQueueMessage};
use parking_lot::Mutex;
use tracing::trace;

use crate::block::BlockStrategy;
use crate::chunk::ChunkCoord;
use crate::chunk::shape::PaddedShape;
use crate::chunk::volume::PaddedVolume;
use crate::generate::DensityGenerator;
use crate::mesh::{ChunkMesh, MeshAssembler};
use crate::mesher::Mesher;

// Job key

/// Key of a terrain job. The second field is a generation number that is unique for every dispatch, so that a chunk
/// that is unloaded and loaded again, or remeshed again, never collides with jobs that are still in the queue.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum TerrainJob {
  Generate(ChunkCoord, u64),
  Blocks(ChunkCoord, u64),
  Isosurface(ChunkCoord, u64),
}

impl TerrainJob {
  #[inline]
  pub fn coord(&self) -> ChunkCoord {
    match *self {
      TerrainJob::Generate(coord, _) | TerrainJob::Blocks(coord, _) | TerrainJob::Isosurface(coord, _) => coord,
    }
  }

  #[inline]
  pub fn generation(&self) -> u64 {
    match *self {
      TerrainJob::Generate(_, generation) | TerrainJob::Blocks(_, generation) | TerrainJob::Isosurface(_, generation) => generation,
    }
  }
}


// Input and output

pub type SharedAssembler = Arc<Mutex<MeshAssembler>>;

pub enum JobInput {
  Generate { shape: PaddedShape },
  Blocks { volume: Arc<PaddedVolume>, assembler: SharedAssembler, strategy: BlockStrategy },
  /// Runs after the block pass of the same chunk has completed, appending to the same assembler.
  Isosurface { volume: Arc<PaddedVolume>, assembler: SharedAssembler },
}

pub enum JobOutput {
  Generated(Arc<PaddedVolume>),
  /// Number of faces in the assembler after the block pass.
  BlockFaces(u32),
  Mesh(Arc<ChunkMesh>),
}


// Queue

pub(crate) const DEPENDENCY_COUNT: usize = 1;

pub(crate) type TerrainJobQueue = JobQueue<TerrainJob, (), JobInput, JobOutput, DEPENDENCY_COUNT>;

pub(crate) type TerrainJobQueueMessage = JobQueueMessage<TerrainJob, JobInput, JobOutput>;

/// Creates the job handler that worker threads run. Every worker gets its own clone of `generator` and of the mesher
/// scratch buffers.
pub(crate) fn create_handler<G: DensityGenerator>(generator: G) -> impl Handler<TerrainJob, (), JobInput, JobOutput, DEPENDENCY_COUNT> {
  let mut mesher = Mesher::new();
  move |job: TerrainJob, _dependency_outputs: DependencyOutputs<(), JobOutput, DEPENDENCY_COUNT>, input: JobInput| {
    trace!("Running {:?}", job);
    match input {
      JobInput::Generate { shape } => {
        profiling::scope!("generate");
        JobOutput::Generated(Arc::new(generator.generate_chunk(job.coord(), shape)))
      }
      JobInput::Blocks { volume, assembler, strategy } => {
        profiling::scope!("extract blocks");
        let mut assembler = assembler.lock();
        assembler.reset();
        JobOutput::BlockFaces(mesher.extract_blocks(&*volume, strategy, &mut assembler))
      }
      JobInput::Isosurface { volume, assembler } => {
        profiling::scope!("extract isosurface");
        let mut assembler = assembler.lock();
        mesher.extract_isosurface(&*volume, &mut assembler);
        JobOutput::Mesh(Arc::new(assembler.finish()))
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use std::time::Duration;

  use crate::cell::VoxelCell;
  use crate::generate::{Plane, PlaneSettings};

  use super::*;

  #[test]
  fn isosurface_pass_appends_to_block_pass() {
    let shape = PaddedShape::cubic(4);
    let job_queue = TerrainJobQueue::new(2, create_handler(Plane::new(PlaneSettings { height: 2.0, material: 1 }))).unwrap();
    let mut volume = Plane::new(PlaneSettings { height: 2.0, material: 1 }).generate_chunk(ChunkCoord::new(0, 0, 0), shape);
    volume.set_local(ultraviolet::UVec3::new(1, 3, 1), VoxelCell::block(2));
    let volume = Arc::new(volume);
    let assembler = Arc::new(Mutex::new(MeshAssembler::new(shape)));
    let coord = ChunkCoord::new(0, 0, 0);
    job_queue.try_add_job(TerrainJob::Blocks(coord, 0), JobInput::Blocks { volume: volume.clone(), assembler: assembler.clone(), strategy: BlockStrategy::Culling }).unwrap();
    job_queue.try_add_job_with_dependencies(TerrainJob::Isosurface(coord, 0), JobInput::Isosurface { volume, assembler }, [((), TerrainJob::Blocks(coord, 0))].into_iter().collect()).unwrap();

    let receiver = job_queue.get_message_receiver();
    let mut block_faces = None;
    loop {
      match receiver.recv_timeout(Duration::from_secs(10)).unwrap() {
        JobQueueMessage::JobCompleted(TerrainJob::Blocks(..), output) => {
          if let JobOutput::BlockFaces(faces) = *output { block_faces = Some(faces); }
        }
        JobQueueMessage::JobCompleted(TerrainJob::Isosurface(..), output) => {
          let JobOutput::Mesh(mesh) = &*output else { panic!("Isosurface job did not output a mesh"); };
          assert_eq!(block_faces, Some(6));
          assert_eq!(mesh.quad_count(), 6 + 16);
          break;
        }
        _ => {}
      }
    }
    job_queue.stop_and_join().unwrap();
  }
}
