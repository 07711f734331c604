//! Chunk registry and remesh scheduler. Chunks move through [`ChunkState`]s as their generation and remesh jobs
//! complete on the job queue; [`Terrain::update`] polls completions and dispatches new work.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, error, trace, warn};
use ultraviolet::{IVec3, Vec3};

use crate::cell::VoxelCell;
use crate::chunk::{cell_center, chunk_to_world, ChunkCoord, world_to_chunk, world_to_local};
use crate::chunk::shape::PaddedShape;
use crate::chunk::volume::{ChunkLookup, PaddedVolume};
use crate::generate::DensityGenerator;
use crate::mesh::{ChunkMesh, MeshAssembler};
use crate::stitch::stitch;

pub use self::chunk::{ChunkHandle, ChunkState};
pub use self::job::{JobInput, JobOutput, TerrainJob};
pub use self::settings::{SettingsError, TerrainSettings};

use self::chunk::InFlight;
use self::job::{create_handler, SharedAssembler, TerrainJobQueue, TerrainJobQueueMessage};

pub mod settings;
pub mod chunk;
pub mod job;

// Errors

#[derive(Error, Debug)]
pub enum TerrainError {
  #[error(transparent)]
  Settings(#[from] SettingsError),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum EditError {
  #[error("Chunk {0:?} is not loaded")]
  ChunkNotLoaded(ChunkCoord),
  #[error("Chunk {0:?} has not been generated yet")]
  ChunkNotGenerated(ChunkCoord),
}


// Chunks

/// Chunk map that only exposes generated chunks to stitching.
#[derive(Default, Debug)]
struct Chunks(FxHashMap<ChunkCoord, ChunkHandle>);

impl ChunkLookup for Chunks {
  type Source = PaddedVolume;

  #[inline]
  fn try_get_chunk(&self, coord: ChunkCoord) -> Option<&PaddedVolume> {
    self.0.get(&coord)?.voxels.as_deref()
  }
}


// Terrain

pub struct Terrain<G> {
  settings: TerrainSettings,
  shape: PaddedShape,
  generator: G,
  chunks: Chunks,
  job_queue: TerrainJobQueue,
  next_generation: u64,
  in_flight_remeshes: usize,
  assembler_cache: VecDeque<MeshAssembler>,
  message_buffer: Vec<TerrainJobQueueMessage>,
  candidate_buffer: Vec<ChunkCoord>,
}

impl<G: DensityGenerator> Terrain<G> {
  pub fn new(settings: TerrainSettings, generator: G) -> Result<Self, TerrainError> {
    settings.check()?;
    let job_queue = TerrainJobQueue::new(settings.job_queue_worker_threads, create_handler(generator.clone()))?;
    debug!("Created terrain with {:?} chunks and {} worker threads", settings.chunk_size, settings.job_queue_worker_threads);
    Ok(Self {
      settings,
      shape: settings.shape(),
      generator,
      chunks: Chunks::default(),
      job_queue,
      next_generation: 0,
      in_flight_remeshes: 0,
      assembler_cache: VecDeque::new(),
      message_buffer: Vec::new(),
      candidate_buffer: Vec::new(),
    })
  }


  #[inline]
  pub fn settings(&self) -> &TerrainSettings { &self.settings }
  #[inline]
  pub fn shape(&self) -> PaddedShape { self.shape }
  #[inline]
  pub fn generator(&self) -> &G { &self.generator }

  #[inline]
  pub fn try_get_chunk(&self, coord: ChunkCoord) -> Option<&ChunkHandle> { self.chunks.0.get(&coord) }
  #[inline]
  pub fn chunks(&self) -> impl Iterator<Item=&ChunkHandle> + '_ { self.chunks.0.values() }
  #[inline]
  pub fn chunk_count(&self) -> usize { self.chunks.0.len() }
  #[inline]
  pub fn in_flight_remeshes(&self) -> usize { self.in_flight_remeshes }

  /// World position of the first logical cell of chunk `coord`; meshes of that chunk are relative to it.
  #[inline]
  pub fn chunk_origin(&self, coord: ChunkCoord) -> IVec3 { chunk_to_world(coord, self.shape.logical()) }

  /// Whether every loaded chunk has an up-to-date mesh.
  #[inline]
  pub fn is_settled(&self) -> bool { self.chunks.0.values().all(|c| c.state == ChunkState::Ready && !c.dirty) }


  // Loading

  /// Registers chunk `coord` and dispatches its generation job. Returns `false` if the chunk was already loaded.
  pub fn load_chunk(&mut self, coord: ChunkCoord) -> bool {
    if self.chunks.0.contains_key(&coord) { return false; }
    let mut handle = ChunkHandle::new(coord);
    let generation = self.next_generation();
    let input = JobInput::Generate { shape: self.shape };
    if self.job_queue.try_add_job(TerrainJob::Generate(coord, generation), input).is_err() {
      error!("Cannot generate chunk {:?}: job queue has stopped", coord);
    } else {
      handle.generation = generation;
      handle.state = ChunkState::Generating;
    }
    trace!("Loaded chunk {:?}", coord);
    self.chunks.0.insert(coord, handle);
    true
  }

  /// Removes chunk `coord`, cancelling its jobs. Returns the removed chunk, if it was loaded.
  pub fn unload_chunk(&mut self, coord: ChunkCoord) -> Option<ChunkHandle> {
    let mut handle = self.chunks.0.remove(&coord)?;
    if handle.state == ChunkState::Generating {
      self.remove_job(TerrainJob::Generate(coord, handle.generation));
    }
    if let Some(in_flight) = handle.in_flight.take() {
      // Removing the block pass cascades to the isosurface pass that depends on it.
      self.remove_job(TerrainJob::Blocks(coord, in_flight.generation));
      self.in_flight_remeshes -= 1;
    }
    trace!("Unloaded chunk {:?}", coord);
    Some(handle)
  }


  // Updating

  /// Handles all job completions that are available without blocking, then dispatches remeshes of dirty chunks within
  /// the remesh budget. Returns the number of handled job queue messages.
  #[profiling::function]
  pub fn update(&mut self) -> usize {
    let mut messages = std::mem::take(&mut self.message_buffer);
    messages.extend(self.job_queue.get_message_receiver().try_iter());
    let count = self.handle_messages(&mut messages);
    self.message_buffer = messages;
    self.schedule_remeshes();
    count
  }

  /// Waits up to `timeout` for at least one job completion, then updates as [`Self::update`] does. Returns the number of
  /// handled job queue messages, which is zero when the timeout elapsed.
  #[profiling::function]
  pub fn update_blocking(&mut self, timeout: Duration) -> usize {
    let mut messages = std::mem::take(&mut self.message_buffer);
    let receiver = self.job_queue.get_message_receiver();
    if let Ok(message) = receiver.recv_timeout(timeout) {
      messages.push(message);
      messages.extend(receiver.try_iter());
    }
    let count = self.handle_messages(&mut messages);
    self.message_buffer = messages;
    self.schedule_remeshes();
    count
  }

  fn handle_messages(&mut self, messages: &mut Vec<TerrainJobQueueMessage>) -> usize {
    let count = messages.len();
    for message in messages.drain(..) {
      self.handle_message(message);
    }
    count
  }

  fn handle_message(&mut self, message: TerrainJobQueueMessage) {
    use job_queue::JobQueueMessage::*;
    match message {
      JobCompleted(job @ TerrainJob::Generate(coord, generation), output) => {
        self.remove_job(job);
        if let JobOutput::Generated(volume) = &*output {
          self.complete_generation(coord, generation, volume.clone());
        }
      }
      JobCompleted(TerrainJob::Blocks(coord, _), output) => {
        if let JobOutput::BlockFaces(faces) = &*output {
          trace!("Extracted {} block faces of chunk {:?}", faces, coord);
        }
      }
      JobCompleted(TerrainJob::Isosurface(coord, generation), output) => {
        if let JobOutput::Mesh(mesh) = &*output {
          self.complete_remesh(coord, generation, mesh.clone());
        }
      }
      JobRejected(job, input) => {
        warn!("Job {:?} was rejected", job);
        self.recycle_input(input);
        self.abort_job(job);
      }
      PendingJobRemoved(job, input) => {
        trace!("Removed pending job {:?}", job);
        self.recycle_input(input);
      }
      RunningJobRemoved(job) => trace!("Removed running job {:?}", job),
      CompletedJobRemoved(job, _) => trace!("Removed completed job {:?}", job),
      QueueEmpty => trace!("Job queue is empty"),
    }
  }

  fn complete_generation(&mut self, coord: ChunkCoord, generation: u64, volume: Arc<PaddedVolume>) {
    let Some(handle) = self.chunks.0.get_mut(&coord) else { return; };
    if handle.state != ChunkState::Generating || handle.generation != generation { return; }
    debug!("Generated chunk {:?}", coord);
    handle.voxels = Some(volume);
    handle.state = ChunkState::Dirty;
    handle.dirty = true;
    // Padding of neighbors that were generated earlier must be restitched against this chunk.
    self.mark_neighbors_dirty(coord);
  }

  fn complete_remesh(&mut self, coord: ChunkCoord, generation: u64, mesh: Arc<ChunkMesh>) {
    let Some(handle) = self.chunks.0.get_mut(&coord) else { return; };
    let Some(in_flight) = handle.take_in_flight(generation) else { return; };
    debug!("Meshed chunk {:?}: {} vertices, {} indices", coord, mesh.vertex_count(), mesh.index_count());
    handle.mesh = Some(mesh);
    handle.mesh_count += 1;
    handle.state = if handle.dirty { ChunkState::Dirty } else { ChunkState::Ready };
    self.in_flight_remeshes -= 1;
    self.remove_job(TerrainJob::Blocks(coord, generation));
    self.recycle_assembler(in_flight.assembler);
  }

  /// Reverts chunk state for a job that was not accepted by the job queue.
  fn abort_job(&mut self, job: TerrainJob) {
    let coord = job.coord();
    let Some(handle) = self.chunks.0.get_mut(&coord) else { return; };
    match job {
      TerrainJob::Generate(_, generation) if handle.state == ChunkState::Generating && handle.generation == generation => {
        handle.state = ChunkState::Uninitialized;
      }
      TerrainJob::Blocks(_, generation) | TerrainJob::Isosurface(_, generation) => {
        if handle.take_in_flight(generation).is_some() {
          handle.state = ChunkState::Dirty;
          handle.dirty = true;
          self.in_flight_remeshes -= 1;
          self.remove_job(TerrainJob::Blocks(coord, generation));
        }
      }
      _ => {}
    }
  }


  // Remeshing

  /// Dispatches remeshes of dirty chunks, in coordinate order, while the remesh budget allows. Chunks are only remeshed
  /// once all their loaded neighbors have been generated, so that their padding can be stitched.
  #[profiling::function]
  fn schedule_remeshes(&mut self) {
    let budget = self.settings.max_concurrent_remeshes.saturating_sub(self.in_flight_remeshes);
    if budget == 0 { return; }
    let mut candidates = std::mem::take(&mut self.candidate_buffer);
    candidates.clear();
    candidates.extend(self.chunks.0.values()
      .filter(|c| c.state == ChunkState::Dirty && !c.is_meshing())
      .map(|c| c.coord()));
    candidates.retain(|coord| self.can_remesh(*coord));
    candidates.sort_unstable();
    for coord in candidates.iter().take(budget).copied() {
      self.dispatch_remesh(coord);
    }
    self.candidate_buffer = candidates;
  }

  /// Whether chunk `coord` is generated, not meshing, and all its loaded neighbors are generated.
  pub fn can_remesh(&self, coord: ChunkCoord) -> bool {
    let Some(handle) = self.chunks.0.get(&coord) else { return false; };
    if !handle.is_generated() || handle.is_meshing() { return false; }
    let mut neighbors_ready = true;
    coord.for_each_neighbor(|neighbor| {
      if let Some(neighbor) = self.chunks.0.get(&neighbor) {
        neighbors_ready &= neighbor.is_generated();
      }
    });
    neighbors_ready
  }

  /// Requests a remesh of chunk `coord`, dispatching it right away (regardless of the remesh budget) if it can be
  /// remeshed, or leaving it dirty for [`Self::update`] to dispatch otherwise. Returns whether the remesh was
  /// dispatched.
  pub fn begin_remesh(&mut self, coord: ChunkCoord) -> bool {
    let Some(handle) = self.chunks.0.get_mut(&coord) else { return false; };
    handle.mark_dirty();
    if !self.can_remesh(coord) { return false; }
    self.dispatch_remesh(coord)
  }

  /// Whether chunk `coord` has an up-to-date mesh.
  #[inline]
  pub fn is_complete(&self, coord: ChunkCoord) -> bool {
    self.chunks.0.get(&coord).map_or(false, |c| c.state == ChunkState::Ready && !c.dirty)
  }

  /// Takes the most recent mesh of chunk `coord` out of the chunk, if any.
  #[inline]
  pub fn take_mesh(&mut self, coord: ChunkCoord) -> Option<Arc<ChunkMesh>> {
    self.chunks.0.get_mut(&coord)?.mesh.take()
  }

  /// Stitches the padding of chunk `coord` and dispatches its block and isosurface passes, the latter depending on the
  /// former.
  fn dispatch_remesh(&mut self, coord: ChunkCoord) -> bool {
    let Some(mut volume) = self.chunks.0.get_mut(&coord).and_then(|c| c.voxels.take()) else { return false; };
    // Copy-on-write if a job still reads the volume.
    stitch(Arc::make_mut(&mut volume), coord, &self.chunks);

    let generation = self.next_generation();
    let assembler = Arc::new(Mutex::new(self.acquire_assembler()));
    let blocks = TerrainJob::Blocks(coord, generation);
    let blocks_input = JobInput::Blocks { volume: volume.clone(), assembler: assembler.clone(), strategy: self.settings.block_strategy };
    let isosurface_input = JobInput::Isosurface { volume: volume.clone(), assembler: assembler.clone() };
    let dispatched = self.job_queue.try_add_job(blocks, blocks_input).is_ok()
      && self.job_queue.try_add_job_with_dependencies(TerrainJob::Isosurface(coord, generation), isosurface_input, [((), blocks)].into_iter().collect()).is_ok();

    let Some(handle) = self.chunks.0.get_mut(&coord) else { return false; };
    handle.voxels = Some(volume);
    if !dispatched {
      error!("Cannot remesh chunk {:?}: job queue has stopped", coord);
      handle.state = ChunkState::Dirty;
      return false;
    }
    debug!("Remeshing chunk {:?} ({})", coord, generation);
    handle.state = ChunkState::Meshing;
    handle.dirty = false;
    handle.in_flight = Some(InFlight { generation, assembler });
    self.in_flight_remeshes += 1;
    true
  }


  // Editing

  /// Sets the cell at world position `world`, marking its chunk dirty, and its neighbors too when the cell lies on the
  /// chunk boundary.
  pub fn set_voxel(&mut self, world: IVec3, cell: VoxelCell) -> Result<(), EditError> {
    let logical = self.shape.logical();
    let coord = world_to_chunk(world, logical);
    let local = world_to_local(world, logical);
    let handle = self.chunks.0.get_mut(&coord).ok_or(EditError::ChunkNotLoaded(coord))?;
    let volume = handle.voxels.as_mut().ok_or(EditError::ChunkNotGenerated(coord))?;
    Arc::make_mut(volume).set_local(local, cell);
    handle.mark_dirty();
    let on_boundary = local.x == 0 || local.y == 0 || local.z == 0
      || local.x == logical.x - 1 || local.y == logical.y - 1 || local.z == logical.z - 1;
    if on_boundary {
      self.mark_neighbors_dirty(coord);
    }
    Ok(())
  }

  /// Adds `(1 - distance / radius) * intensity` to the density of every cell whose center lies within `radius` of
  /// `center`. Cells that end
  /// up inside keep their block material if they were blocks, and otherwise become isosurface cells of `material`;
  /// cells that end up outside become air. Cells of chunks that are not loaded or not generated are skipped. Returns the
  /// number of modified cells.
  #[profiling::function]
  pub fn modify_sphere(&mut self, center: Vec3, radius: f32, intensity: f32, material: u16) -> usize {
    if !(radius > 0.0) { return 0; }
    let logical = self.shape.logical();
    let min = center - Vec3::new(radius, radius, radius);
    let max = center + Vec3::new(radius, radius, radius);
    let mut modified = 0;
    let mut edited_chunks = FxHashSet::default();
    for z in min.z.floor() as i32..=max.z.ceil() as i32 {
      for y in min.y.floor() as i32..=max.y.ceil() as i32 {
        for x in min.x.floor() as i32..=max.x.ceil() as i32 {
          let world = IVec3::new(x, y, z);
          let distance = (cell_center(world) - center).mag();
          if distance > radius { continue; }
          let coord = world_to_chunk(world, logical);
          let Some(volume) = self.chunks.0.get_mut(&coord).and_then(|c| c.voxels.as_mut()) else { continue; };
          let local = world_to_local(world, logical);
          let volume = Arc::make_mut(volume);
          let old = volume.get_local(local);
          let density = old.density() + (1.0 - distance / radius) * intensity;
          volume.set_local(local, old.with_density(density, material));
          edited_chunks.insert(coord);
          modified += 1;
        }
      }
    }
    for coord in edited_chunks {
      if let Some(handle) = self.chunks.0.get_mut(&coord) {
        handle.mark_dirty();
      }
      self.mark_neighbors_dirty(coord);
    }
    modified
  }

  fn mark_neighbors_dirty(&mut self, coord: ChunkCoord) {
    let chunks = &mut self.chunks.0;
    coord.for_each_neighbor(|neighbor| {
      if let Some(handle) = chunks.get_mut(&neighbor) {
        handle.mark_dirty();
      }
    });
  }


  // Assembler cache

  fn acquire_assembler(&mut self) -> MeshAssembler {
    match self.assembler_cache.pop_front() {
      Some(mut assembler) if assembler.fits(self.shape) => {
        assembler.reset();
        assembler
      }
      _ => MeshAssembler::new(self.shape),
    }
  }

  fn recycle_assembler(&mut self, assembler: SharedAssembler) {
    if self.assembler_cache.len() >= self.settings.mesh_assembler_cache_size { return; }
    // Only succeeds once no job holds the assembler anymore.
    if let Ok(assembler) = Arc::try_unwrap(assembler) {
      let mut assembler = assembler.into_inner();
      assembler.reset();
      self.assembler_cache.push_back(assembler);
    }
  }

  fn recycle_input(&mut self, input: JobInput) {
    if let JobInput::Blocks { assembler, .. } | JobInput::Isosurface { assembler, .. } = input {
      self.recycle_assembler(assembler);
    }
  }


  // Jobs

  #[inline]
  fn next_generation(&mut self) -> u64 {
    let generation = self.next_generation;
    self.next_generation += 1;
    generation
  }

  #[inline]
  fn remove_job(&self, job: TerrainJob) {
    if self.job_queue.try_remove_job_and_dependents(job).is_err() {
      debug!("Cannot remove job {:?}: job queue has stopped", job);
    }
  }


  // Stopping

  /// Stops the job queue and joins all its threads.
  pub fn stop_and_join(mut self) -> std::thread::Result<()> {
    self.job_queue.take_and_join()
  }
}

impl<G> Drop for Terrain<G> {
  fn drop(&mut self) {
    if let Err(e) = self.job_queue.take_and_join() {
      error!("Job queue thread panicked while stopping terrain: {:?}", e);
    }
  }
}

