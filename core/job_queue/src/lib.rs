//! Job queue that runs jobs on a pool of worker threads, where a job only starts once every job it depends on has
//! completed. Outputs of completed dependencies are handed to the dependent job.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, unbounded};
pub use crossbeam_channel::SendError;
use smallvec::SmallVec;

use manager::{FromQueueMessage, ManagerThread};
use worker::WorkerThread;

mod worker;
mod manager;


// Message from manager

#[derive(Debug)]
pub enum JobQueueMessage<J, I, O> {
  /// Job with key `J` has completed with output `O`.
  JobCompleted(J, Arc<O>),
  /// Job with key `J` was not added because a job with the same key already exists. Its input is handed back.
  JobRejected(J, I),
  /// Pending job with key `J` was removed before it was scheduled. Its input is handed back.
  PendingJobRemoved(J, I),
  /// Running job with key `J` was removed. It ran to completion, but its output was dropped.
  RunningJobRemoved(J),
  /// Completed job with key `J` was removed.
  CompletedJobRemoved(J, Arc<O>),
  /// There are no more pending or running jobs.
  QueueEmpty,
}


// Job queue

pub struct JobQueue<J, D, I, O, const DS: usize = 2> {
  manager_thread_handle: Option<JoinHandle<()>>,
  worker_thread_handles: Vec<JoinHandle<()>>,
  to_manager: Sender<FromQueueMessage<J, D, I, DS>>,
  from_manager: Receiver<JobQueueMessage<J, I, O>>,
}

impl<J: JobKey, D: DepKey, I: In, O: Out, const DS: usize> JobQueue<J, D, I, O, DS> {
  pub fn new(worker_thread_count: usize, handler: impl Handler<J, D, I, O, DS>) -> std::io::Result<Self> {
    let (external_to_manager_sender, external_to_manager_receiver) = unbounded();
    let (manager_to_worker_sender, manager_to_worker_receiver) = unbounded();
    let (worker_to_manager_sender, worker_to_manager_receiver) = unbounded();
    let (manager_to_external_sender, manager_to_external_receiver) = unbounded();

    let manager_thread = ManagerThread::new(
      external_to_manager_receiver,
      manager_to_worker_sender,
      worker_to_manager_receiver,
      manager_to_external_sender,
    );
    let manager_thread_handle = manager_thread.create_thread_and_run()?;

    let mut worker_thread_handles = Vec::with_capacity(worker_thread_count);
    for i in 0..worker_thread_count {
      let from_manager = manager_to_worker_receiver.clone();
      let to_manager = worker_to_manager_sender.clone();
      let handler = handler.clone();
      let worker_thread = WorkerThread::new(
        from_manager,
        to_manager,
        handler,
      );
      let worker_thread_handle = worker_thread.create_thread_and_run(i)?;
      worker_thread_handles.push(worker_thread_handle);
    }

    Ok(Self {
      manager_thread_handle: Some(manager_thread_handle),
      worker_thread_handles,
      to_manager: external_to_manager_sender,
      from_manager: manager_to_external_receiver,
    })
  }


  #[inline]
  pub fn try_add_job(&self, job_key: J, input: I) -> Result<(), SendError<()>> {
    self.try_add_job_with_dependencies(job_key, input, Dependencies::new())
  }

  /// Adds a job that will only be scheduled once all jobs in `dependencies` have completed. Dependencies must already
  /// have been added; unknown dependencies are ignored with a warning.
  #[inline]
  pub fn try_add_job_with_dependencies(&self, job_key: J, input: I, dependencies: Dependencies<J, D, DS>) -> Result<(), SendError<()>> {
    self.to_manager.send(FromQueueMessage::AddJob(job_key, dependencies, input)).map_err(|_| SendError(()))
  }

  /// Removes the job with `job_key`, along with every job that (transitively) depends on it.
  #[inline]
  pub fn try_remove_job_and_dependents(&self, job_key: J) -> Result<(), SendError<()>> {
    self.to_manager.send(FromQueueMessage::RemoveJob(job_key)).map_err(|_| SendError(()))
  }


  #[inline]
  pub fn get_message_receiver(&self) -> &Receiver<JobQueueMessage<J, I, O>> { &self.from_manager }


  pub fn stop_and_join(mut self) -> thread::Result<()> {
    self.stop();
    self.join()
  }

  pub fn stop(&mut self) {
    // Replace sender and receiver with new ones that do nothing, dropping the replaced ones.
    let (empty_sender, _) = bounded(0);
    drop(std::mem::replace(&mut self.to_manager, empty_sender));
    let (_, empty_receiver) = bounded(0);
    drop(std::mem::replace(&mut self.from_manager, empty_receiver));
  }

  /// Takes ownership of self by replacing it with a default job queue that does nothing, then stops and joins the
  /// taken self.
  pub fn take_and_join(&mut self) -> thread::Result<()> {
    let job_queue = std::mem::take(self);
    job_queue.stop_and_join()
  }

  pub fn join(mut self) -> thread::Result<()> {
    if let Some(join_handle) = self.manager_thread_handle.take() {
      join_handle.join()?;
    }
    for worker_thread in self.worker_thread_handles.drain(..) {
      worker_thread.join()?;
    }
    Ok(())
  }
}

impl<J, D, I, O, const DS: usize> Default for JobQueue<J, D, I, O, DS> {
  fn default() -> Self {
    let (empty_sender, _) = bounded(0);
    let (_, empty_receiver) = bounded(0);
    Self {
      manager_thread_handle: None,
      worker_thread_handles: Vec::new(),
      to_manager: empty_sender,
      from_manager: empty_receiver,
    }
  }
}


// Dependencies

pub type Dependencies<J, D, const DS: usize> = SmallVec<[(D, J); DS]>;


// Handler

pub type DependencyOutputs<D, O, const DS: usize> = SmallVec<[(D, Arc<O>); DS]>;

pub trait Handler<J, D, I, O, const DS: usize>: FnMut(J, DependencyOutputs<D, O, DS>, I) -> O + Clone + Send + 'static {}

impl<T, J, D, I, O, const DS: usize> Handler<J, D, I, O, DS> for T where T: FnMut(J, DependencyOutputs<D, O, DS>, I) -> O + Clone + Send + 'static {}


// Trait aliases

pub trait JobKey: Send + Copy + Eq + Ord + Hash + Debug + 'static {}

impl<T> JobKey for T where T: Send + Copy + Eq + Ord + Hash + Debug + 'static {}


pub trait DepKey: Send + Copy + Debug + 'static {}

impl<T> DepKey for T where T: Send + Copy + Debug + 'static {}


pub trait In: Send + 'static {}

impl<T> In for T where T: Send + 'static {}


pub trait Out: Send + Sync + 'static {}

impl<T> Out for T where T: Send + Sync + 'static {}
