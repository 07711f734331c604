use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, select, Sender};
use petgraph::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::{Dependencies, DependencyOutputs, DepKey, In, JobKey, JobQueueMessage, Out};

// Message from queue

pub(crate) enum FromQueueMessage<J, D, I, const DS: usize> {
  AddJob(J, Dependencies<J, D, DS>, I),
  RemoveJob(J),
}

// Manager thread

pub(crate) type FromWorker<O> = (NodeIndex, O);

pub(super) struct ManagerThread<J, D, I, O, const DS: usize> {
  from_queue: Receiver<FromQueueMessage<J, D, I, DS>>,
  to_worker: Sender<crate::worker::FromManager<J, D, I, O, DS>>,
  from_worker: Receiver<FromWorker<O>>,
  to_queue: Sender<JobQueueMessage<J, I, O>>,

  job_graph: StableDiGraph<JobStatus<J, I, O>, D>,
  job_key_to_node_index: FxHashMap<J, NodeIndex>,
  /// Number of pending and running jobs, including running jobs that were removed.
  active_job_count: usize,
  node_index_cache: Vec<NodeIndex>,
}

impl<J: JobKey, D: DepKey, I: In, O: Out, const DS: usize> ManagerThread<J, D, I, O, DS> {
  #[inline]
  pub(super) fn new(
    from_queue: Receiver<FromQueueMessage<J, D, I, DS>>,
    to_worker: Sender<crate::worker::FromManager<J, D, I, O, DS>>,
    from_worker: Receiver<FromWorker<O>>,
    to_queue: Sender<JobQueueMessage<J, I, O>>,
  ) -> Self {
    Self {
      from_queue,
      to_worker,
      from_worker,
      to_queue,
      job_graph: StableDiGraph::new(),
      job_key_to_node_index: FxHashMap::default(),
      active_job_count: 0,
      node_index_cache: Vec::new(),
    }
  }

  #[inline]
  pub(super) fn create_thread_and_run(self) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
      .name("Job Queue Manager".into())
      .spawn(|| { self.run() })
  }

  fn run(mut self) {
    trace!("Started job queue manager thread");
    loop {
      select! {
        recv(self.from_queue) -> message => {
          let Ok(message) = message else {
            break; // Job queue was dropped; stop this thread.
          };
          if !self.handle_message(message) {
            break; // Workers or job queue have disconnected; stop this thread.
          }
        },
        recv(self.from_worker) -> result => {
          let Ok((node_index, output)) = result else {
            break; // All workers have disconnected; stop this thread.
          };
          if !self.complete_job(node_index, output) {
            break; // Workers or job queue have disconnected; stop this thread.
          }
        },
      }
    }
    trace!("Stopped job queue manager thread");
  }

  #[profiling::function]
  fn handle_message(&mut self, message: FromQueueMessage<J, D, I, DS>) -> bool {
    match message {
      FromQueueMessage::AddJob(job_key, dependencies, input) => {
        if self.job_key_to_node_index.contains_key(&job_key) {
          trace!("Rejecting job {:?}: a job with the same key already exists", job_key);
          return self.to_queue.send(JobQueueMessage::JobRejected(job_key, input)).is_ok();
        }
        let node_index = self.job_graph.add_node(JobStatus::Pending(job_key, input));
        for (dependency, dependency_job_key) in dependencies {
          if let Some(dependency_node_index) = self.job_key_to_node_index.get(&dependency_job_key) {
            self.job_graph.add_edge(node_index, *dependency_node_index, dependency);
          } else {
            warn!("Ignoring dependency {:?} of job {:?} on job {:?} which has not been added", dependency, job_key, dependency_job_key);
          }
        }
        self.job_key_to_node_index.insert(job_key, node_index);
        self.active_job_count += 1;
        trace!("Added job {:?} ({:?})", job_key, node_index);
        self.try_schedule(node_index)
      }
      FromQueueMessage::RemoveJob(job_key) => {
        let removed_active_job = self.remove_job_and_dependents(job_key);
        if !self.send_queue_empty_if(removed_active_job) { return false; }
        true
      }
    }
  }

  /// Removes the job with `job_key` and its dependents, returning `None` when the job queue disconnected, or whether a
  /// pending job was removed otherwise.
  fn remove_job_and_dependents(&mut self, job_key: J) -> Option<bool> {
    let Some(node_index) = self.job_key_to_node_index.remove(&job_key) else {
      return Some(false);
    };
    let dependents: Vec<NodeIndex> = self.job_graph.neighbors_directed(node_index, Incoming).collect();
    let mut removed_pending_job = false;
    for dependent_node_index in dependents {
      let Some(dependent_job_key) = self.job_graph.node_weight(dependent_node_index).and_then(|s| s.key()) else {
        continue; // Running job that was already removed.
      };
      removed_pending_job |= self.remove_job_and_dependents(dependent_job_key)?;
    }

    trace!("Removing job {:?} ({:?})", job_key, node_index);
    if let Some(JobStatus::Running(_)) = self.job_graph.node_weight(node_index) {
      // Keep the node so that its index is not reused while the job is running.
      self.job_graph[node_index] = JobStatus::RunningRemoved(job_key);
      return Some(removed_pending_job);
    }
    let message = match self.job_graph.remove_node(node_index) {
      Some(JobStatus::Pending(job_key, input)) => {
        self.active_job_count -= 1;
        removed_pending_job = true;
        JobQueueMessage::PendingJobRemoved(job_key, input)
      }
      Some(JobStatus::Completed(job_key, output)) => JobQueueMessage::CompletedJobRemoved(job_key, output),
      _ => return Some(removed_pending_job),
    };
    self.to_queue.send(message).ok()?;
    Some(removed_pending_job)
  }

  fn try_schedule(&mut self, node_index: NodeIndex) -> bool {
    let Some(JobStatus::Pending(job_key, _)) = self.job_graph.node_weight(node_index) else {
      return true;
    };
    let job_key = *job_key;
    let mut dependency_outputs = DependencyOutputs::<D, O, DS>::new();
    for edge in self.job_graph.edges_directed(node_index, Outgoing) {
      match &self.job_graph[edge.target()] {
        JobStatus::Completed(_, output) => dependency_outputs.push((*edge.weight(), output.clone())),
        _ => return true, // Not all dependencies have completed yet.
      }
    }
    let status = &mut self.job_graph[node_index];
    let JobStatus::Pending(_, input) = std::mem::replace(status, JobStatus::Running(job_key)) else {
      return true;
    };
    trace!("Scheduling job {:?} ({:?})", job_key, node_index);
    self.to_worker.send((node_index, job_key, dependency_outputs, input)).is_ok()
  }

  #[profiling::function]
  fn complete_job(&mut self, node_index: NodeIndex, output: O) -> bool {
    self.active_job_count -= 1;
    let Some(status) = self.job_graph.node_weight_mut(node_index) else {
      return self.send_queue_empty_if(Some(true));
    };
    match *status {
      JobStatus::Running(job_key) => {
        trace!("Completed job {:?} ({:?})", job_key, node_index);
        let output = Arc::new(output);
        *status = JobStatus::Completed(job_key, output.clone());
        if self.to_queue.send(JobQueueMessage::JobCompleted(job_key, output)).is_err() {
          return false;
        }
        self.node_index_cache.clear();
        self.node_index_cache.extend(self.job_graph.neighbors_directed(node_index, Incoming));
        let dependents = std::mem::take(&mut self.node_index_cache);
        for dependent_node_index in dependents.iter().copied() {
          if !self.try_schedule(dependent_node_index) {
            return false;
          }
        }
        self.node_index_cache = dependents;
      }
      JobStatus::RunningRemoved(job_key) => {
        self.job_graph.remove_node(node_index);
        trace!("Dropped output of removed job {:?} ({:?})", job_key, node_index);
        if self.to_queue.send(JobQueueMessage::RunningJobRemoved(job_key)).is_err() {
          return false;
        }
      }
      _ => {}
    }
    self.send_queue_empty_if(Some(true))
  }

  #[inline]
  fn send_queue_empty_if(&self, active_job_finished: Option<bool>) -> bool {
    match active_job_finished {
      None => false,
      Some(true) if self.active_job_count == 0 => self.to_queue.send(JobQueueMessage::QueueEmpty).is_ok(),
      Some(_) => true,
    }
  }
}


// Job status

pub(super) enum JobStatus<J, I, O> {
  Pending(J, I),
  Running(J),
  /// Job was removed while it was running; its output is dropped when it arrives.
  RunningRemoved(J),
  Completed(J, Arc<O>),
}

impl<J: Copy, I, O> JobStatus<J, I, O> {
  #[inline]
  fn key(&self) -> Option<J> {
    match self {
      Self::Pending(job_key, _) | Self::Running(job_key) | Self::Completed(job_key, _) => Some(*job_key),
      Self::RunningRemoved(_) => None,
    }
  }
}
