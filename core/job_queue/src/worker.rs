use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use petgraph::graph::NodeIndex;
use tracing::trace;

use crate::{DependencyOutputs, DepKey, Handler, In, JobKey, Out};

pub(crate) type FromManager<J, D, I, O, const DS: usize> = (NodeIndex, J, DependencyOutputs<D, O, DS>, I);

pub(super) struct WorkerThread<J, D, I, O, H, const DS: usize> {
  from_manager: Receiver<FromManager<J, D, I, O, DS>>,
  to_manager: Sender<crate::manager::FromWorker<O>>,
  handler: H,
}

impl<J: JobKey, D: DepKey, I: In, O: Out, H: Handler<J, D, I, O, DS>, const DS: usize> WorkerThread<J, D, I, O, H, DS> {
  #[inline]
  pub(super) fn new(
    from_manager: Receiver<FromManager<J, D, I, O, DS>>,
    to_manager: Sender<crate::manager::FromWorker<O>>,
    handler: H,
  ) -> Self {
    Self {
      from_manager,
      to_manager,
      handler,
    }
  }

  #[inline]
  pub(super) fn create_thread_and_run(self, thread_index: usize) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
      .name(format!("Job Queue Worker {}", thread_index))
      .spawn(move || { self.run(thread_index) })
  }

  fn run(mut self, thread_index: usize) {
    trace!("Started job queue worker thread {}", thread_index);
    while let Ok((node_index, job_key, dependency_outputs, input)) = self.from_manager.recv() {
      trace!("Running job {:?} ({:?})", job_key, node_index);
      let output = (self.handler)(job_key, dependency_outputs, input);
      if self.to_manager.send((node_index, output)).is_err() {
        break; // Manager has disconnected; stop this thread.
      }
    }
    trace!("Stopped job queue worker thread {}", thread_index);
  }
}
