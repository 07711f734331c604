use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";

/// Keeps the file writer alive; dropping it flushes the log file.
pub struct Tracing {
  _file_layer_guard: Option<WorkerGuard>,
}

impl Tracing {
  /// Initializes tracing to stderr with filter `CONSOLE_LOG`, and to the file at `FILE_LOG_PATH` (if set) with filter
  /// `FILE_LOG`. Filters default to `info`.
  pub fn init_from_env() -> Self {
    let console_filter = env_filter("CONSOLE_LOG");
    let file = std::env::var_os("FILE_LOG_PATH").map(|p| (PathBuf::from(p), env_filter("FILE_LOG")));
    Self::init(console_filter, file)
  }

  fn init(console_filter: EnvFilter, file: Option<(PathBuf, EnvFilter)>) -> Self {
    let console_layer = tracing_subscriber::fmt::layer()
      .with_writer(std::io::stderr)
      .with_filter(console_filter);
    let registry = tracing_subscriber::registry().with(console_layer);

    let file_layer = file.and_then(|(path, filter)| file_tracing(&path, filter));
    match file_layer {
      Some((layer, guard)) => {
        registry.with(layer).init();
        Self { _file_layer_guard: Some(guard) }
      }
      None => {
        registry.init();
        Self { _file_layer_guard: None }
      }
    }
  }
}

fn env_filter(var: &str) -> EnvFilter {
  EnvFilter::new(std::env::var(var).unwrap_or_else(|_| DEFAULT_FILTER.to_string()))
}

fn file_tracing<S>(file_path: &Path, filter: EnvFilter) -> Option<(Box<dyn Layer<S> + Send + Sync + 'static>, WorkerGuard)> where
  S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>
{
  let result = (|| {
    if let Some(parent) = file_path.parent() {
      create_dir_all(parent)?;
    }
    File::create(file_path)
  })();

  match result {
    Err(e) => {
      eprintln!("Cannot trace to file; could not truncate/create and open file '{}' for writing: {}", file_path.display(), e);
      None
    }
    Ok(file) => {
      let (non_blocking, guard) = tracing_appender::non_blocking(BufWriter::new(file));
      let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(filter)
        .boxed();
      Some((layer, guard))
    }
  }
}
