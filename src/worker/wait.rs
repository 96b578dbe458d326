//! Work that must finish before an event is considered done.

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::warn;

/// Set of tasks that extend the lifetime of the events that spawned them.
///
/// A response can be handed back before its side effects resolve; the host
/// calls [`WaitUntil::settle`] to hold the worker open until they have.
#[derive(Clone, Default)]
pub struct WaitUntil {
  tasks: Arc<Mutex<JoinSet<Result<()>>>>,
}

impl WaitUntil {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run blocking storage work in the background.
  pub fn spawn_blocking<F>(&self, work: F) -> Result<()>
  where
    F: FnOnce() -> Result<()> + Send + 'static,
  {
    self
      .tasks
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .spawn_blocking(work);
    Ok(())
  }

  #[allow(dead_code)]
  pub fn pending(&self) -> usize {
    self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
  }

  /// Wait for every outstanding task. All tasks are drained even when one
  /// fails; the first failure is returned.
  pub async fn settle(&self) -> Result<()> {
    let mut tasks = {
      let mut guard = self.tasks.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      std::mem::take(&mut *guard)
    };

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
      let outcome = joined.map_err(|e| eyre!("Background task failed: {}", e)).and_then(|r| r);
      if let Err(e) = outcome {
        warn!(error = %e, "background work failed");
        first_error.get_or_insert(e);
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}
