//! The offline worker: lifecycle state machine and event dispatch.
//!
//! Events arrive through [`ServiceWorker::dispatch`]. The lifecycle enforces
//! the host ordering guarantees: install completes before activate, and only
//! an activated worker intercepts fetches or replays the offline queue.

mod interceptor;
mod sync;
mod wait;

pub use interceptor::{classify, ResponseSource, Served};
pub use sync::SyncReport;

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::cache::{AssetCache, CacheStorage};
use crate::config::Config;
use crate::event::{EventOutcome, WorkerEvent};
use crate::net::{Network, Request};
use crate::queue::OfflineQueue;
use interceptor::Interceptor;
use sync::SyncReplayer;
use wait::WaitUntil;

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
  /// Created, no install attempted yet
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Install failed; this worker will never activate
  Redundant,
}

pub struct ServiceWorker<S: CacheStorage, N: Network> {
  state: Mutex<Lifecycle>,
  cache: AssetCache<S>,
  network: Arc<N>,
  interceptor: Interceptor<S, N>,
  replayer: SyncReplayer<N>,
  sync_tag: String,
  wait: WaitUntil,
}

impl<S: CacheStorage, N: Network> ServiceWorker<S, N> {
  pub fn new(config: &Config, cache: AssetCache<S>, queue: OfflineQueue, network: Arc<N>) -> Self {
    let wait = WaitUntil::new();
    let interceptor = Interceptor::new(
      cache.clone(),
      queue.clone(),
      Arc::clone(&network),
      config.mutating_markers.clone(),
      wait.clone(),
    );
    let replayer = SyncReplayer::new(queue, Arc::clone(&network));

    Self {
      state: Mutex::new(Lifecycle::Parsed),
      cache,
      network,
      interceptor,
      replayer,
      sync_tag: config.sync_tag.clone(),
      wait,
    }
  }

  pub fn state(&self) -> Result<Lifecycle> {
    self
      .state
      .lock()
      .map(|state| *state)
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn set_state(&self, next: Lifecycle) -> Result<()> {
    let mut state = self.state.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let from = *state;
    debug!(?from, to = ?next, "lifecycle transition");
    *state = next;
    Ok(())
  }

  /// Move to `next` if the current state is one of `from`.
  fn transition(&self, from: &[Lifecycle], next: Lifecycle) -> Result<()> {
    let current = self.state()?;
    if !from.contains(&current) {
      return Err(eyre!("Cannot move worker from {:?} to {:?}", current, next));
    }
    self.set_state(next)
  }

  /// Bring the worker to `Activated`, returning the activation outcome.
  ///
  /// A current generation already in storage means a previous run installed
  /// this worker, so it is reused; otherwise install and activate run.
  pub async fn start(&self) -> Result<EventOutcome> {
    match self.state()? {
      Lifecycle::Activated => return Ok(EventOutcome::Activated { evicted: Vec::new() }),
      Lifecycle::Parsed if self.cache.is_installed()? => {
        debug!(cache = %self.cache.cache_name(), "reusing installed worker");
        self.set_state(Lifecycle::Installed)?;
      }
      Lifecycle::Parsed => {
        self.dispatch(WorkerEvent::Install).await?;
      }
      _ => {}
    }
    self.dispatch(WorkerEvent::Activate).await
  }

  /// Handle one event to completion.
  pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
    debug!(event = event.kind(), "dispatching");
    match event {
      WorkerEvent::Install => self.on_install().await,
      WorkerEvent::Activate => self.on_activate(),
      WorkerEvent::Fetch(request) => self.on_fetch(&request).await,
      WorkerEvent::Sync { tag } => self.on_sync(&tag).await,
    }
  }

  /// Wait for background work spawned by earlier events.
  pub async fn settle(&self) -> Result<()> {
    self.wait.settle().await
  }

  async fn on_install(&self) -> Result<EventOutcome> {
    self.transition(&[Lifecycle::Parsed], Lifecycle::Installing)?;
    match self.cache.install(self.network.as_ref()).await {
      Ok(()) => {
        self.set_state(Lifecycle::Installed)?;
        info!(cache = %self.cache.cache_name(), "worker installed");
        Ok(EventOutcome::Installed)
      }
      Err(e) => {
        self.set_state(Lifecycle::Redundant)?;
        Err(e.wrap_err("Worker install failed"))
      }
    }
  }

  fn on_activate(&self) -> Result<EventOutcome> {
    let previous = self.state()?;
    self.transition(
      &[Lifecycle::Installed, Lifecycle::Activated],
      Lifecycle::Activating,
    )?;
    match self.cache.activate() {
      Ok(evicted) => {
        self.set_state(Lifecycle::Activated)?;
        info!(cache = %self.cache.cache_name(), evicted = evicted.len(), "worker activated");
        Ok(EventOutcome::Activated { evicted })
      }
      Err(e) => {
        // Eviction can be retried by the next activate
        self.set_state(previous)?;
        Err(e.wrap_err("Worker activation failed"))
      }
    }
  }

  async fn on_fetch(&self, request: &Request) -> Result<EventOutcome> {
    if self.state()? != Lifecycle::Activated {
      // Not in control yet: the request goes straight to the network
      debug!(url = %request.url, "worker not active, passing request through");
      let response = self.network.fetch(request).await?;
      return Ok(EventOutcome::Response(Served {
        response,
        source: ResponseSource::Network,
      }));
    }

    let served = self.interceptor.handle(request).await?;
    Ok(EventOutcome::Response(served))
  }

  async fn on_sync(&self, tag: &str) -> Result<EventOutcome> {
    if tag != self.sync_tag {
      debug!(tag, "ignoring unknown sync tag");
      return Ok(EventOutcome::Ignored);
    }
    if self.state()? != Lifecycle::Activated {
      warn!(tag, "sync delivered to inactive worker");
      return Err(eyre!("Worker is not active"));
    }

    let report = self.replayer.replay().await?;
    Ok(EventOutcome::Synced(report))
  }
}
