use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::net::{Network, Request};
use crate::worker::{Served, SyncReport};

/// Events delivered to the worker by its host
#[derive(Debug, Clone)]
pub enum WorkerEvent {
  /// Populate the current cache generation
  Install,
  /// Evict stale generations and take control
  Activate,
  /// Intercept an outgoing request
  Fetch(Request),
  /// Connectivity restored; `tag` names the registered sync
  Sync { tag: String },
}

impl WorkerEvent {
  pub fn kind(&self) -> &'static str {
    match self {
      WorkerEvent::Install => "install",
      WorkerEvent::Activate => "activate",
      WorkerEvent::Fetch(_) => "fetch",
      WorkerEvent::Sync { .. } => "sync",
    }
  }
}

/// What handling an event produced
#[derive(Debug)]
pub enum EventOutcome {
  Installed,
  Activated { evicted: Vec<String> },
  Response(Served),
  Synced(SyncReport),
  /// Sync with an unrecognized tag
  Ignored,
}

/// Connectivity watcher that produces sync events on reconnect
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl EventHandler {
  /// Probe `probe` every `interval`; emit `Sync { tag }` when the first probe
  /// succeeds and on every offline to online transition.
  pub fn new<N>(network: Arc<N>, probe: Request, interval: Duration, tag: String) -> Self
  where
    N: Network + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      let mut was_online: Option<bool> = None;

      loop {
        ticker.tick().await;
        // A probe still pending after one interval counts as offline
        let online = matches!(
          tokio::time::timeout(interval, network.fetch(&probe)).await,
          Ok(Ok(_))
        );

        if was_online != Some(online) {
          if online {
            info!(url = %probe.url, "connectivity restored");
            if tx.send(WorkerEvent::Sync { tag: tag.clone() }).is_err() {
              break;
            }
          } else {
            info!(url = %probe.url, "connectivity lost");
          }
        } else {
          debug!(online, "connectivity unchanged");
        }
        was_online = Some(online);

        if tx.is_closed() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<WorkerEvent> {
    self.rx.recv().await
  }
}
