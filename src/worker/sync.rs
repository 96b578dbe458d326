//! Background sync: replay queued requests once connectivity returns.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::net::Network;
use crate::queue::OfflineQueue;

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Ids replayed and removed from the queue
  pub replayed: Vec<i64>,
  /// Ids that failed again and stay queued
  pub failed: Vec<i64>,
}

pub struct SyncReplayer<N: Network> {
  queue: OfflineQueue,
  network: Arc<N>,
}

impl<N: Network> SyncReplayer<N> {
  pub fn new(queue: OfflineQueue, network: Arc<N>) -> Self {
    Self { queue, network }
  }

  /// Replay every queued request, one at a time, in store order.
  ///
  /// Any response counts as delivered, even one whose body is lost. Other
  /// failures keep the record for the next sync and do not stop the run.
  /// Store errors abort it.
  pub async fn replay(&self) -> Result<SyncReport> {
    let pending = self.queue.get_all()?;
    let mut report = SyncReport::default();
    debug!(pending = pending.len(), "starting background sync");

    for queued in pending {
      match self.network.fetch(&queued.to_request()).await {
        Ok(response) => {
          self.queue.delete(queued.id)?;
          debug!(id = queued.id, status = response.status, "replayed queued request");
          report.replayed.push(queued.id);
        }
        Err(e) if e.was_delivered() => {
          self.queue.delete(queued.id)?;
          warn!(id = queued.id, url = %queued.url, error = %e, "replayed queued request, response lost");
          report.replayed.push(queued.id);
        }
        Err(e) => {
          warn!(id = queued.id, url = %queued.url, error = %e, "sync failed for request");
          report.failed.push(queued.id);
        }
      }
    }

    info!(
      replayed = report.replayed.len(),
      failed = report.failed.len(),
      "background sync finished"
    );
    Ok(report)
  }
}
