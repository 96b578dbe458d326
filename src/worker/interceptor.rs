//! Fetch interception: network-first with offline queueing for mutating
//! requests, cache-first with network fallback for everything else.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::wait::WaitUntil;
use crate::cache::{AssetCache, CacheStorage};
use crate::net::{Network, Request, Response};
use crate::queue::OfflineQueue;

pub const OFFLINE_NOTICE: &str =
  "You are offline. Your request will be processed when you are back online.";

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
  /// API call or form submission; never cached, queued when offline
  Mutating,
  /// Page or asset; served cache-first
  Static,
}

/// Classify by URL: any configured marker makes the request mutating.
pub fn classify(request: &Request, markers: &[String]) -> RequestKind {
  if markers
    .iter()
    .any(|marker| request.url.contains(marker.as_str()))
  {
    RequestKind::Mutating
  } else {
    RequestKind::Static
  }
}

/// Stand-in response handed back when a mutating request is queued.
///
/// Status stays 200 so the page can read the JSON body instead of failing.
pub fn offline_response() -> Response {
  let body = serde_json::json!({ "error": OFFLINE_NOTICE }).to_string();
  Response::new(200, body).with_header("Content-Type", "application/json")
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  Network,
  Cache,
  /// Cached offline page served in place of the requested one
  OfflineFallback,
  /// Synthesized after queueing the request under this id
  Queued(i64),
}

/// A response together with its source.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: ResponseSource,
}

impl Served {
  fn new(response: Response, source: ResponseSource) -> Self {
    Self { response, source }
  }
}

pub struct Interceptor<S: CacheStorage, N: Network> {
  cache: AssetCache<S>,
  queue: OfflineQueue,
  network: Arc<N>,
  markers: Vec<String>,
  wait: WaitUntil,
}

impl<S: CacheStorage, N: Network> Interceptor<S, N> {
  pub fn new(
    cache: AssetCache<S>,
    queue: OfflineQueue,
    network: Arc<N>,
    markers: Vec<String>,
    wait: WaitUntil,
  ) -> Self {
    Self {
      cache,
      queue,
      network,
      markers,
      wait,
    }
  }

  pub async fn handle(&self, request: &Request) -> Result<Served> {
    match classify(request, &self.markers) {
      RequestKind::Mutating => self.handle_mutating(request).await,
      RequestKind::Static => self.handle_static(request).await,
    }
  }

  async fn handle_mutating(&self, request: &Request) -> Result<Served> {
    match self.network.fetch(request).await {
      Ok(response) => Ok(Served::new(response, ResponseSource::Network)),
      Err(e) if e.is_unreachable() => {
        let id = self.queue.add(request)?;
        info!(id, method = %request.method, url = %request.url, error = %e, "queued request for background sync");
        Ok(Served::new(offline_response(), ResponseSource::Queued(id)))
      }
      // Rejected before sending, or already received by the server: replaying
      // would either fail forever or submit twice
      Err(e) => {
        warn!(method = %request.method, url = %request.url, error = %e, "request failed, not queued");
        Err(e.into())
      }
    }
  }

  async fn handle_static(&self, request: &Request) -> Result<Served> {
    // Only GET responses are cacheable
    let cacheable = request.method.eq_ignore_ascii_case("GET");

    if cacheable {
      if let Some(cached) = self.cache.match_url(&request.url)? {
        debug!(
          url = %request.url,
          cache = %cached.cache_name,
          cached_at = %cached.cached_at,
          "cache hit"
        );
        return Ok(Served::new(cached.response, ResponseSource::Cache));
      }
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if cacheable {
          let cache = self.cache.clone();
          let url = request.url.clone();
          let copy = response.clone();
          self.wait.spawn_blocking(move || cache.put(&url, &copy))?;
        }
        Ok(Served::new(response, ResponseSource::Network))
      }
      Err(e) => match self.cache.offline_page()? {
        Some(page) => {
          warn!(url = %request.url, error = %e, "network unavailable, serving offline page");
          Ok(Served::new(page.response, ResponseSource::OfflineFallback))
        }
        None => Err(eyre!("{} (no offline page cached)", e)),
      },
    }
  }
}
