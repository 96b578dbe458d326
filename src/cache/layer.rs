//! Asset cache manager: installs the current cache generation and evicts stale ones.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::entry::CachedResponse;
use super::storage::CacheStorage;
use crate::config::Config;
use crate::net::{Network, Request, Response};

/// Manages the named cache generation for the worker.
///
/// This layer sits between the interceptor and the storage backend and knows
/// which generation is current and which assets belong in it.
pub struct AssetCache<S: CacheStorage> {
  storage: Arc<S>,
  /// Current generation
  cache_name: String,
  /// Install-time asset URLs, resolved against the origin
  assets: Vec<String>,
  /// Resolved URL of the offline fallback page
  offline_url: String,
}

impl<S: CacheStorage> AssetCache<S> {
  pub fn new(storage: S, config: &Config) -> Result<Self> {
    let assets = config
      .assets
      .iter()
      .map(|asset| config.resolve(asset))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      storage: Arc::new(storage),
      cache_name: config.cache_name.clone(),
      assets,
      offline_url: config.resolve(&config.offline_url)?,
    })
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  #[allow(dead_code)]
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Whether the current generation already exists in storage.
  pub fn is_installed(&self) -> Result<bool> {
    self.storage.has(&self.cache_name)
  }

  /// Fetch every asset and store them in the current generation.
  ///
  /// All-or-nothing: if any asset fails to fetch or answers with a non-2xx
  /// status, nothing is written.
  pub async fn install<N: Network + ?Sized>(&self, network: &N) -> Result<()> {
    info!(cache = %self.cache_name, assets = self.assets.len(), "installing asset cache");

    let fetches = self.assets.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let response = network
        .fetch(&request)
        .await
        .map_err(|e| eyre!("Failed to cache asset {}: {}", url, e))?;
      if !response.ok() {
        return Err(eyre!(
          "Failed to cache asset {}: status {}",
          url,
          response.status
        ));
      }
      Ok((url.clone(), response))
    });
    let entries = try_join_all(fetches).await?;

    self.storage.put_all(&self.cache_name, &entries)?;
    debug!(cache = %self.cache_name, "asset cache populated");
    Ok(())
  }

  /// Delete every generation except the current one. Returns the deleted names.
  pub fn activate(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in self.storage.keys()? {
      if name != self.cache_name && self.storage.delete(&name)? {
        info!(cache = %name, "deleted stale cache generation");
        deleted.push(name);
      }
    }
    Ok(deleted)
  }

  /// Look up a URL across all live generations.
  pub fn match_url(&self, url: &str) -> Result<Option<CachedResponse>> {
    self.storage.match_url(None, url)
  }

  /// Store a response in the current generation.
  pub fn put(&self, url: &str, response: &Response) -> Result<()> {
    self.storage.put(&self.cache_name, url, response)
  }

  /// The cached offline fallback page, if present.
  pub fn offline_page(&self) -> Result<Option<CachedResponse>> {
    self.match_url(&self.offline_url)
  }
}

impl<S: CacheStorage> Clone for AssetCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      cache_name: self.cache_name.clone(),
      assets: self.assets.clone(),
      offline_url: self.offline_url.clone(),
    }
  }
}
