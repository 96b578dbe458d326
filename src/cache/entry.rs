//! Cached response records.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::net::Response;

/// A response stored in a named cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// Generation the entry was found in
  pub cache_name: String,
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Storage key for a request URL.
///
/// The fragment never reaches the server, so it does not take part in matching.
pub fn entry_key(url: &str) -> String {
  let without_fragment = url.split('#').next().unwrap_or(url);

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(without_fragment.as_bytes());
  hex::encode(hasher.finalize())
}
