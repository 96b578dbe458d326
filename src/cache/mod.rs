//! Named response caches backing the worker's static asset handling.
//!
//! - One generation (named cache) is current; activation evicts the others
//! - Entries are keyed by request URL and hold the full captured response
//! - Lookups without a cache name search every live generation

mod entry;
mod layer;
mod storage;

pub use layer::AssetCache;
pub use storage::{CacheStorage, SqliteStorage};
