//! Request/response types and the network seam the worker fetches through.

mod client;
mod error;
#[cfg(test)]
pub mod mock;
mod types;

pub use client::{HttpClient, Network};
pub use error::FetchError;
pub use types::{Request, Response};
