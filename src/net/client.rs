use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

use crate::config::Config;

use super::error::FetchError;
use super::types::{Request, Response};

/// The network as seen by the worker.
///
/// A fetch settles once response headers arrive; HTTP error statuses are
/// returned as `Ok`. See [`FetchError`] for the ways it can fail.
pub trait Network: Send + Sync {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>>;
}

/// reqwest-backed network client
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

impl HttpClient {
  /// Requests run without a deadline unless `request_timeout_secs` is set.
  pub fn new(config: &Config) -> Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.request_timeout() {
      builder = builder.timeout(timeout);
    }
    let client = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  fn build(&self, request: &Request) -> Result<reqwest::RequestBuilder, FetchError> {
    let invalid = |reason: String| FetchError::Invalid {
      url: request.url.clone(),
      reason,
    };

    let method = Method::from_bytes(request.method.as_bytes())
      .map_err(|e| invalid(format!("method {}: {}", request.method, e)))?;

    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
      let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| invalid(format!("header name '{}': {}", name, e)))?;
      let value = HeaderValue::from_str(value)
        .map_err(|e| invalid(format!("header value for {}: {}", name, e)))?;
      headers.append(header, value);
    }

    let mut builder = self.client.request(method, &request.url).headers(headers);
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }
    Ok(builder)
  }

  async fn send(&self, request: &Request) -> Result<Response, FetchError> {
    let response = self.build(request)?.send().await.map_err(|e| {
      if e.is_builder() {
        FetchError::Invalid {
          url: request.url.clone(),
          reason: e.to_string(),
        }
      } else {
        FetchError::Unreachable {
          url: request.url.clone(),
          reason: e.to_string(),
        }
      }
    })?;

    // Headers are in: from here on the server has seen the request
    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await.map_err(|e| FetchError::Body {
      url: request.url.clone(),
      status,
      reason: e.to_string(),
    })?;

    Ok(Response {
      status,
      headers,
      body: body.to_vec(),
    })
  }
}

impl Network for HttpClient {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
    Box::pin(self.send(request))
  }
}
