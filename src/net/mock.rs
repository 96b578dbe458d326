//! Scripted network for tests.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::client::Network;
use super::error::FetchError;
use super::types::{Request, Response};

#[derive(Debug, Clone, Copy)]
enum Failure {
  Unreachable,
  Invalid,
  Body,
}

#[derive(Default)]
pub struct MockNetwork {
  responses: Mutex<HashMap<String, Response>>,
  failing: Mutex<HashMap<String, Failure>>,
  offline: Mutex<bool>,
  calls: Mutex<Vec<Request>>,
}

impl MockNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  /// Serve `response` for `url`. Unscripted URLs answer 200 with the URL as body.
  pub fn respond(&self, url: &str, response: Response) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  /// Make every request to `url` fail at the network level.
  pub fn fail(&self, url: &str) {
    self.set_failure(url, Failure::Unreachable);
  }

  /// Reject requests to `url` before they are sent.
  pub fn reject(&self, url: &str) {
    self.set_failure(url, Failure::Invalid);
  }

  /// Deliver requests to `url` but lose the response body.
  pub fn truncate(&self, url: &str) {
    self.set_failure(url, Failure::Body);
  }

  pub fn recover(&self, url: &str) {
    self.failing.lock().unwrap().remove(url);
  }

  pub fn set_offline(&self, offline: bool) {
    *self.offline.lock().unwrap() = offline;
  }

  pub fn calls(&self) -> Vec<Request> {
    self.calls.lock().unwrap().clone()
  }

  pub fn called_urls(&self) -> Vec<String> {
    self.calls().into_iter().map(|r| r.url).collect()
  }

  pub fn clear_calls(&self) {
    self.calls.lock().unwrap().clear();
  }

  fn set_failure(&self, url: &str, failure: Failure) {
    self
      .failing
      .lock()
      .unwrap()
      .insert(url.to_string(), failure);
  }
}

impl Network for MockNetwork {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
    Box::pin(async move {
      self.calls.lock().unwrap().push(request.clone());

      let url = request.url.clone();
      let failure = if *self.offline.lock().unwrap() {
        Some(Failure::Unreachable)
      } else {
        self.failing.lock().unwrap().get(&url).copied()
      };

      match failure {
        Some(Failure::Unreachable) => Err(FetchError::Unreachable {
          url,
          reason: "network unreachable".to_string(),
        }),
        Some(Failure::Invalid) => Err(FetchError::Invalid {
          url,
          reason: "invalid header name".to_string(),
        }),
        Some(Failure::Body) => Err(FetchError::Body {
          url,
          status: 200,
          reason: "connection closed before message completed".to_string(),
        }),
        None => {
          let scripted = self.responses.lock().unwrap().get(&url).cloned();
          Ok(scripted.unwrap_or_else(|| Response::new(200, url)))
        }
      }
    })
  }
}

/// Local HTTP server for one connection: reads the request head, writes
/// `reply` verbatim, then holds the socket open for `hold`.
///
/// Returns the base URL and a count of requests received.
pub async fn serve_once(reply: &'static str, hold: Duration) -> (String, Arc<AtomicUsize>) {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let received = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&received);

  tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut seen = Vec::new();
    let mut buf = [0u8; 1024];
    while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
      let n = socket.read(&mut buf).await.unwrap();
      if n == 0 {
        return;
      }
      seen.extend_from_slice(&buf[..n]);
    }
    counter.fetch_add(1, Ordering::SeqCst);
    socket.write_all(reply.as_bytes()).await.unwrap();
    socket.flush().await.unwrap();
    tokio::time::sleep(hold).await;
  });

  (format!("http://{}", addr), received)
}
