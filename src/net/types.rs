/// An outgoing request as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub url: String,
  pub method: String,
  /// Header pairs in the order they were set
  pub headers: Vec<(String, String)>,
  pub body: Option<String>,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method: "GET".to_string(),
      headers: Vec::new(),
      body: None,
    }
  }

  #[cfg(test)]
  pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method: "POST".to_string(),
      headers: Vec::new(),
      body: Some(body.into()),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }
}

/// A response, either from the network, the cache, or synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  #[allow(dead_code)]
  /// First header value matching `name` (case-insensitive).
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let response = Response::new(200, "{}").with_header("Content-Type", "application/json");
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.header("etag"), None);
  }

  #[test]
  fn test_ok_range() {
    assert!(Response::new(204, "").ok());
    assert!(!Response::new(404, "").ok());
    assert!(!Response::new(500, "").ok());
  }
}
