use thiserror::Error;

/// Why a fetch produced no usable response.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The request could not be built, so nothing was sent
  #[error("Invalid request {url}: {reason}")]
  Invalid { url: String, reason: String },

  /// No response arrived: offline, DNS, refused connection, timeout
  #[error("Failed to fetch {url}: {reason}")]
  Unreachable { url: String, reason: String },

  /// The server answered but its body could not be read
  #[error("Failed to read body of {url} (status {status}): {reason}")]
  Body {
    url: String,
    status: u16,
    reason: String,
  },
}

impl FetchError {
  /// True when the request never reached the server and can be sent again.
  pub fn is_unreachable(&self) -> bool {
    matches!(self, FetchError::Unreachable { .. })
  }

  /// True when the server has seen the request.
  pub fn was_delivered(&self) -> bool {
    matches!(self, FetchError::Body { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_unreachable_is_retryable() {
    let unreachable = FetchError::Unreachable {
      url: "http://localhost:8080/api/x".to_string(),
      reason: "connection refused".to_string(),
    };
    let invalid = FetchError::Invalid {
      url: "http://localhost:8080/api/x".to_string(),
      reason: "invalid header name".to_string(),
    };
    let body = FetchError::Body {
      url: "http://localhost:8080/api/x".to_string(),
      status: 200,
      reason: "connection closed".to_string(),
    };

    assert!(unreachable.is_unreachable());
    assert!(!invalid.is_unreachable());
    assert!(!body.is_unreachable());
    assert!(body.was_delivered());
    assert!(!invalid.was_delivered());
    assert_eq!(
      body.to_string(),
      "Failed to read body of http://localhost:8080/api/x (status 200): connection closed"
    );
  }
}
