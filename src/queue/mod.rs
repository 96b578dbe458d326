//! Durable queue of mutating requests that failed while offline.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;

use crate::db::{parse_datetime, Database};
use crate::net::Request;

/// A failed request, snapshotted at failure time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
  /// Assigned by the store, increasing with every insert
  pub id: i64,
  pub url: String,
  pub method: String,
  pub headers: Vec<(String, String)>,
  pub body: String,
  pub queued_at: DateTime<Utc>,
}

impl QueuedRequest {
  /// Rebuild a request for replay from the captured snapshot.
  pub fn to_request(&self) -> Request {
    Request {
      url: self.url.clone(),
      method: self.method.clone(),
      headers: self.headers.clone(),
      body: if self.body.is_empty() {
        None
      } else {
        Some(self.body.clone())
      },
    }
  }
}

/// SQLite-backed offline queue.
#[derive(Clone)]
pub struct OfflineQueue {
  db: Arc<Database>,
}

impl OfflineQueue {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Append a snapshot of `request`, returning its id once committed.
  pub fn add(&self, request: &Request) -> Result<i64> {
    let headers = serde_json::to_string(&request.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;
    let body = request.body.as_deref().unwrap_or_default();

    let conn = self.db.conn()?;
    conn
      .execute(
        "INSERT INTO offline_questions (url, method, headers, body, queued_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![request.url, request.method, headers, body],
      )
      .map_err(|e| eyre!("Failed to queue request {}: {}", request.url, e))?;

    Ok(conn.last_insert_rowid())
  }

  /// All queued requests in insertion order.
  pub fn get_all(&self) -> Result<Vec<QueuedRequest>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT id, url, method, headers, body, queued_at FROM offline_questions
         ORDER BY id",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map([], |row| {
        Ok((
          row.get::<_, i64>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, String>(3)?,
          row.get::<_, String>(4)?,
          row.get::<_, String>(5)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query offline queue: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read offline queue: {}", e))?;

    rows
      .into_iter()
      .map(|(id, url, method, headers, body, queued_at)| {
        let headers = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers of request {}: {}", id, e))?;
        Ok(QueuedRequest {
          id,
          url,
          method,
          headers,
          body,
          queued_at: parse_datetime(&queued_at)?,
        })
      })
      .collect()
  }

  /// Remove a request. Missing ids are ignored.
  pub fn delete(&self, id: i64) -> Result<()> {
    self
      .db
      .conn()?
      .execute("DELETE FROM offline_questions WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to delete queued request {}: {}", id, e))?;
    Ok(())
  }

  pub fn len(&self) -> Result<usize> {
    let count: i64 = self
      .db
      .conn()?
      .query_row("SELECT COUNT(*) FROM offline_questions", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count offline queue: {}", e))?;
    Ok(count as usize)
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}
