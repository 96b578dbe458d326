//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use super::entry::{entry_key, CachedResponse};
use crate::db::{parse_datetime, Database};
use crate::net::Response;

/// Trait for named-cache storage backends.
pub trait CacheStorage: Send + Sync + 'static {
  /// Create the named cache if it does not exist.
  fn open(&self, name: &str) -> Result<()>;

  /// Whether the named cache exists.
  fn has(&self, name: &str) -> Result<bool>;

  /// Names of all existing caches, oldest first.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete a cache and all its entries. Returns false if it did not exist.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Store one response in the named cache, replacing any entry for the URL.
  fn put(&self, name: &str, url: &str, response: &Response) -> Result<()>;

  /// Store several responses in one transaction: all are written or none are.
  fn put_all(&self, name: &str, entries: &[(String, Response)]) -> Result<()>;

  /// Look up a URL. With `name`, only that cache is searched; otherwise all
  /// caches are searched, newest first.
  fn match_url(&self, name: Option<&str>, url: &str) -> Result<Option<CachedResponse>>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  db: Arc<Database>,
}

impl SqliteStorage {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

fn ensure_cache(conn: &Connection, name: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?, datetime('now'))",
      params![name],
    )
    .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;
  Ok(())
}

fn insert_entry(conn: &Connection, name: &str, url: &str, response: &Response) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries (cache_name, entry_key, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        name,
        entry_key(url),
        url,
        response.status,
        headers,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store {} in cache {}: {}", url, name, e))?;
  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, name: &str) -> Result<()> {
    let conn = self.db.conn()?;
    ensure_cache(&conn, name)
  }

  fn has(&self, name: &str) -> Result<bool> {
    let conn = self.db.conn()?;
    let found: Option<String> = conn
      .query_row(
        "SELECT name FROM caches WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache {}: {}", name, e))?;
    Ok(found.is_some())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT name FROM caches ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let conn = self.db.conn()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE cache_name = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete entries of cache {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM caches WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn put(&self, name: &str, url: &str, response: &Response) -> Result<()> {
    let conn = self.db.conn()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    ensure_cache(&tx, name)?;
    insert_entry(&tx, name, url, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn put_all(&self, name: &str, entries: &[(String, Response)]) -> Result<()> {
    let conn = self.db.conn()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    ensure_cache(&tx, name)?;
    for (url, response) in entries {
      insert_entry(&tx, name, url, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn match_url(&self, name: Option<&str>, url: &str) -> Result<Option<CachedResponse>> {
    let conn = self.db.conn()?;
    let key = entry_key(url);

    let row: Option<(String, u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT ce.cache_name, ce.status, ce.headers, ce.body, ce.cached_at
         FROM cache_entries ce
         INNER JOIN caches c ON c.name = ce.cache_name
         WHERE ce.entry_key = ?1 AND (?2 IS NULL OR ce.cache_name = ?2)
         ORDER BY c.rowid DESC
         LIMIT 1",
        params![key, name],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", url, e))?;

    match row {
      Some((cache_name, status, headers, body, cached_at)) => {
        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        Ok(Some(CachedResponse {
          cache_name,
          response: Response {
            status,
            headers,
            body,
          },
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  #[test]
  fn test_open_is_idempotent() {
    let storage = storage();
    storage.open("quiz-app-v1").unwrap();
    storage.open("quiz-app-v1").unwrap();
    assert_eq!(storage.keys().unwrap(), vec!["quiz-app-v1"]);
    assert!(storage.has("quiz-app-v1").unwrap());
    assert!(!storage.has("quiz-app-v2").unwrap());
  }

  #[test]
  fn test_put_then_match() {
    let storage = storage();
    let response = Response::new(200, "<html>").with_header("Content-Type", "text/html");
    storage
      .put("quiz-app-v1", "http://localhost:8080/", &response)
      .unwrap();

    let cached = storage
      .match_url(None, "http://localhost:8080/")
      .unwrap()
      .unwrap();
    assert_eq!(cached.cache_name, "quiz-app-v1");
    assert_eq!(cached.response, response);
    assert!(storage
      .match_url(Some("other"), "http://localhost:8080/")
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_match_prefers_newest_cache() {
    let storage = storage();
    let url = "http://localhost:8080/manifest.json";
    storage.put("quiz-app-v1", url, &Response::new(200, "old")).unwrap();
    storage.put("quiz-app-v2", url, &Response::new(200, "new")).unwrap();

    let cached = storage.match_url(None, url).unwrap().unwrap();
    assert_eq!(cached.cache_name, "quiz-app-v2");
    assert_eq!(cached.response.text(), "new");
  }

  #[test]
  fn test_delete_removes_entries() {
    let storage = storage();
    let url = "http://localhost:8080/";
    storage.put("quiz-app-v0", url, &Response::new(200, "x")).unwrap();

    assert!(storage.delete("quiz-app-v0").unwrap());
    assert!(!storage.delete("quiz-app-v0").unwrap());
    assert!(storage.match_url(None, url).unwrap().is_none());
    assert!(storage.keys().unwrap().is_empty());
  }

  #[test]
  fn test_put_all_writes_every_entry() {
    let storage = storage();
    let entries = vec![
      ("http://localhost:8080/".to_string(), Response::new(200, "a")),
      ("http://localhost:8080/offline.html".to_string(), Response::new(200, "b")),
    ];
    storage.put_all("quiz-app-v1", &entries).unwrap();

    for (url, response) in &entries {
      let cached = storage.match_url(Some("quiz-app-v1"), url).unwrap().unwrap();
      assert_eq!(&cached.response, response);
    }
  }
}
