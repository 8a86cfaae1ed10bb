//! Cache storage trait with in-memory, SQLite and no-op implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// A serialized cache entry.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub description: String,
  /// JSON-encoded payload
  pub data: Vec<u8>,
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Backends only store bytes; serialization and staleness live in the cache layer.
pub trait CacheStorage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<CachedEntry>>;

  /// Insert or replace an entry. Last write wins.
  fn put(&self, key: &str, entry: CachedEntry) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;

  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<CachedEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &str, _entry: CachedEntry) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// In-process storage. Entries live until invalidated or the process exits.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, CachedEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CachedEntry>>> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<CachedEntry>> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn put(&self, key: &str, entry: CachedEntry) -> Result<()> {
    self.lock()?.insert(key.to_string(), entry);
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.lock()?.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self.lock()?.clear();
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("folio").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<CachedEntry>> {
    let conn = self.lock()?;

    let row: Option<(String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT query_description, data, cached_at FROM query_cache WHERE query_hash = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((description, data, cached_at)) => Ok(Some(CachedEntry {
        description,
        data,
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, key: &str, entry: CachedEntry) -> Result<()> {
    self
      .lock()?
      .execute(
        "INSERT OR REPLACE INTO query_cache (query_hash, query_description, data, cached_at)
         VALUES (?, ?, ?, ?)",
        params![
          key,
          entry.description,
          entry.data,
          entry.cached_at.to_rfc3339()
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self
      .lock()?
      .execute("DELETE FROM query_cache WHERE query_hash = ?", params![key])
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self
      .lock()?
      .execute("DELETE FROM query_cache", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
    Ok(())
  }
}

/// Parse an RFC 3339 timestamp written by `put`.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(data: &str) -> CachedEntry {
    CachedEntry {
      description: "article page 1".to_string(),
      data: data.as_bytes().to_vec(),
      cached_at: Utc::now(),
    }
  }

  fn exercise(storage: &dyn CacheStorage) {
    assert!(storage.get("k").unwrap().is_none());

    let first = entry("[1]");
    storage.put("k", first.clone()).unwrap();
    let got = storage.get("k").unwrap().unwrap();
    assert_eq!(got.data, b"[1]");
    assert_eq!(got.description, "article page 1");
    assert_eq!(got.cached_at.timestamp_millis(), first.cached_at.timestamp_millis());

    storage.put("k", entry("[2]")).unwrap();
    assert_eq!(storage.get("k").unwrap().unwrap().data, b"[2]");

    storage.put("other", entry("[3]")).unwrap();
    storage.remove("k").unwrap();
    assert!(storage.get("k").unwrap().is_none());
    assert!(storage.get("other").unwrap().is_some());

    storage.clear().unwrap();
    assert!(storage.get("other").unwrap().is_none());
  }

  #[test]
  fn test_memory_storage() {
    exercise(&MemoryStorage::new());
  }

  #[test]
  fn test_sqlite_storage() {
    exercise(&SqliteStorage::open_in_memory().unwrap());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.put("k", entry("[1]")).unwrap();
    assert!(storage.get("k").unwrap().is_none());
  }
}
