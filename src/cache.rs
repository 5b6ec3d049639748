//! Baseline profile cache: an injectable service interface with an
//! in-memory implementation for embedding and a SQLite-backed one for
//! shared deployments.
//!
//! Replacement is always whole-profile; readers see either the previous
//! complete profile or the new one, never a partial write.

use async_trait::async_trait;
use blake3;
use chrono::DateTime;
use fs2::FileExt;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::baseline::BaselineProfile;
use crate::types::Dimension;

#[derive(Debug, Clone)]
pub struct BaselineCacheKey {
    pub jurisdiction: String,
    pub dimension: Dimension,
    pub metric_key: String,
    pub key_hash: String,
}

impl BaselineCacheKey {
    pub fn new(jurisdiction: &str, dimension: Dimension, metric_key: &str) -> Self {
        let key_hash = hash_fields(&[jurisdiction, dimension.as_str(), metric_key]);
        Self {
            jurisdiction: jurisdiction.to_string(),
            dimension,
            metric_key: metric_key.to_string(),
            key_hash,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// Injectable cache service for baseline profiles. A `get` after TTL expiry
/// behaves as a miss; `put` atomically replaces any previous entry.
#[async_trait]
pub trait BaselineCache: Send + Sync {
    async fn get(&self, key: &BaselineCacheKey) -> Result<Option<BaselineProfile>, CacheError>;
    async fn put(
        &self,
        key: &BaselineCacheKey,
        profile: &BaselineProfile,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

// =============================================================================
// In-memory implementation
// =============================================================================

struct MemoryEntry {
    profile: BaselineProfile,
    expires_at: Instant,
}

/// Process-local cache. Suitable for single-worker deployments and tests.
#[derive(Clone, Default)]
pub struct MemoryBaselineCache {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryBaselineCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaselineCache for MemoryBaselineCache {
    async fn get(&self, key: &BaselineCacheKey) -> Result<Option<BaselineProfile>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(&key.key_hash)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.profile.clone()))
    }

    async fn put(
        &self,
        key: &BaselineCacheKey,
        profile: &BaselineProfile,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(
            key.key_hash.clone(),
            MemoryEntry {
                profile: profile.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

// =============================================================================
// SQLite implementation
// =============================================================================

/// SQLite-backed cache shared by worker processes on one host.
#[derive(Clone)]
pub struct SqliteBaselineCache {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBaselineCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             CREATE TABLE IF NOT EXISTS baseline_cache (\
               key_hash TEXT PRIMARY KEY,\
               jurisdiction TEXT NOT NULL,\
               dimension TEXT NOT NULL,\
               metric_key TEXT NOT NULL,\
               mean REAL NOT NULL,\
               stddev REAL NOT NULL,\
               sample_size INTEGER NOT NULL,\
               computed_at INTEGER NOT NULL,\
               expires_at INTEGER NOT NULL,\
               created_at INTEGER NOT NULL,\
               updated_at INTEGER NOT NULL,\
               hit_count INTEGER NOT NULL DEFAULT 0\
             );",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_exclusive(&self) -> Result<CacheLock, CacheError> {
        CacheLock::new(&self.path)
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&Connection) -> Result<R, CacheError>,
    {
        let guard = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        f(&guard)
    }
}

#[async_trait]
impl BaselineCache for SqliteBaselineCache {
    async fn get(&self, key: &BaselineCacheKey) -> Result<Option<BaselineProfile>, CacheError> {
        let key_hash = key.key_hash.clone();
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT jurisdiction, dimension, metric_key, mean, stddev, sample_size,\
                            computed_at, expires_at\
                     FROM baseline_cache WHERE key_hash = ?1",
                )?;
                let mut rows = stmt.query(params![key_hash])?;
                let Some(row) = rows.next()? else {
                    return Ok(None);
                };

                let expires_at: i64 = row.get(7)?;
                if expires_at <= now_epoch() {
                    conn.execute(
                        "DELETE FROM baseline_cache WHERE key_hash = ?1",
                        params![key_hash],
                    )?;
                    return Ok(None);
                }

                let dimension_raw: String = row.get(1)?;
                let dimension = Dimension::parse(&dimension_raw).ok_or_else(|| {
                    CacheError::Serde(format!("unknown dimension in cache: {dimension_raw}"))
                })?;
                let computed_at_epoch: i64 = row.get(6)?;
                let computed_at = DateTime::from_timestamp(computed_at_epoch, 0).ok_or_else(
                    || CacheError::Serde(format!("bad timestamp in cache: {computed_at_epoch}")),
                )?;

                let profile = BaselineProfile {
                    jurisdiction: row.get(0)?,
                    dimension,
                    metric_key: row.get(2)?,
                    mean: row.get(3)?,
                    stddev: row.get(4)?,
                    sample_size: row.get::<_, i64>(5)?.max(0) as usize,
                    computed_at,
                };

                conn.execute(
                    "UPDATE baseline_cache\
                     SET hit_count = hit_count + 1, updated_at = ?1\
                     WHERE key_hash = ?2",
                    params![now_epoch(), key_hash],
                )?;
                Ok(Some(profile))
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }

    async fn put(
        &self,
        key: &BaselineCacheKey,
        profile: &BaselineProfile,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = key.clone();
        let profile = profile.clone();
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let now = now_epoch();
                let expires_at = now.saturating_add(ttl.as_secs() as i64);
                conn.execute(
                    "INSERT INTO baseline_cache (\
                        key_hash, jurisdiction, dimension, metric_key,\
                        mean, stddev, sample_size, computed_at, expires_at,\
                        created_at, updated_at\
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)\
                     ON CONFLICT(key_hash) DO UPDATE SET\
                        mean = excluded.mean,\
                        stddev = excluded.stddev,\
                        sample_size = excluded.sample_size,\
                        computed_at = excluded.computed_at,\
                        expires_at = excluded.expires_at,\
                        updated_at = excluded.updated_at",
                    params![
                        key.key_hash,
                        key.jurisdiction,
                        key.dimension.as_str(),
                        key.metric_key,
                        profile.mean,
                        profile.stddev,
                        profile.sample_size as i64,
                        profile.computed_at.timestamp(),
                        expires_at,
                        now,
                        now,
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }
}

#[derive(Debug)]
pub struct CacheLock {
    _file: std::fs::File,
}

impl CacheLock {
    fn new(db_path: &Path) -> Result<Self, CacheError> {
        let mut lock_path = db_path.to_path_buf();
        lock_path.set_extension("lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CachePruneStats {
    pub deleted: usize,
    pub remaining: usize,
}

impl SqliteBaselineCache {
    /// Drop expired rows, plus the oldest rows beyond `max_rows` when set.
    pub async fn prune(&self, max_rows: Option<usize>) -> Result<CachePruneStats, CacheError> {
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let mut deleted = conn.execute(
                    "DELETE FROM baseline_cache WHERE expires_at <= ?1",
                    params![now_epoch()],
                )?;

                if let Some(max_rows) = max_rows {
                    let count: i64 =
                        conn.query_row("SELECT COUNT(*) FROM baseline_cache", [], |row| {
                            row.get(0)
                        })?;
                    let keep = max_rows as i64;
                    if count > keep {
                        let removed = conn.execute(
                            "DELETE FROM baseline_cache WHERE key_hash IN (\
                                SELECT key_hash FROM baseline_cache \
                                ORDER BY updated_at DESC LIMIT -1 OFFSET ?1\
                             )",
                            params![keep],
                        )?;
                        deleted = deleted.saturating_add(removed);
                    }
                }

                let remaining: i64 =
                    conn.query_row("SELECT COUNT(*) FROM baseline_cache", [], |row| row.get(0))?;
                Ok(CachePruneStats {
                    deleted,
                    remaining: remaining.max(0) as usize,
                })
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }

    /// Dump every row as one JSON object per line, newest first.
    pub async fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref().to_path_buf();
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, jurisdiction, dimension, metric_key, mean, stddev,\
                            sample_size, computed_at, expires_at, created_at, updated_at, hit_count\
                     FROM baseline_cache ORDER BY updated_at DESC",
                )?;
                let mut rows = stmt.query([])?;
                let mut file = std::fs::File::create(path)?;
                while let Some(row) = rows.next()? {
                    let record = CacheExportRow {
                        key_hash: row.get(0)?,
                        jurisdiction: row.get(1)?,
                        dimension: row.get(2)?,
                        metric_key: row.get(3)?,
                        mean: row.get(4)?,
                        stddev: row.get(5)?,
                        sample_size: row.get(6)?,
                        computed_at: row.get(7)?,
                        expires_at: row.get(8)?,
                        created_at: row.get(9)?,
                        updated_at: row.get(10)?,
                        hit_count: row.get(11)?,
                    };
                    let line = serde_json::to_string(&record)
                        .map_err(|e| CacheError::Serde(e.to_string()))?;
                    use std::io::Write;
                    writeln!(file, "{line}")?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }
}

#[derive(Debug, serde::Serialize)]
struct CacheExportRow {
    key_hash: String,
    jurisdiction: String,
    dimension: String,
    metric_key: String,
    mean: f64,
    stddev: f64,
    sample_size: i64,
    computed_at: i64,
    expires_at: i64,
    created_at: i64,
    updated_at: i64,
    hit_count: i64,
}

fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
