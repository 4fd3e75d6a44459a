//! # Result Cache Module / 结果缓存模块
//!
//! Persists the last known status of every scenario between runs so that
//! `--rerun-failed` can pick up where the previous run left off.
//!
//! The cache lives in `.moltest_cache.json` at the invocation root:
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "last_run": "2024-01-01T00:00:00+00:00",
//!   "scenarios": { "web:default": "passed", "db:default": "failed" }
//! }
//! ```
//!
//! 在多次运行之间持久化每个场景的最后已知状态，
//! 以便 `--rerun-failed` 可以从上一次运行中断的地方继续。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::models::ScenarioStatus;
use crate::infra::fs::atomic_write;

pub const CACHE_FILENAME: &str = ".moltest_cache.json";
pub const CACHE_SCHEMA_VERSION: &str = "1.0.0";

/// Statuses that may be persisted. `unknown` is never written.
pub const PERSISTED_STATUSES: [ScenarioStatus; 5] = [
    ScenarioStatus::Passed,
    ScenarioStatus::Failed,
    ScenarioStatus::Skipped,
    ScenarioStatus::Xfailed,
    ScenarioStatus::Xpassed,
];

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file '{path}' could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file '{path}' could not be written: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// In-memory form of the cache file.
/// 缓存文件的内存形式。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub schema_version: String,
    /// ISO-8601 timestamp of the last save.
    pub last_run: String,
    /// Scenario id → last status. Unrecognised status strings from older
    /// files are preserved verbatim.
    pub scenarios: BTreeMap<String, String>,
}

impl Default for CacheDocument {
    fn default() -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION.to_string(),
            last_run: Utc::now().to_rfc3339(),
            scenarios: BTreeMap::new(),
        }
    }
}

impl CacheDocument {
    /// Upserts the status of `id`. Statuses outside [`PERSISTED_STATUSES`]
    /// are logged and ignored.
    ///
    /// 更新或插入 `id` 的状态。不在允许集合中的状态会被记录并忽略。
    pub fn update(&mut self, id: &str, status: ScenarioStatus) {
        if !PERSISTED_STATUSES.contains(&status) {
            warn!(scenario = id, %status, "Invalid cache status, entry not updated");
            return;
        }
        self.scenarios.insert(id.to_string(), status.as_str().to_string());
    }

    pub fn status_of(&self, id: &str) -> Option<&str> {
        self.scenarios.get(id).map(String::as_str)
    }

    /// All ids whose last persisted status is `failed`.
    pub fn failed_ids(&self) -> BTreeSet<String> {
        self.scenarios
            .iter()
            .filter(|(_, status)| status.as_str() == ScenarioStatus::Failed.as_str())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Reads and writes the cache file under a root directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(CACHE_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cache document.
    ///
    /// A missing file, invalid JSON, a wrong shape or a schema mismatch all
    /// yield a fresh empty document. Only genuine I/O failures while reading
    /// an existing file (permissions, the path being a directory, ...) are
    /// returned as [`CacheError::Unreadable`].
    ///
    /// 加载缓存文件。文件缺失、JSON 无效、结构错误或版本不匹配都会返回一个新的空文档。
    /// 只有读取已存在文件时的真实 I/O 错误才会返回 [`CacheError::Unreadable`]。
    pub fn load(&self) -> Result<CacheDocument, CacheError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache file, starting empty");
                return Ok(CacheDocument::default());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), "Cache file is not valid UTF-8, reinitializing");
                return Ok(CacheDocument::default());
            }
            Err(source) => {
                return Err(CacheError::Unreadable {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        match serde_json::from_str::<CacheDocument>(&content) {
            Ok(doc) if doc.schema_version == CACHE_SCHEMA_VERSION => Ok(doc),
            Ok(doc) => {
                warn!(
                    path = %self.path.display(),
                    found = %doc.schema_version,
                    expected = CACHE_SCHEMA_VERSION,
                    "Cache schema version mismatch, reinitializing"
                );
                Ok(CacheDocument::default())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache file is corrupted, reinitializing");
                Ok(CacheDocument::default())
            }
        }
    }

    /// Like [`CacheStore::load`], but read failures also fall back to an empty document.
    pub fn load_or_default(&self) -> CacheDocument {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to an empty cache");
            CacheDocument::default()
        })
    }

    /// Refreshes `last_run` and `schema_version`, then writes the document atomically.
    ///
    /// 刷新 `last_run` 和 `schema_version`，然后原子地写入文档。
    pub fn save(&self, doc: &mut CacheDocument) -> Result<(), CacheError> {
        doc.last_run = Utc::now().to_rfc3339();
        doc.schema_version = CACHE_SCHEMA_VERSION.to_string();

        let json = serde_json::to_string_pretty(doc)?;
        atomic_write(&self.path, json.as_bytes()).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), entries = doc.scenarios.len(), "Cache saved");
        Ok(())
    }

    /// Deletes the cache file. Returns `false` when there was nothing to delete.
    pub fn clear(&self) -> std::io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
