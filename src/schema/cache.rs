use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CACHE_TTL_HOURS: i64 = 24;

const SCHEMA_FILE: &str = "openapi.json";
const META_FILE: &str = "meta.json";

/// Sidecar written next to the cached document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub cached_at: DateTime<Utc>,
    pub version: String,
    pub paths_count: usize,
}

impl CacheMeta {
    pub fn describe(schema: &Value, cached_at: DateTime<Utc>) -> Self {
        let version = schema
            .pointer("/info/version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let paths_count = schema
            .get("paths")
            .and_then(Value::as_object)
            .map_or(0, |paths| paths.len());
        Self {
            cached_at,
            version,
            paths_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaCache {
    dir: PathBuf,
    ttl: Duration,
}

impl SchemaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::hours(CACHE_TTL_HOURS),
        }
    }

    /// `~/.cache/cloudflare-api`
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".cache").join("cloudflare-api"))
            .ok_or_else(|| anyhow!("could not determine home directory"))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema_path(&self) -> PathBuf {
        self.dir.join(SCHEMA_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn has_schema(&self) -> bool {
        self.schema_path().is_file()
    }

    pub fn read_meta(&self) -> Result<CacheMeta> {
        let path = self.meta_path();
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    /// Fresh means both files exist and the sidecar timestamp is within the TTL.
    /// Anything unreadable counts as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if !self.has_schema() {
            log::debug!("no cached schema at {}", self.schema_path().display());
            return false;
        }
        match self.read_meta() {
            Ok(meta) => {
                let age = now.signed_duration_since(meta.cached_at);
                log::debug!("cached schema age {}s (ttl {}s)", age.num_seconds(), self.ttl.num_seconds());
                age < self.ttl
            }
            Err(err) => {
                log::debug!("cache metadata unusable: {err:#}");
                false
            }
        }
    }

    pub fn read_schema(&self) -> Result<Value> {
        let path = self.schema_path();
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse cached schema {}", path.display()))
    }

    /// Persists the raw document and a new sidecar stamped with `now`.
    pub fn store(&self, raw: &str, schema: &Value, now: DateTime<Utc>) -> Result<CacheMeta> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;
        self.write_atomic(&self.schema_path(), raw.as_bytes())?;

        let meta = CacheMeta::describe(schema, now);
        let encoded = serde_json::to_vec_pretty(&meta).context("encode cache metadata")?;
        self.write_atomic(&self.meta_path(), &encoded)?;
        Ok(meta)
    }

    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = NamedTempFile::new_in(&self.dir).context("create temp file")?;
        file.write_all(bytes).context("write temp file")?;
        file.persist(target)
            .with_context(|| format!("persist {}", target.display()))?;
        Ok(())
    }
}
