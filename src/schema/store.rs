use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use super::cache::{CACHE_TTL_HOURS, SchemaCache};

pub const DEFAULT_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/cloudflare/api-schemas/refs/heads/main/openapi.json";

const FETCH_TIMEOUT_SECS: u64 = 60;

/// Loads the OpenAPI document through the on-disk cache.
pub struct SchemaStore {
    cache: SchemaCache,
    url: String,
    client: Client,
}

impl SchemaStore {
    pub fn new(cache: SchemaCache, url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cloudflare-api-tools/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .context("build http client")?;
        Ok(Self { cache, url, client })
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Returns the cached document while it is fresh and readable, unless
    /// `force` is set. A failed download falls back to whatever is cached,
    /// however old.
    pub fn load(&self, force: bool) -> Result<Value> {
        if !force && self.cache.is_fresh(Utc::now()) {
            match self.cache.read_schema() {
                Ok(schema) => {
                    log::info!("Using cached schema (< {}h old)", CACHE_TTL_HOURS);
                    return Ok(schema);
                }
                Err(err) => log::warn!("Cached schema unreadable, fetching again: {err:#}"),
            }
        }

        match self.fetch() {
            Ok(schema) => Ok(schema),
            Err(err) => {
                if !self.cache.has_schema() {
                    return Err(err);
                }
                log::warn!("Error fetching schema: {err:#}");
                log::warn!("Falling back to stale cache");
                self.cache.read_schema()
            }
        }
    }

    fn fetch(&self) -> Result<Value> {
        log::info!("Fetching latest Cloudflare API schema from {}", self.url);
        let resp = self
            .client
            .get(&self.url)
            .send()
            .context("download schema")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("download schema: http {}", status));
        }
        let raw = resp.text().context("read schema body")?;
        let schema: Value = serde_json::from_str(&raw).context("decode schema json")?;

        let meta = self.cache.store(&raw, &schema, Utc::now())?;
        log::info!("Cached schema: {} endpoints", meta.paths_count);
        Ok(schema)
    }
}
