use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::de::IgnoredAny;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    _temp: Option<tempfile::TempPath>,
}

pub fn looks_like_source(value: &str) -> bool {
    value.starts_with('@')
        || value.starts_with("file://")
        || value.starts_with("http://")
        || value.starts_with("https://")
        || Path::new(value).exists()
}

pub fn resolve_source(value: &str) -> Result<SourceFile> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return download_http(value);
    }

    let local = local_path(value);
    if local.exists() {
        return Ok(SourceFile {
            path: local,
            _temp: None,
        });
    }

    Err(anyhow!("file not found: {value}"))
}

pub fn read_source_to_string(value: &str) -> Result<String> {
    let file = resolve_source(value)?;
    let mut f = File::open(&file.path).with_context(|| format!("open {}", file.path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf).context("read source")?;
    Ok(buf)
}

/// Returns the request body text exactly as given, after checking it is JSON.
/// Inline JSON is taken as-is; anything else is read as `@FILE`, a path, or a URL.
pub fn read_body(raw: &str) -> Result<String> {
    if is_json(raw) {
        return Ok(raw.to_string());
    }
    let text = if looks_like_source(raw) {
        read_source_to_string(raw)?
    } else {
        raw.to_string()
    };
    serde_json::from_str::<IgnoredAny>(&text).context("Invalid JSON body")?;
    Ok(text)
}

// Syntax check only; numbers are never converted, so nothing is lost.
fn is_json(text: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(text).is_ok()
}

fn download_http(url: &str) -> Result<SourceFile> {
    let client = Client::new();
    let mut resp = client.get(url).send().context("download url")?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("download {url}: http {status}"));
    }
    let mut file = NamedTempFile::new().context("create temp file")?;
    resp.copy_to(&mut file).context("write temp file")?;
    let temp_path = file.into_temp_path();
    let path = temp_path.to_path_buf();
    Ok(SourceFile {
        path,
        _temp: Some(temp_path),
    })
}

fn local_path(value: &str) -> PathBuf {
    if let Some(path) = value.strip_prefix('@') {
        return PathBuf::from(path);
    }
    if let Some(path) = value.strip_prefix("file://") {
        return PathBuf::from(path);
    }
    PathBuf::from(value)
}
