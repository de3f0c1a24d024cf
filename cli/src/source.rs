//! Dataset acquisition.
//!
//! Local paths are read directly. Remote URLs are fetched without HTTP
//! caching; a good response refreshes the on-disk cache, and a failed fetch
//! falls back to that cache with a diagnostic instead of failing the command.

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use reqwest::header::CACHE_CONTROL;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Remote(String),
}

impl DatasetSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }
}

/// A parsed dataset plus the non-fatal messages produced while getting it.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub raw: Value,
    pub diagnostics: Vec<String>,
}

pub async fn acquire(source: &DatasetSource, cache: &Path) -> Result<Acquired> {
    match source {
        DatasetSource::File(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read dataset {}", path.display()))?;
            Ok(Acquired {
                raw: parse_dataset(&text, &path.display().to_string())?,
                diagnostics: Vec::new(),
            })
        }
        DatasetSource::Remote(url) => match fetch(url).await {
            Ok(text) => {
                let raw = parse_dataset(&text, url)?;
                if let Err(err) = write_atomic(cache, text.as_bytes()) {
                    warn!("could not refresh dataset cache {}: {err:#}", cache.display());
                }
                Ok(Acquired {
                    raw,
                    diagnostics: Vec::new(),
                })
            }
            Err(fetch_err) => {
                warn!("dataset fetch failed: {fetch_err:#}");
                let text = fs::read_to_string(cache).map_err(|cache_err| {
                    anyhow!(
                        "fetch {url} failed ({fetch_err:#}) and no cached dataset is available at {} ({cache_err})",
                        cache.display()
                    )
                })?;
                Ok(Acquired {
                    raw: parse_dataset(&text, &cache.display().to_string())?,
                    diagnostics: vec![format!("Using cached dataset: {fetch_err:#}")],
                })
            }
        },
    }
}

async fn fetch(url: &str) -> Result<String> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    debug!("fetching dataset from {url}");
    let response = client
        .get(url)
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await?
        .error_for_status()?;
    Ok(response.text().await?)
}

fn parse_dataset(text: &str, origin: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("dataset {origin} is not valid JSON"))
}

pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn parse_distinguishes_urls_from_paths() {
        assert_eq!(
            DatasetSource::parse(" HTTPS://example.com/v.json "),
            DatasetSource::Remote("HTTPS://example.com/v.json".to_string())
        );
        assert_eq!(
            DatasetSource::parse("data/versions.json"),
            DatasetSource::File(PathBuf::from("data/versions.json"))
        );
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("versions.json");
        fs::write(&path, r#"{"apps": []}"#).unwrap();
        let acquired = acquire(&DatasetSource::File(path), &dir.path().join("cache.json"))
            .await
            .unwrap();
        assert_eq!(acquired.raw, json!({ "apps": [] }));
        assert!(acquired.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("versions.json");
        fs::write(&path, "{ nope").unwrap();
        let err = acquire(&DatasetSource::File(path), &dir.path().join("cache.json"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache").join("dataset.json");
        write_atomic(&cache, br#"{"apps": [{"id": "cached"}]}"#).unwrap();
        // Port 9 on localhost is not expected to serve HTTP.
        let source = DatasetSource::Remote("http://127.0.0.1:9/versions.json".to_string());
        let acquired = acquire(&source, &cache).await.unwrap();
        assert_eq!(acquired.raw["apps"][0]["id"], json!("cached"));
        assert_eq!(acquired.diagnostics.len(), 1);
        assert!(acquired.diagnostics[0].starts_with("Using cached dataset: "));
    }

    #[tokio::test]
    async fn failed_fetch_without_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = DatasetSource::Remote("http://127.0.0.1:9/versions.json".to_string());
        assert!(acquire(&source, &dir.path().join("missing.json")).await.is_err());
    }
}
