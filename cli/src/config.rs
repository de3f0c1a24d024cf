use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use dirs::home_dir;
use repoversion_core::PartialFilterState;
use repoversion_core::PipelineConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

pub const HOME_ENV_VAR: &str = "REPOVERSION_HOME";
pub const CONFIG_FILENAME: &str = "config.toml";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
const CACHE_DIR: &str = "cache";
const STATE_DIR: &str = "state";
const CACHE_FILENAME: &str = "dataset.json";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Dataset path or `http(s)://` URL
    pub dataset: Option<String>,

    /// Where the last fetched remote dataset is kept
    pub cache: Option<PathBuf>,

    /// Listen address for `serve`
    pub bind: Option<String>,

    pub pipeline: PipelineConfig,

    /// Initial control values, the first layer above the hard defaults
    pub controls: PartialFilterState,
}

impl AppConfig {
    /// Read and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("parse config file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("read config file {}", path.display()));
            }
        };
        config
            .pipeline
            .validate()
            .with_context(|| format!("invalid [pipeline] in {}", path.display()))?;
        Ok(config)
    }

    pub fn cache_path(&self, home: &Path) -> PathBuf {
        self.cache
            .clone()
            .unwrap_or_else(|| home.join(CACHE_DIR).join(CACHE_FILENAME))
    }

    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }
}

/// `$REPOVERSION_HOME`, else `~/.repoversion`.
pub fn find_home() -> Result<PathBuf> {
    if let Ok(env_home) = std::env::var(HOME_ENV_VAR)
        && !env_home.is_empty()
    {
        return Ok(PathBuf::from(env_home));
    }
    let mut home = home_dir().ok_or_else(|| anyhow!("Could not locate home directory"))?;
    home.push(".repoversion");
    Ok(home)
}

pub fn state_dir(home: &Path) -> PathBuf {
    home.join(STATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use repoversion_core::CodeEndpointMode;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        let config = AppConfig::load(&home.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr(), DEFAULT_BIND);
        assert_eq!(
            config.cache_path(home.path()),
            home.path().join("cache").join("dataset.json")
        );
    }

    #[test]
    fn parses_sections() {
        let home = TempDir::new().unwrap();
        let path = home.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
dataset = "https://example.com/versions.json"
bind = "0.0.0.0:9000"

[pipeline]
stale_after_days = 30
code_endpoint = "version_string"

[controls]
track = "all"
issues = true
"#,
        )
        .unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(
            config.dataset.as_deref(),
            Some("https://example.com/versions.json")
        );
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.pipeline.stale_after_days, 30);
        assert_eq!(config.pipeline.future_grace_days, 2);
        assert_eq!(config.pipeline.code_endpoint, CodeEndpointMode::VersionString);
        assert_eq!(config.controls.track.as_deref(), Some("all"));
        assert_eq!(config.controls.issues, Some(true));
    }

    #[test]
    fn rejects_invalid_pipeline_values() {
        let home = TempDir::new().unwrap();
        let path = home.path().join(CONFIG_FILENAME);
        fs::write(&path, "[pipeline]\nstale_after_days = 0\n").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("stale_after_days"));

        fs::write(&path, "dataset = [").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
