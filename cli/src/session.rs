use crate::GlobalArgs;
use crate::config::AppConfig;
use crate::config::CONFIG_FILENAME;
use crate::config::find_home;
use crate::config::state_dir;
use crate::source::DatasetSource;
use crate::source::acquire;
use crate::state_file::FileStateStore;
use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use chrono::Utc;
use repoversion_core::Catalog;
use std::path::PathBuf;
use tracing::debug;

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub home: PathBuf,
    pub config: AppConfig,
    pub source: DatasetSource,
    pub cache: PathBuf,
    pub color: bool,
}

impl Runtime {
    /// Combine home directory, config file and global flags. Flags win over
    /// the file.
    pub fn resolve(global: &GlobalArgs) -> Result<Self> {
        let home = find_home()?;
        let config_path = global
            .config
            .clone()
            .unwrap_or_else(|| home.join(CONFIG_FILENAME));
        let config = AppConfig::load(&config_path)?;
        let dataset = global
            .dataset
            .clone()
            .or_else(|| config.dataset.clone())
            .ok_or_else(|| {
                anyhow!(
                    "no dataset configured; pass --dataset or set `dataset` in {}",
                    config_path.display()
                )
            })?;
        let color = !global.no_color
            && std::env::var_os("NO_COLOR").is_none()
            && supports_color::on_cached(supports_color::Stream::Stdout).is_some();
        debug!(home = %home.display(), dataset = %dataset, "resolved runtime");
        Ok(Self {
            cache: config.cache_path(&home),
            source: DatasetSource::parse(&dataset),
            home,
            config,
            color,
        })
    }

    /// Acquire the dataset and build a fresh catalog.
    pub async fn load_catalog(&self) -> Result<Catalog> {
        let acquired = acquire(&self.source, &self.cache)
            .await
            .with_context(|| format!("load dataset {}", self.source.describe()))?;
        Ok(Catalog::build(
            self.config.pipeline.clone(),
            acquired.raw,
            acquired.diagnostics,
            Utc::now(),
        ))
    }

    pub fn state_store(&self) -> FileStateStore {
        FileStateStore::new(&state_dir(&self.home), &self.config.pipeline.storage_key)
    }
}
