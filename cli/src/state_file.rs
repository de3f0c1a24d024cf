use crate::source::write_atomic;
use repoversion_core::CatalogError;
use repoversion_core::FilterState;
use repoversion_core::PartialFilterState;
use repoversion_core::StateStore;
use repoversion_core::filter_state::query_pairs;
use serde_json::Map;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Filter state persisted as a flat JSON object of canonical pairs, e.g.
/// `{"track": "all", "issues": "1"}`.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store named after the configured storage key inside `state_dir`.
    pub fn new(state_dir: &Path, storage_key: &str) -> Self {
        Self {
            path: state_dir.join(format!("{storage_key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> repoversion_core::Result<Option<PartialFilterState>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let object: Map<String, Value> = serde_json::from_slice(&data)?;
        let pairs = object.into_iter().filter_map(|(key, value)| match value {
            Value::String(text) => Some((key, text)),
            Value::Bool(flag) => Some((key, if flag { "1" } else { "0" }.to_string())),
            _ => None,
        });
        Ok(Some(PartialFilterState::from_pairs(pairs)))
    }

    fn save(&mut self, state: &FilterState) -> repoversion_core::Result<()> {
        let object: Map<String, Value> = query_pairs(state)
            .into_iter()
            .map(|(key, value)| (key.to_string(), Value::String(value)))
            .collect();
        let data = serde_json::to_vec_pretty(&object)?;
        write_atomic(&self.path, &data).map_err(|err| CatalogError::Storage(format!("{err:#}")))
    }
}
