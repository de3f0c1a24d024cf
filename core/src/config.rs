use crate::error::CatalogError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for the release pipeline.
///
/// Every threshold the analyzer and state normalizer consult lives here so a
/// test can pin them without touching global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Releases older than this many days are flagged stale
    pub stale_after_days: i64,

    /// Release dates up to this many days ahead are tolerated before being
    /// flagged as future
    pub future_grace_days: i64,

    /// Upper bound on the search text kept in filter state
    pub query_max_chars: usize,

    /// Name under which interactive filter state is persisted
    pub storage_key: String,

    /// Quiet period before a staged state edit is written out
    pub persist_debounce_ms: u64,

    /// Wire contract of the `format=code` endpoint
    pub code_endpoint: CodeEndpointMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stale_after_days: 90,
            future_grace_days: 2,
            query_max_chars: 200,
            storage_key: "repoversion.filters".to_string(),
            persist_debounce_ms: 300,
            code_endpoint: CodeEndpointMode::NumericCode,
        }
    }
}

/// Versioned contract for `format=code`.
///
/// `NumericCode` (v1) answers with the release code per app, `VersionString`
/// (v2) answers with the version text. The two are not interchangeable on the
/// wire, so the choice is made explicitly in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeEndpointMode {
    #[default]
    NumericCode,
    VersionString,
}

impl PipelineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.stale_after_days <= 0 {
            return Err(CatalogError::InvalidConfig(
                "stale_after_days must be greater than 0".into(),
            ));
        }

        if self.future_grace_days < 0 {
            return Err(CatalogError::InvalidConfig(
                "future_grace_days must not be negative".into(),
            ));
        }

        if self.query_max_chars == 0 {
            return Err(CatalogError::InvalidConfig(
                "query_max_chars must be greater than 0".into(),
            ));
        }

        if self.storage_key.trim().is_empty() {
            return Err(CatalogError::InvalidConfig(
                "storage_key must not be empty".into(),
            ));
        }

        Ok(())
    }
}
