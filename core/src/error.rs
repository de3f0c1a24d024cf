use thiserror::Error;

/// Errors surfaced at the boundary of the release catalog.
///
/// Dataset and field defects never show up here; those become warnings and
/// badges. Only things the caller has to act on are reported as errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The pipeline configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset or persisted state was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A state store refused to load or save
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
