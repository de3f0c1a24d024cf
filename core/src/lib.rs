//! # Repoversion Core
//!
//! In-memory pipeline over a versioned-release dataset: apps, each publishing
//! one "latest" release descriptor per named track (`stable`, `beta`, ...).
//!
//! ## Architecture
//!
//! ```text
//! raw dataset (serde_json::Value)
//!     │
//!     ├──> Normalizer ─> rows + warnings
//!     │        │
//!     │        └─> Analyzer ─> badges, flags, severity, search text
//!     │                 │
//!     │                 └─> Query + Sort ─> CatalogView (interactive)
//!     │
//!     └──> Endpoint Formatter ─> json / txt / ini / code bodies (machine)
//! ```
//!
//! The endpoint path reads the raw tracks directly and never sees the
//! normalized or filtered rows. Filter state is folded from provenance layers
//! by [`filter_state::normalize`] and persisted through a [`StateStore`].
//!
//! Nothing here performs I/O or reads global state: thresholds come from
//! [`PipelineConfig`] and the clock is passed in.

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod endpoint;
pub mod error;
pub mod filter_state;
pub mod query;
pub mod sort;
pub mod state_store;

pub use analyzer::AnalyzedRow;
pub use analyzer::Badge;
pub use analyzer::RowMeta;
pub use analyzer::Severity;
pub use analyzer::Tone;
pub use catalog::Catalog;
pub use catalog::CatalogView;
pub use catalog::RowView;
pub use catalog::ViewSummary;
pub use config::CodeEndpointMode;
pub use config::PipelineConfig;
pub use dataset::normalize_dataset;
pub use endpoint::EndpointFormat;
pub use endpoint::EndpointRequest;
pub use endpoint::EndpointResponse;
pub use error::CatalogError;
pub use error::Result;
pub use filter_state::FilterState;
pub use filter_state::PartialFilterState;
pub use filter_state::TrackFilter;
pub use query::QueryAst;
pub use query::parse_query;
pub use sort::SortKey;
pub use state_store::DebouncedStateWriter;
pub use state_store::MemoryStateStore;
pub use state_store::StateStore;
