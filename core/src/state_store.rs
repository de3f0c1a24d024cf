//! Persistence seam for interactive filter state.
//!
//! The pipeline only defines what gets stored (the canonical pairs from
//! [`query_pairs`]); the medium is behind [`StateStore`]. Writes go through
//! [`DebouncedStateWriter`] so bursts of edits collapse into one write.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::filter_state::FilterState;
use crate::filter_state::PartialFilterState;
use crate::filter_state::query_pairs;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;

pub trait StateStore {
    /// Last persisted state, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<PartialFilterState>>;

    fn save(&mut self, state: &FilterState) -> Result<()>;
}

/// In-memory store, for tests and sessions without a backing medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    saved: Option<Vec<(String, String)>>,
    writes: usize,
}

impl MemoryStateStore {
    /// Number of `save` calls that reached the store.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PartialFilterState>> {
        Ok(self
            .saved
            .as_ref()
            .map(|pairs| PartialFilterState::from_pairs(pairs.iter().map(|(k, v)| (k, v)))))
    }

    fn save(&mut self, state: &FilterState) -> Result<()> {
        self.saved = Some(
            query_pairs(state)
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        );
        self.writes += 1;
        Ok(())
    }
}

/// Coalesces staged edits into one write after a quiet period.
///
/// Reads through [`DebouncedStateWriter::current`] see the staged state even
/// while its write is still pending.
#[derive(Debug)]
pub struct DebouncedStateWriter<S> {
    store: S,
    quiet: Duration,
    staged: Option<(FilterState, Instant)>,
    last_written: Option<FilterState>,
}

impl<S: StateStore> DebouncedStateWriter<S> {
    pub fn new(store: S, quiet: Duration) -> Self {
        Self {
            store,
            quiet,
            staged: None,
            last_written: None,
        }
    }

    pub fn from_config(store: S, config: &PipelineConfig) -> Self {
        Self::new(store, Duration::from_millis(config.persist_debounce_ms))
    }

    /// Replace any pending edit; the quiet period restarts at `now`.
    pub fn stage(&mut self, state: FilterState, now: Instant) {
        self.staged = Some((state, now));
    }

    pub fn is_pending(&self) -> bool {
        self.staged.is_some()
    }

    /// Write the staged state if it has been quiet long enough. Returns
    /// whether the store was written.
    pub fn flush_due(&mut self, now: Instant) -> Result<bool> {
        match &self.staged {
            Some((_, staged_at)) if now.saturating_duration_since(*staged_at) >= self.quiet => {
                self.flush()
            }
            _ => Ok(false),
        }
    }

    /// Write the staged state now, regardless of the quiet period.
    pub fn flush(&mut self) -> Result<bool> {
        let Some((state, _)) = self.staged.take() else {
            return Ok(false);
        };
        if self.last_written.as_ref() == Some(&state) {
            debug!("filter state unchanged, skipping write");
            return Ok(false);
        }
        self.store.save(&state)?;
        debug!(query = ?query_pairs(&state), "filter state persisted");
        self.last_written = Some(state);
        Ok(true)
    }

    /// The freshest state: staged if pending, else whatever the store holds.
    pub fn current(&self) -> Result<Option<PartialFilterState>> {
        match &self.staged {
            Some((state, _)) => Ok(Some(PartialFilterState::from(state))),
            None => self.store.load(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
