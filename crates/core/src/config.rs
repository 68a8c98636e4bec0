use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::path::Path;
use std::time::Duration;

use crate::SearchError;

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const DEFAULT_SEMANTIC_MIN_SCORE: f64 = 0.7;

/// Tunables for the search orchestrator and the recorder queue.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    pub rrf_k: f64,
    pub default_page: u32,
    pub default_size: u32,
    pub max_size: u32,
    /// Per-source candidate window for fused and vector rankings.
    pub max_candidates: usize,
    pub semantic_min_score: f64,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "provider_timeout_ms")]
    pub provider_timeout: Duration,
    pub recorder_queue_capacity: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            default_page: 1,
            default_size: 20,
            max_size: 200,
            max_candidates: 200,
            semantic_min_score: DEFAULT_SEMANTIC_MIN_SCORE,
            provider_timeout: Duration::from_millis(3_000),
            recorder_queue_capacity: 1_024,
        }
    }
}

impl SearchSettings {
    pub async fn from_json_file(path: &Path) -> Result<Self, SearchError> {
        let raw = tokio::fs::read(path).await.map_err(|error| {
            SearchError::InvalidRequest(format!(
                "unable to read settings {}: {error}",
                path.display()
            ))
        })?;
        let settings: Self = serde_json::from_slice(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            return Err(SearchError::InvalidRequest(format!(
                "rrf_k must be positive, got {}",
                self.rrf_k
            )));
        }
        if self.default_page == 0 || self.default_size == 0 || self.max_size == 0 {
            return Err(SearchError::InvalidRequest(
                "page and size defaults must be non-zero".to_string(),
            ));
        }
        if self.max_candidates == 0 || self.recorder_queue_capacity == 0 {
            return Err(SearchError::InvalidRequest(
                "max_candidates and recorder_queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.provider_timeout.is_zero() {
            return Err(SearchError::InvalidRequest(
                "provider timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
