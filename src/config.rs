//! Run configuration, loadable from a JSON file.
//!
//! Every section falls back to its defaults, so a file only needs the keys it
//! changes:
//!
//! ```json
//! { "exact": { "time_limit": 10.0 }, "heuristic": { "seed": 7 } }
//! ```

use crate::benchmark::{BatchConfig, BatchRunner};
use crate::comparison::ComparisonEngine;
use crate::error::RspResult;
use crate::exact::ExactConfig;
use crate::heuristics::HeuristicConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub exact: ExactConfig,
    pub heuristic: HeuristicConfig,
    pub batch: BatchConfig,
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> RspResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> RspResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn comparison_engine(&self) -> ComparisonEngine {
        ComparisonEngine::new(self.exact.clone(), self.heuristic.clone())
    }

    pub fn batch_runner(&self) -> BatchRunner {
        BatchRunner::new(self.comparison_engine(), self.batch.clone())
    }
}
