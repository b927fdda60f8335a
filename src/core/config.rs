use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

/// Upper bound for `SearchRequest` limits
pub const MAX_LIMIT: usize = 60_000;

pub const DEFAULT_CEILING: usize = 60_000;
pub const DEFAULT_MIN_UPSCALE: usize = 2_000;
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 4;

/// Search layer configuration, passed explicitly to the executor and the throttle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hard cap on documents fetched from the index engine in one round
    pub ceiling: usize,
    /// Minimum growth step when widening the fetch window
    pub min_upscale: usize,
    /// Requests above this limit are clamped
    pub max_limit: usize,
    pub max_concurrent_queries: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            ceiling: DEFAULT_CEILING,
            min_upscale: DEFAULT_MIN_UPSCALE,
            max_limit: MAX_LIMIT,
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
        }
    }
}

impl SearchConfig {
    /// Load from JSON; missing keys fall back to defaults
    pub fn from_json(input: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(input)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("ceiling", self.ceiling),
            ("min_upscale", self.min_upscale),
            ("max_limit", self.max_limit),
            ("max_concurrent_queries", self.max_concurrent_queries),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.max_limit > MAX_LIMIT {
            return Err(Error::Config(format!(
                "max_limit {} exceeds MAX_LIMIT {}",
                self.max_limit, MAX_LIMIT
            )));
        }
        Ok(())
    }
}
