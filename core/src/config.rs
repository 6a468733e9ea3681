use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Tunables for building, scoring and presenting results.
///
/// Every field has a default so a config file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Authority damping factor.
    pub damping: f64,
    /// Authority iterations; scoring never stops early.
    pub iterations: usize,
    /// Characters of context kept on each side of a snippet match.
    pub context_chars: usize,
    pub snippet_separator: String,
    /// Below this many hits a search is reported as weak.
    pub weak_match_threshold: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            iterations: 20,
            context_chars: 30,
            snippet_separator: " ... ".to_string(),
            weak_match_threshold: 3,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Accept a requested page size in `1..=max_page_size` unchanged.
    pub fn check_page_size(&self, requested: usize) -> Result<usize> {
        if requested == 0 || requested > self.max_page_size {
            return Err(Error::InvalidPageSize { requested, max: self.max_page_size });
        }
        Ok(requested)
    }
}
