use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::analysis::charset::Collation;
use crate::core::error::{Error, Result};

/// Upper bound accepted for `query_expansion_limit`
pub const MAX_QUERY_EXPANSION_LIMIT: usize = 1024;

/// Process-wide fulltext settings. Frozen once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_word_len: usize,           // In characters
    pub max_word_len: usize,           // In characters; longer words are dropped
    pub hyphen_is_delim: bool,         // '-' splits words
    pub query_expansion_limit: usize,  // Feedback documents for EXPAND; 0 disables
    pub pivot_coefficient: f64,        // Pivoted length normalization slope
    pub strict_utf8: bool,             // Stop tokenizing at malformed UTF-8
    pub max_stopwords: usize,
    pub frequent_word_limit: u64,      // Words in more documents than this score zero
    pub collation: Collation,          // Collation of the stopword set
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_word_len: 4,
            max_word_len: 84,
            hyphen_is_delim: true,
            query_expansion_limit: 0,
            pivot_coefficient: 0.0115,
            strict_utf8: false,
            max_stopwords: 65_536,
            frequent_word_limit: 2_000_000,
            collation: Collation::CaseInsensitive,
        }
    }
}

impl Config {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_word_len == 0 {
            return Err(Error::invalid_config("min_word_len must be at least 1"));
        }
        if self.min_word_len > self.max_word_len {
            return Err(Error::invalid_config(format!(
                "min_word_len {} exceeds max_word_len {}",
                self.min_word_len, self.max_word_len
            )));
        }
        if self.query_expansion_limit > MAX_QUERY_EXPANSION_LIMIT {
            return Err(Error::invalid_config(format!(
                "query_expansion_limit {} exceeds {}",
                self.query_expansion_limit, MAX_QUERY_EXPANSION_LIMIT
            )));
        }
        if !self.pivot_coefficient.is_finite() || self.pivot_coefficient < 0.0 {
            return Err(Error::invalid_config(format!(
                "pivot_coefficient {} is not a non-negative number",
                self.pivot_coefficient
            )));
        }
        Ok(())
    }

    pub fn with_min_word_len(mut self, len: usize) -> Self {
        self.min_word_len = len;
        self
    }

    pub fn with_query_expansion_limit(mut self, limit: usize) -> Self {
        self.query_expansion_limit = limit;
        self
    }

    pub fn with_hyphen_is_delim(mut self, hyphen_is_delim: bool) -> Self {
        self.hyphen_is_delim = hyphen_is_delim;
        self
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }
}
