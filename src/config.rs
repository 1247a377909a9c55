//! Configuration and defaults for genecount.
//!
//! This module contains the configuration structure that controls fragment
//! assembly and overlap resolution. It is built once from the command line
//! and validated before any input is read.

use std::fmt;

use crate::types::CountMode;

/// Default number of fragments sent to a worker at a time.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Errors raised while building a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidMode(String),
    NegativeMapq(i64),
    ZeroBatchSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidMode(mode) => write!(
                f,
                "Mode '{}' is not supported. Use one of: union, intersection-strict, intersection-not-empty.",
                mode
            ),
            ConfigError::NegativeMapq(value) => write!(
                f,
                "The mapping quality filter cannot be lower than 0 (got {}).",
                value
            ),
            ConfigError::ZeroBatchSize => write!(f, "Batch size must be greater than 0"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for one counting run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Overlap-resolution policy.
    pub mode: CountMode,
    /// Treat every record as its own fragment.
    pub single_end: bool,
    /// Only count fragments against genes on the same strand.
    pub stranded: bool,
    /// In paired mode, count mates whose partner never shows up.
    pub count_fragments: bool,
    /// Records with a lower mapping quality are dropped.
    pub mapq_filter: u32,
    /// GTF attribute holding the gene identifier.
    pub gene_id_tag: String,
    /// Worker threads (1 = sequential).
    pub threads: usize,
    /// Fragments per work item.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: CountMode::Union,
            single_end: true,
            stranded: false,
            count_fragments: false,
            mapq_filter: 0,
            gene_id_tag: "gene_id".to_string(),
            threads: 1,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and set the resolution mode.
    pub fn set_mode(&mut self, mode: &str) -> Result<(), ConfigError> {
        self.mode = mode
            .parse::<CountMode>()
            .map_err(|_| ConfigError::InvalidMode(mode.to_string()))?;
        Ok(())
    }

    /// Set the mapping quality threshold, rejecting negative values.
    pub fn set_mapq_filter(&mut self, mapq: i64) -> Result<(), ConfigError> {
        if mapq < 0 {
            return Err(ConfigError::NegativeMapq(mapq));
        }
        self.mapq_filter = u32::try_from(mapq).unwrap_or(u32::MAX);
        Ok(())
    }

    /// Set the batch size, rejecting zero.
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<(), ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        self.batch_size = batch_size;
        Ok(())
    }

    /// Check invariants that setters cannot enforce on a hand-built value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}
