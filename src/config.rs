//! Workflow and database configuration.

use crate::topk::{DEFAULT_TOP_K, MAX_TOP_K, MIN_TOP_K};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum outer retries after a failed validation (default: 2, i.e.
    /// 3 generation attempts in total)
    pub max_retries: u32,
    /// Row limit applied when the question carries no hint
    pub default_top_k: u32,
    /// Smallest accepted row limit
    pub top_k_min: u32,
    /// Largest accepted row limit
    pub top_k_max: u32,
    /// Iteration cap of the execution agent's internal repair loop
    pub agent_max_iterations: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            default_top_k: DEFAULT_TOP_K,
            top_k_min: MIN_TOP_K,
            top_k_max: MAX_TOP_K,
            agent_max_iterations: 5,
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outer retry bound.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the default row limit.
    pub fn with_default_top_k(mut self, top_k: u32) -> Self {
        self.default_top_k = top_k;
        self
    }

    /// Set the agent repair-loop iteration cap.
    pub fn with_agent_max_iterations(mut self, iterations: u32) -> Self {
        self.agent_max_iterations = iterations;
        self
    }
}

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Upper bound on pooled connections
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool_size: 4,
        }
    }

    /// Set the connection pool bound.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.top_k_min, 1);
        assert_eq!(config.top_k_max, 50);
        assert_eq!(config.agent_max_iterations, 5);
    }

    #[test]
    fn test_workflow_builders() {
        let config = WorkflowConfig::new()
            .with_max_retries(1)
            .with_default_top_k(10)
            .with_agent_max_iterations(3);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.default_top_k, 10);
        assert_eq!(config.agent_max_iterations, 3);
    }

    #[test]
    fn test_database_pool_size_floor() {
        let config = DatabaseConfig::new("stocks.db").with_pool_size(0);
        assert_eq!(config.pool_size, 1);
    }
}
