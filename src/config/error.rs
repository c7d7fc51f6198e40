//! Configuration error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::cluster::ClusterError;
use crate::eviction::EvictionError;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Node id was set but blank.
    #[error("invalid node id '{value}': must not be empty")]
    InvalidNodeId { value: String },

    /// Boolean variable holds something other than true/false/1/0/yes/no/on/off.
    #[error("failed to parse {name}='{value}' as a boolean")]
    InvalidBool { name: &'static str, value: String },

    /// Strategy name is not in the registry.
    #[error("invalid eviction strategy '{value}': {reason}")]
    InvalidStrategy { value: String, reason: String },

    /// Hybrid weights are not a JSON object of numbers.
    #[error("failed to parse hybrid weights '{value}': {source}")]
    InvalidHybridWeights {
        value: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache configuration: {0}")]
    Cache(#[from] CacheError),

    #[error("cluster configuration: {0}")]
    Cluster(#[from] ClusterError),

    #[error("eviction configuration: {0}")]
    Eviction(#[from] EvictionError),
}
