//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `CAIRN_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::time::Duration;

use crate::cache::{TierConfig, TieredCacheConfig};
use crate::cluster::ClusterConfig;
use crate::eviction::{EvictionStrategy, PlannerConfig, StrategyWeights};

/// Node configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `CAIRN_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Cluster-unique node id. Default: a random UUID.
    pub node_id: String,

    /// Tier layout of the local cache.
    pub cache: TieredCacheConfig,

    /// Replication and membership settings.
    pub cluster: ClusterConfig,

    /// Eviction planner settings.
    pub planner: PlannerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: uuid::Uuid::new_v4().to_string(),
            cache: TieredCacheConfig::default(),
            cluster: ClusterConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

impl Config {
    const ENV_NODE_ID: &'static str = "CAIRN_NODE_ID";
    const ENV_ADDRESS: &'static str = "CAIRN_ADDRESS";
    const ENV_L1_CAPACITY: &'static str = "CAIRN_L1_CAPACITY";
    const ENV_L2_CAPACITY: &'static str = "CAIRN_L2_CAPACITY";
    const ENV_L3_CAPACITY: &'static str = "CAIRN_L3_CAPACITY";
    const ENV_L1_TTL_SECS: &'static str = "CAIRN_L1_TTL_SECS";
    const ENV_L2_TTL_SECS: &'static str = "CAIRN_L2_TTL_SECS";
    const ENV_L3_TTL_SECS: &'static str = "CAIRN_L3_TTL_SECS";
    const ENV_PROMOTION: &'static str = "CAIRN_PROMOTION";
    const ENV_SYNC_INTERVAL_MS: &'static str = "CAIRN_SYNC_INTERVAL_MS";
    const ENV_HEARTBEAT_INTERVAL_MS: &'static str = "CAIRN_HEARTBEAT_INTERVAL_MS";
    const ENV_NODE_TIMEOUT_MS: &'static str = "CAIRN_NODE_TIMEOUT_MS";
    const ENV_REMOVAL_GRACE_MULTIPLE: &'static str = "CAIRN_REMOVAL_GRACE_MULTIPLE";
    const ENV_SYNC_RETRIES: &'static str = "CAIRN_SYNC_RETRIES";
    const ENV_RETRY_INITIAL_DELAY_MS: &'static str = "CAIRN_RETRY_INITIAL_DELAY_MS";
    const ENV_RETRY_MAX_DELAY_MS: &'static str = "CAIRN_RETRY_MAX_DELAY_MS";
    const ENV_MAX_BACKLOG: &'static str = "CAIRN_MAX_BACKLOG";
    const ENV_REMOTE_FETCH_TTL_SECS: &'static str = "CAIRN_REMOTE_FETCH_TTL_SECS";
    const ENV_REQUEST_TIMEOUT_MS: &'static str = "CAIRN_REQUEST_TIMEOUT_MS";
    const ENV_EVICTION_STRATEGY: &'static str = "CAIRN_EVICTION_STRATEGY";
    const ENV_ANALYSIS_INTERVAL_MS: &'static str = "CAIRN_ANALYSIS_INTERVAL_MS";
    const ENV_MIN_SAMPLES: &'static str = "CAIRN_MIN_SAMPLES";
    const ENV_LEARNING_WINDOW_SECS: &'static str = "CAIRN_LEARNING_WINDOW_SECS";
    const ENV_RECENT_WINDOW_SECS: &'static str = "CAIRN_RECENT_WINDOW_SECS";
    const ENV_REGRET_WINDOW_SECS: &'static str = "CAIRN_REGRET_WINDOW_SECS";
    const ENV_LEARNING_RATE: &'static str = "CAIRN_LEARNING_RATE";
    const ENV_HYBRID_WEIGHTS: &'static str = "CAIRN_HYBRID_WEIGHTS";

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// Malformed numbers fall back to their default; malformed ids, booleans,
    /// strategy names and weight maps are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let node_id = Self::parse_node_id_from_env(defaults.node_id)?;
        let cache = TieredCacheConfig {
            name: node_id.clone(),
            l1: Self::parse_tier_from_env(Self::ENV_L1_CAPACITY, Self::ENV_L1_TTL_SECS, defaults.cache.l1),
            l2: Self::parse_tier_from_env(Self::ENV_L2_CAPACITY, Self::ENV_L2_TTL_SECS, defaults.cache.l2),
            l3: Self::parse_tier_from_env(Self::ENV_L3_CAPACITY, Self::ENV_L3_TTL_SECS, defaults.cache.l3),
            enable_promotion: Self::parse_bool_from_env(
                Self::ENV_PROMOTION,
                defaults.cache.enable_promotion,
            )?,
        };

        let mut cluster = defaults.cluster;
        cluster.address = Self::parse_string_from_env(Self::ENV_ADDRESS, cluster.address);
        cluster.sync_interval =
            Self::parse_millis_from_env(Self::ENV_SYNC_INTERVAL_MS, cluster.sync_interval);
        cluster.heartbeat_interval =
            Self::parse_millis_from_env(Self::ENV_HEARTBEAT_INTERVAL_MS, cluster.heartbeat_interval);
        cluster.node_timeout =
            Self::parse_millis_from_env(Self::ENV_NODE_TIMEOUT_MS, cluster.node_timeout);
        cluster.removal_grace_multiple = Self::parse_u32_from_env(
            Self::ENV_REMOVAL_GRACE_MULTIPLE,
            cluster.removal_grace_multiple,
        );
        cluster.retry.max_attempts =
            Self::parse_u32_from_env(Self::ENV_SYNC_RETRIES, cluster.retry.max_attempts);
        cluster.retry.initial_delay =
            Self::parse_millis_from_env(Self::ENV_RETRY_INITIAL_DELAY_MS, cluster.retry.initial_delay);
        cluster.retry.max_delay =
            Self::parse_millis_from_env(Self::ENV_RETRY_MAX_DELAY_MS, cluster.retry.max_delay);
        cluster.max_backlog =
            Self::parse_u64_from_env(Self::ENV_MAX_BACKLOG, cluster.max_backlog as u64) as usize;
        cluster.remote_fetch_ttl =
            Self::parse_secs_from_env(Self::ENV_REMOTE_FETCH_TTL_SECS, cluster.remote_fetch_ttl);
        cluster.request_timeout = env::var(Self::ENV_REQUEST_TIMEOUT_MS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .or(cluster.request_timeout);

        let mut planner = defaults.planner;
        planner.default_strategy = Self::parse_strategy_from_env(planner.default_strategy)?;
        planner.analysis_interval =
            Self::parse_millis_from_env(Self::ENV_ANALYSIS_INTERVAL_MS, planner.analysis_interval);
        planner.min_samples =
            Self::parse_u64_from_env(Self::ENV_MIN_SAMPLES, planner.min_samples as u64) as usize;
        planner.learning_window =
            Self::parse_secs_from_env(Self::ENV_LEARNING_WINDOW_SECS, planner.learning_window);
        planner.recent_window =
            Self::parse_secs_from_env(Self::ENV_RECENT_WINDOW_SECS, planner.recent_window);
        planner.regret_window =
            Self::parse_secs_from_env(Self::ENV_REGRET_WINDOW_SECS, planner.regret_window);
        planner.learning_rate = env::var(Self::ENV_LEARNING_RATE)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(planner.learning_rate);
        planner.hybrid_weights = Self::parse_weights_from_env(planner.hybrid_weights)?;

        Ok(Self {
            node_id,
            cache,
            cluster,
            planner,
        })
    }

    /// Validates every sub-configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::InvalidNodeId {
                value: self.node_id.clone(),
            });
        }
        self.cache.validate()?;
        self.cluster.validate()?;
        self.planner.validate()?;
        Ok(())
    }

    fn parse_node_id_from_env(default: String) -> Result<String, ConfigError> {
        match env::var(Self::ENV_NODE_ID) {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(ConfigError::InvalidNodeId { value });
                }
                Ok(trimmed.to_string())
            }
            Err(_) => Ok(default),
        }
    }

    /// Capacity 0 disables the tier; TTL 0 means no default expiry.
    fn parse_tier_from_env(capacity_var: &str, ttl_var: &str, default: TierConfig) -> TierConfig {
        let capacity = Self::parse_u64_from_env(capacity_var, default.capacity);
        let default_ttl = match env::var(ttl_var).ok().and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => default.default_ttl,
        };
        let enabled = match env::var(capacity_var) {
            Ok(_) => capacity > 0,
            Err(_) => default.enabled,
        };
        TierConfig {
            enabled,
            capacity,
            default_ttl,
        }
    }

    fn parse_strategy_from_env(default: EvictionStrategy) -> Result<EvictionStrategy, ConfigError> {
        match env::var(Self::ENV_EVICTION_STRATEGY) {
            Ok(value) => value
                .parse()
                .map_err(|reason| ConfigError::InvalidStrategy { value, reason }),
            Err(_) => Ok(default),
        }
    }

    fn parse_weights_from_env(default: StrategyWeights) -> Result<StrategyWeights, ConfigError> {
        match env::var(Self::ENV_HYBRID_WEIGHTS) {
            Ok(value) => serde_json::from_str(&value)
                .map_err(|source| ConfigError::InvalidHybridWeights { value, source }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidBool {
                    name: var_name,
                    value,
                }),
            },
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_millis_from_env(var_name: &str, default: Duration) -> Duration {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    fn parse_secs_from_env(var_name: &str, default: Duration) -> Duration {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    fn parse_u32_from_env(var_name: &str, default: u32) -> u32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
