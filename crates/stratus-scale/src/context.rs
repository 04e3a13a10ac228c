//! Per-invocation scale state and tunables.

use std::sync::Arc;
use std::time::Duration;

use stratus_core::config::{DEFAULT_DRAIN_GRACE_PERIOD, DEFAULT_MAX_PARALLEL_DELETIONS};
use stratus_core::{ClusterModel, ResourceId, StratusConfig};

use crate::collaborators::CloudClient;
use crate::topology::{PoolInventory, PoolTopology};

/// Tunables for the scale path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleSettings {
    /// Grace period handed to the node drainer.
    pub drain_grace_period: Duration,
    /// Upper bound on concurrent VM deletions.
    pub max_parallel_deletions: usize,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self {
            drain_grace_period: DEFAULT_DRAIN_GRACE_PERIOD,
            max_parallel_deletions: DEFAULT_MAX_PARALLEL_DELETIONS,
        }
    }
}

impl ScaleSettings {
    pub fn from_config(config: &StratusConfig) -> Self {
        Self {
            drain_grace_period: config.drain_grace_period(),
            max_parallel_deletions: config.max_parallel_deletions(),
        }
    }
}

/// Everything one scale operation knows about its target pool.
pub struct ScaleContext {
    pub cluster: ResourceId,
    pub model: ClusterModel,
    /// Store revision the model was loaded at.
    pub revision: u64,
    pub pool_index: usize,
    pub pool_name: String,
    pub topology: PoolTopology,
    pub inventory: PoolInventory,
    pub desired_count: u32,
    pub client: Arc<dyn CloudClient>,
}

impl ScaleContext {
    pub fn subscription_id(&self) -> &str {
        &self.cluster.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.cluster.resource_group
    }

    pub fn current_count(&self) -> u32 {
        self.inventory.current_count
    }
}
