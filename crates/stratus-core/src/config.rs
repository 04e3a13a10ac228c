//! stratus.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STATE_PATH: &str = "stratus.redb";
pub const DEFAULT_DEPLOYMENT_DIR: &str = "_output";
pub const DEFAULT_DRAIN_GRACE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_PARALLEL_DELETIONS: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StratusConfig {
    pub state: Option<StateConfig>,
    pub deployment: Option<DeploymentConfig>,
    pub scale: Option<ScaleConfig>,
    pub cloud: Option<CloudConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Directory that receives apimodel.json after each change.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub drain_grace_period: Option<String>,
    pub max_parallel_deletions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub subscription_id: Option<String>,
    pub locale: Option<String>,
}

impl StratusConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StratusConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn state_path(&self) -> &str {
        self.state
            .as_ref()
            .and_then(|s| s.path.as_deref())
            .unwrap_or(DEFAULT_STATE_PATH)
    }

    pub fn deployment_dir(&self) -> &str {
        self.deployment
            .as_ref()
            .and_then(|d| d.directory.as_deref())
            .unwrap_or(DEFAULT_DEPLOYMENT_DIR)
    }

    /// Grace period handed to the node drainer. Unparseable values fall
    /// back to the default.
    pub fn drain_grace_period(&self) -> Duration {
        self.scale
            .as_ref()
            .and_then(|s| s.drain_grace_period.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_DRAIN_GRACE_PERIOD)
    }

    pub fn max_parallel_deletions(&self) -> usize {
        self.scale
            .as_ref()
            .and_then(|s| s.max_parallel_deletions)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_PARALLEL_DELETIONS)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.cloud.as_ref().and_then(|c| c.subscription_id.as_deref())
    }

    /// Scaffold a config with every default spelled out.
    pub fn scaffold() -> Self {
        StratusConfig {
            state: Some(StateConfig {
                path: Some(DEFAULT_STATE_PATH.to_string()),
            }),
            deployment: Some(DeploymentConfig {
                directory: Some(DEFAULT_DEPLOYMENT_DIR.to_string()),
            }),
            scale: Some(ScaleConfig {
                drain_grace_period: Some("60s".to_string()),
                max_parallel_deletions: Some(DEFAULT_MAX_PARALLEL_DELETIONS),
            }),
            cloud: Some(CloudConfig {
                subscription_id: None,
                locale: Some("en-us".to_string()),
            }),
        }
    }
}

/// Parse a duration string like "30s", "5m" or "45".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
