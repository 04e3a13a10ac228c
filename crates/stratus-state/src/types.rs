//! Record types for the Stratus state store.

use serde::{Deserialize, Serialize};

/// Resource id of a managed cluster.
pub type ClusterId = String;

/// Persisted state of one managed cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterRecord {
    pub id: ClusterId,
    /// The api model document, exactly as last written.
    pub api_model: String,
    /// Directory that receives apimodel.json on every write.
    pub deployment_dir: Option<String>,
    /// Incremented on every replace; starts at 1.
    pub revision: u64,
    /// Unix timestamp (seconds) of the last write.
    pub updated_at: u64,
}

impl ClusterRecord {
    pub fn new(id: &str, api_model: String, deployment_dir: Option<String>, now: u64) -> Self {
        ClusterRecord {
            id: id.to_string(),
            api_model,
            deployment_dir,
            revision: 1,
            updated_at: now,
        }
    }

    /// Build the key for the clusters table.
    pub fn table_key(&self) -> &str {
        &self.id
    }
}
