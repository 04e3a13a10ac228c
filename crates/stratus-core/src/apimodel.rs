//! Cluster api model — the persisted desired-state document.
//!
//! The document follows the vlabs api model layout (camelCase JSON). Only
//! the fields the lifecycle and scale paths read or write are typed; every
//! other field is carried through the `extra` maps so that a load/persist
//! cycle never drops data written by other tools.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Api version written into newly built models.
pub const DEFAULT_API_VERSION: &str = "vlabs";

/// Image publisher used by Windows agent nodes.
pub const WINDOWS_PUBLISHER: &str = "MicrosoftWindowsServer";

#[derive(Debug, Error)]
pub enum ApiModelError {
    #[error("failed to parse api model: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize api model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("agent pool index {index} out of range ({count} pools defined)")]
    PoolIndexOutOfRange { index: usize, count: usize },
}

// ── Cluster ───────────────────────────────────────────────────────

/// Full desired-state description of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterModel {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub properties: ClusterProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    pub orchestrator_profile: OrchestratorProfile,
    pub master_profile: MasterProfile,
    #[serde(default)]
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_profile: Option<LinuxProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_profile: Option<ServicePrincipalProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_profile: Option<CertificateProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorProfile {
    pub orchestrator_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub orchestrator_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasterProfile {
    pub count: u32,
    pub dns_prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vm_size: String,
    #[serde(
        rename = "osDiskSizeGB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub os_disk_size_gb: Option<u32>,
    /// Public address of the control plane, filled in after deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Agent pools ───────────────────────────────────────────────────

/// A named pool of agent nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProfile {
    pub name: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vm_size: String,
    #[serde(
        rename = "osDiskSizeGB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub os_disk_size_gb: Option<u32>,
    #[serde(default)]
    pub os_type: OsType,
    /// Backing topology. Absent means availability set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_profile: Option<AvailabilityProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityProfile {
    AvailabilitySet,
    VirtualMachineScaleSets,
}

impl AgentPoolProfile {
    /// True when the pool's instances are individually named, indexed VMs.
    pub fn is_availability_set(&self) -> bool {
        !matches!(
            self.availability_profile,
            Some(AvailabilityProfile::VirtualMachineScaleSets)
        )
    }

    pub fn is_windows(&self) -> bool {
        self.os_type == OsType::Windows
    }
}

// ── Access profiles ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinuxProfile {
    pub admin_username: String,
    pub ssh: SshConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub public_keys: Vec<PublicKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub key_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipalProfile {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyvault_secret_ref: Option<KeyvaultSecretRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to a service principal secret held in a key vault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyvaultSecretRef {
    #[serde(rename = "vaultID")]
    pub vault_id: String,
    pub secret_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// PEM material generated for the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config_private_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl ClusterModel {
    /// Parse a persisted api model document.
    pub fn from_json(document: &str) -> Result<Self, ApiModelError> {
        serde_json::from_str(document).map_err(ApiModelError::Parse)
    }

    /// Serialize the model in the layout written to `apimodel.json`.
    pub fn to_json_pretty(&self) -> Result<String, ApiModelError> {
        serde_json::to_string_pretty(self).map_err(ApiModelError::Serialize)
    }

    pub fn agent_pool(&self, index: usize) -> Result<&AgentPoolProfile, ApiModelError> {
        let count = self.properties.agent_pool_profiles.len();
        self.properties
            .agent_pool_profiles
            .get(index)
            .ok_or(ApiModelError::PoolIndexOutOfRange { index, count })
    }

    pub fn agent_pool_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut AgentPoolProfile, ApiModelError> {
        let count = self.properties.agent_pool_profiles.len();
        self.properties
            .agent_pool_profiles
            .get_mut(index)
            .ok_or(ApiModelError::PoolIndexOutOfRange { index, count })
    }

    /// Control plane address, if the cluster has been deployed.
    pub fn master_fqdn(&self) -> Option<&str> {
        self.properties
            .master_profile
            .fqdn
            .as_deref()
            .filter(|fqdn| !fqdn.trim().is_empty())
    }

    pub fn kubernetes_version(&self) -> &str {
        &self.properties.orchestrator_profile.orchestrator_version
    }

    /// Eight hex digit identifier embedded in agent VM names.
    ///
    /// FNV-1a over the master DNS prefix, truncated to 32 bits.
    pub fn cluster_id(&self) -> String {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in self.properties.master_profile.dns_prefix.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        format!("{:08x}", hash as u32)
    }
}
