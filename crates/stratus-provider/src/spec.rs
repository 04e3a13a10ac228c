//! User-facing cluster description and its mapping to an api model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Map;
use stratus_core::{
    AgentPoolProfile, AvailabilityProfile, ClusterModel, ClusterProperties, DEFAULT_API_VERSION,
    LinuxProfile, MasterProfile, OrchestratorProfile, OsType, PublicKey, ServicePrincipalProfile,
    SshConfig,
};

use crate::error::{ProviderError, ProviderResult};

pub const DEFAULT_VM_SIZE: &str = "Standard_DS1_v2";
pub const MAX_AGENT_POOL_COUNT: u32 = 100;
const MASTER_COUNTS: [u32; 3] = [1, 3, 5];

/// Declarative description of a cluster resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub kubernetes_version: String,
    pub linux_profile: LinuxSpec,
    pub service_principal: ServicePrincipalSpec,
    pub master_profile: MasterSpec,
    pub agent_pool_profiles: Vec<AgentPoolSpec>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxSpec {
    pub admin_username: String,
    pub ssh_key_data: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrincipalSpec {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ServicePrincipalSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePrincipalSpec")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSpec {
    #[serde(default = "default_count")]
    pub count: u32,
    pub dns_name_prefix: String,
    #[serde(default = "default_vm_size")]
    pub vm_size: String,
    #[serde(default)]
    pub os_disk_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPoolSpec {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_vm_size")]
    pub vm_size: String,
    #[serde(default)]
    pub os_disk_size: Option<u32>,
    #[serde(default)]
    pub os_type: OsType,
    #[serde(default)]
    pub availability_profile: Option<AvailabilityProfile>,
}

fn default_count() -> u32 {
    1
}

fn default_vm_size() -> String {
    DEFAULT_VM_SIZE.to_string()
}

impl ClusterSpec {
    pub fn validate(&self) -> ProviderResult<()> {
        if self.name.trim().is_empty() {
            return Err(ProviderError::InvalidSpec("name must not be empty".to_string()));
        }
        if self.resource_group.trim().is_empty() {
            return Err(ProviderError::InvalidSpec(
                "resource_group must not be empty".to_string(),
            ));
        }
        if !MASTER_COUNTS.contains(&self.master_profile.count) {
            return Err(ProviderError::InvalidSpec(format!(
                "master count must be 1, 3 or 5, got {}",
                self.master_profile.count
            )));
        }
        if self.agent_pool_profiles.is_empty() {
            return Err(ProviderError::InvalidSpec(
                "at least one agent pool is required".to_string(),
            ));
        }
        for pool in &self.agent_pool_profiles {
            if !(1..=MAX_AGENT_POOL_COUNT).contains(&pool.count) {
                return Err(ProviderError::InvalidSpec(format!(
                    "agent pool {:?} count must be between 1 and {MAX_AGENT_POOL_COUNT}, got {}",
                    pool.name, pool.count
                )));
            }
        }
        Ok(())
    }

    /// Build the api model for an initial deployment.
    pub fn to_model(&self) -> ClusterModel {
        let agent_pool_profiles = self
            .agent_pool_profiles
            .iter()
            .map(|pool| AgentPoolProfile {
                name: pool.name.clone(),
                count: pool.count,
                vm_size: pool.vm_size.clone(),
                os_disk_size_gb: pool.os_disk_size,
                os_type: pool.os_type,
                availability_profile: pool.availability_profile,
                extra: Map::new(),
            })
            .collect();

        ClusterModel {
            api_version: DEFAULT_API_VERSION.to_string(),
            name: self.name.clone(),
            location: normalize_location(&self.location),
            tags: self.tags.clone(),
            properties: ClusterProperties {
                orchestrator_profile: OrchestratorProfile {
                    orchestrator_type: "Kubernetes".to_string(),
                    orchestrator_version: self.kubernetes_version.clone(),
                    extra: Map::new(),
                },
                master_profile: MasterProfile {
                    count: self.master_profile.count,
                    dns_prefix: self.master_profile.dns_name_prefix.clone(),
                    vm_size: self.master_profile.vm_size.clone(),
                    os_disk_size_gb: self.master_profile.os_disk_size,
                    fqdn: None,
                    extra: Map::new(),
                },
                agent_pool_profiles,
                linux_profile: Some(LinuxProfile {
                    admin_username: self.linux_profile.admin_username.clone(),
                    ssh: SshConfig {
                        public_keys: vec![PublicKey {
                            key_data: self.linux_profile.ssh_key_data.clone(),
                        }],
                    },
                    extra: Map::new(),
                }),
                service_principal_profile: Some(ServicePrincipalProfile {
                    client_id: self.service_principal.client_id.clone(),
                    secret: Some(self.service_principal.client_secret.clone()),
                    keyvault_secret_ref: None,
                    extra: Map::new(),
                }),
                certificate_profile: None,
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }
}

/// Lowercase with spaces removed: `"West US 2"` becomes `"westus2"`.
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Public control plane address assigned to a deployed cluster.
pub fn master_fqdn(dns_prefix: &str, location: &str) -> String {
    format!("{dns_prefix}.{}.cloudapp.azure.com", normalize_location(location))
}
