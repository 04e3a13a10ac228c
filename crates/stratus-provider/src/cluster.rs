//! Cluster resource lifecycle.
//!
//! A managed cluster is identified by the resource id of the deployment
//! that created it. The state store keeps the api model for each id;
//! every mutation goes through a revision-checked replace.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use stratus_core::{
    AgentPoolProfile, ClusterModel, KubeConfig, LinuxProfile, MasterProfile, ResourceId,
};
use stratus_scale::persist::{persist_cluster_model, write_apimodel};
use stratus_scale::{
    ArtifactGenerator, CloudConnector, CloudCredentials, ScaleDriver, ScaleOutcome, ScaleRequest,
};
use stratus_state::{ClusterRecord, StateStore};
use stratus_template::ArtifactFormat;
use tracing::{debug, info, warn};

use crate::collaborators::{ClusterUpgrader, ResourceGroups};
use crate::error::{ProviderError, ProviderResult};
use crate::spec::{ClusterSpec, master_fqdn, normalize_location};
use crate::upgrade::validate_upgrade;

/// Observable state of a managed cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterState {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub kubernetes_version: String,
    pub master_profile: MasterProfile,
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
    pub linux_profile: Option<LinuxProfile>,
    pub service_principal_client_id: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub revision: u64,
    #[serde(skip_serializing)]
    pub kube_config: Option<KubeConfig>,
    #[serde(skip_serializing)]
    pub kube_config_raw: Option<String>,
}

/// External systems the lifecycle operations drive.
#[derive(Clone)]
pub struct ProviderServices {
    pub connector: Arc<dyn CloudConnector>,
    pub generator: Arc<dyn ArtifactGenerator>,
    pub resource_groups: Arc<dyn ResourceGroups>,
    pub upgrader: Arc<dyn ClusterUpgrader>,
}

pub struct ClusterResource {
    store: StateStore,
    subscription_id: String,
    deployment_root: PathBuf,
    services: ProviderServices,
    scaler: ScaleDriver,
}

impl ClusterResource {
    /// `scaler` must be built over the same store.
    pub fn new(
        store: StateStore,
        subscription_id: impl Into<String>,
        deployment_root: impl Into<PathBuf>,
        services: ProviderServices,
        scaler: ScaleDriver,
    ) -> Self {
        Self {
            store,
            subscription_id: subscription_id.into(),
            deployment_root: deployment_root.into(),
            services,
            scaler,
        }
    }

    // ── Create ────────────────────────────────────────────────────

    pub async fn create(&self, spec: &ClusterSpec) -> ProviderResult<ClusterState> {
        spec.validate()?;
        let id = ResourceId::deployment(&self.subscription_id, &spec.resource_group, &spec.name)
            .to_string();
        if self.store.get_cluster(&id)?.is_some() {
            return Err(ProviderError::AlreadyExists(id));
        }

        let mut model = spec.to_model();
        info!(
            cluster = %spec.name,
            resource_group = %spec.resource_group,
            location = %model.location,
            "creating cluster"
        );

        self.services
            .resource_groups
            .create(&spec.resource_group, &model.location, &spec.tags)
            .await
            .map_err(|source| ProviderError::ResourceGroup {
                name: spec.resource_group.clone(),
                source,
            })?;

        let artifacts = self
            .services
            .generator
            .generate(&model, ArtifactFormat::Formatted)
            .map_err(ProviderError::Generation)?;
        let (template, parameters) = artifacts.parse()?;

        let credentials = CloudCredentials {
            subscription_id: self.subscription_id.clone(),
            client_id: spec.service_principal.client_id.clone(),
            client_secret: spec.service_principal.client_secret.clone(),
        };
        let client = self
            .services
            .connector
            .connect(&credentials)
            .await
            .map_err(ProviderError::Client)?;
        let handle = client
            .deploy_template(&spec.resource_group, &spec.name, &template, &parameters)
            .await
            .map_err(|source| ProviderError::Deployment {
                name: spec.name.clone(),
                source,
            })?;
        debug!(deployment = %handle.name, state = %handle.provisioning_state, "deployment accepted");

        model.properties.master_profile.fqdn = Some(master_fqdn(
            &model.properties.master_profile.dns_prefix,
            &model.location,
        ));
        let dir = self
            .deployment_root
            .join(&model.properties.master_profile.dns_prefix);
        let document = model.to_json_pretty()?;
        let record = ClusterRecord::new(
            &id,
            document.clone(),
            Some(dir.display().to_string()),
            epoch_secs(),
        );
        self.store.put_cluster(&record)?;
        write_apimodel(&dir, &document)?;

        info!(cluster = %id, "cluster created");
        self.read(&id)
    }

    // ── Read ──────────────────────────────────────────────────────

    pub fn read(&self, id: &str) -> ProviderResult<ClusterState> {
        read_cluster(&self.store, id)
    }

    pub fn list(&self) -> ProviderResult<Vec<String>> {
        Ok(self
            .store
            .list_clusters()?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    // ── Update ────────────────────────────────────────────────────

    /// Apply version, agent count and tag changes, in that order.
    pub async fn update(&self, id: &str, spec: &ClusterSpec) -> ProviderResult<ClusterState> {
        let resource = parse_id(id)?;
        spec.validate()?;
        let (model, record) = self.load(id)?;
        check_pools_unchanged(&model, spec)?;

        if spec.kubernetes_version != model.kubernetes_version() {
            validate_upgrade(model.kubernetes_version(), &spec.kubernetes_version)?;
            info!(
                cluster = %id,
                from = %model.kubernetes_version(),
                to = %spec.kubernetes_version,
                "upgrading cluster"
            );
            let upgraded = self
                .services
                .upgrader
                .upgrade(&model, &resource.resource_group, &spec.kubernetes_version)
                .await
                .map_err(|source| ProviderError::Upgrade {
                    version: spec.kubernetes_version.clone(),
                    source,
                })?;
            persist_cluster_model(&self.store, id, record.revision, &upgraded, None)?;
        }

        for (index, pool) in spec.agent_pool_profiles.iter().enumerate() {
            let (model, _) = self.load(id)?;
            if model.agent_pool(index)?.count == pool.count {
                continue;
            }
            let request = ScaleRequest {
                cluster_id: id.to_string(),
                agent_pool_index: index,
                desired_count: pool.count,
                deployment_dir: None,
            };
            let outcome = self
                .scaler
                .scale_agent_pool(&request)
                .await
                .map_err(|source| ProviderError::Scale {
                    pool: pool.name.clone(),
                    source,
                })?;
            if let ScaleOutcome::NoOp { count, .. } = outcome {
                warn!(
                    cluster = %id,
                    pool = %pool.name,
                    live = count,
                    desired = pool.count,
                    "live pool already at desired count; stored model is stale"
                );
                self.sync_pool_count(id, index, pool.count)?;
            }
        }

        let (mut model, record) = self.load(id)?;
        if model.tags != spec.tags {
            self.services
                .resource_groups
                .update_tags(&resource.resource_group, &spec.tags)
                .await
                .map_err(|source| ProviderError::ResourceGroup {
                    name: resource.resource_group.clone(),
                    source,
                })?;
            model.tags = spec.tags.clone();
            persist_cluster_model(&self.store, id, record.revision, &model, None)?;
        }

        self.read(id)
    }

    fn sync_pool_count(&self, id: &str, index: usize, count: u32) -> ProviderResult<()> {
        let (mut model, record) = self.load(id)?;
        model.agent_pool_mut(index)?.count = count;
        persist_cluster_model(&self.store, id, record.revision, &model, None)?;
        Ok(())
    }

    // ── Delete ────────────────────────────────────────────────────

    /// Delete the cluster's resource group. A group that is already gone
    /// counts as deleted.
    pub async fn delete(&self, id: &str) -> ProviderResult<()> {
        let resource = parse_id(id)?;
        match self
            .services
            .resource_groups
            .delete(&resource.resource_group)
            .await
        {
            Ok(()) => info!(cluster = %id, resource_group = %resource.resource_group, "resource group deleted"),
            Err(e) if e.is_not_found() => {
                info!(cluster = %id, resource_group = %resource.resource_group, "resource group already gone")
            }
            Err(source) => {
                return Err(ProviderError::ResourceGroup {
                    name: resource.resource_group,
                    source,
                });
            }
        }
        self.store.delete_cluster(id)?;
        Ok(())
    }

    // ── Import ────────────────────────────────────────────────────

    /// Start managing an existing cluster from its api model document.
    pub fn import(
        &self,
        id: &str,
        api_model: &str,
        deployment_dir: Option<PathBuf>,
    ) -> ProviderResult<ClusterState> {
        import_cluster(&self.store, id, api_model, deployment_dir)
    }

    fn load(&self, id: &str) -> ProviderResult<(ClusterModel, ClusterRecord)> {
        load_model(&self.store, id)
    }
}

// ── Store-only operations ─────────────────────────────────────────

/// Project the stored model for `id` into a [`ClusterState`].
pub fn read_cluster(store: &StateStore, id: &str) -> ProviderResult<ClusterState> {
    let resource = parse_id(id)?;
    let (model, record) = load_model(store, id)?;

    let kube_config = match KubeConfig::from_model(&model, &resource.resource_group) {
        Ok(config) => Some(config),
        Err(e) => {
            debug!(cluster = %id, error = %e, "no kubeconfig available");
            None
        }
    };
    let kube_config_raw = kube_config.as_ref().map(KubeConfig::to_raw);

    Ok(ClusterState {
        id: id.to_string(),
        name: model.name.clone(),
        resource_group: resource.resource_group,
        location: normalize_location(&model.location),
        kubernetes_version: model.kubernetes_version().to_string(),
        master_profile: model.properties.master_profile.clone(),
        agent_pool_profiles: model.properties.agent_pool_profiles.clone(),
        linux_profile: model.properties.linux_profile.clone(),
        service_principal_client_id: model
            .properties
            .service_principal_profile
            .as_ref()
            .map(|sp| sp.client_id.clone()),
        tags: model.tags.clone(),
        revision: record.revision,
        kube_config,
        kube_config_raw,
    })
}

/// Store `api_model` under `id`. Refuses ids that are already managed.
pub fn import_cluster(
    store: &StateStore,
    id: &str,
    api_model: &str,
    deployment_dir: Option<PathBuf>,
) -> ProviderResult<ClusterState> {
    parse_id(id)?;
    if store.get_cluster(id)?.is_some() {
        return Err(ProviderError::AlreadyExists(id.to_string()));
    }
    let model = ClusterModel::from_json(api_model)?;
    let record = ClusterRecord::new(
        id,
        api_model.to_string(),
        deployment_dir.as_ref().map(|d| d.display().to_string()),
        epoch_secs(),
    );
    store.put_cluster(&record)?;
    if let Some(dir) = &deployment_dir {
        write_apimodel(dir, api_model)?;
    }
    info!(
        cluster = %id,
        name = %model.name,
        pools = model.properties.agent_pool_profiles.len(),
        "cluster imported"
    );
    read_cluster(store, id)
}

fn load_model(store: &StateStore, id: &str) -> ProviderResult<(ClusterModel, ClusterRecord)> {
    let record = store
        .get_cluster(id)?
        .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
    let model = ClusterModel::from_json(&record.api_model)?;
    Ok((model, record))
}

fn parse_id(id: &str) -> ProviderResult<ResourceId> {
    ResourceId::parse(id).map_err(|source| ProviderError::ResourceId {
        id: id.to_string(),
        source,
    })
}

/// Pools are matched by position; adding, removing or renaming one
/// requires a new cluster.
fn check_pools_unchanged(model: &ClusterModel, spec: &ClusterSpec) -> ProviderResult<()> {
    let existing = &model.properties.agent_pool_profiles;
    if existing.len() != spec.agent_pool_profiles.len() {
        return Err(ProviderError::InvalidSpec(format!(
            "agent pools cannot be added or removed ({} -> {})",
            existing.len(),
            spec.agent_pool_profiles.len()
        )));
    }
    for (current, wanted) in existing.iter().zip(&spec.agent_pool_profiles) {
        if current.name != wanted.name {
            return Err(ProviderError::InvalidSpec(format!(
                "agent pool {:?} cannot be renamed to {:?}",
                current.name, wanted.name
            )));
        }
    }
    Ok(())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
