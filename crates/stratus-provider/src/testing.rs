//! In-memory collaborators for lifecycle tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stratus_core::{ClusterModel, KeyvaultSecretRef, KubeConfig};
use stratus_scale::{
    ArtifactGenerator, BoxError, BoxFuture, CloudClient, CloudConnector, CloudCredentials,
    CloudError, Collaborators, DeploymentHandle, NodeDrainer, ScaleDriver, ScaleSet,
    ScaleSettings, SecretResolver, VirtualMachine,
};
use stratus_state::StateStore;
use stratus_template::{ArtifactFormat, DeploymentParameters, DeploymentTemplate, RenderedArtifacts};
use tempfile::TempDir;

use crate::cluster::{ClusterResource, ProviderServices};
use crate::collaborators::{ClusterUpgrader, ResourceGroups};
use crate::spec::ClusterSpec;

pub fn spec() -> ClusterSpec {
    serde_json::from_value(serde_json::json!({
        "name": "prod",
        "resource_group": "prod-rg",
        "location": "West US 2",
        "kubernetes_version": "1.10.3",
        "linux_profile": { "admin_username": "azureuser", "ssh_key_data": "ssh-rsa AAAA" },
        "service_principal": { "client_id": "app-id", "client_secret": "hunter2" },
        "master_profile": { "dns_name_prefix": "prodk8s" },
        "agent_pool_profiles": [
            { "name": "linuxpool", "count": 3 },
            { "name": "scalepool", "availability_profile": "VirtualMachineScaleSets" }
        ],
        "tags": { "env": "prod" }
    }))
    .unwrap()
}

pub struct Harness {
    pub resource: ClusterResource,
    pub store: StateStore,
    pub cloud: Arc<FakeCloud>,
    pub connector: Arc<FakeConnector>,
    pub groups: Arc<FakeGroups>,
    pub upgrader: Arc<FakeUpgrader>,
    pub root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let cloud = Arc::new(FakeCloud::default());
        let connector = Arc::new(FakeConnector {
            cloud: cloud.clone(),
            credentials: Mutex::new(Vec::new()),
        });
        let groups = Arc::new(FakeGroups::default());
        let upgrader = Arc::new(FakeUpgrader::default());
        let generator = Arc::new(FakeGenerator);
        let root = tempfile::tempdir().unwrap();

        let scaler = ScaleDriver::new(
            store.clone(),
            Collaborators::new(
                Arc::new(NoSecrets),
                connector.clone(),
                generator.clone(),
                Arc::new(NoopDrainer),
            ),
            ScaleSettings::default(),
        );
        let services = ProviderServices {
            connector: connector.clone(),
            generator,
            resource_groups: groups.clone(),
            upgrader: upgrader.clone(),
        };
        let resource =
            ClusterResource::new(store.clone(), "sub-1", root.path(), services, scaler);

        Self {
            resource,
            store,
            cloud,
            connector,
            groups,
            upgrader,
            root,
        }
    }

    /// Register `count` running VMs for `pool` of the stored cluster `id`.
    pub fn add_pool_vms(&self, pool: &str, id: &str, count: u32) {
        let record = self.store.get_cluster(id).unwrap().unwrap();
        let cluster_id = ClusterModel::from_json(&record.api_model)
            .unwrap()
            .cluster_id();
        let mut vms = self.cloud.vms.lock().unwrap();
        for i in 0..count {
            let mut tags = BTreeMap::new();
            tags.insert("poolName".to_string(), pool.to_string());
            tags.insert("resourceNameSuffix".to_string(), cluster_id.clone());
            vms.push(VirtualMachine {
                name: format!("k8s-{pool}-{cluster_id}-{i}"),
                tags,
                image_publisher: None,
            });
        }
    }
}

// ── Cloud ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCloud {
    pub vms: Mutex<Vec<VirtualMachine>>,
    fail_deploy: Mutex<bool>,
    deleted: Mutex<Vec<String>>,
    deployments: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn fail_deploy(&self) {
        *self.fail_deploy.lock().unwrap() = true;
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn deployments(&self) -> Vec<String> {
        self.deployments.lock().unwrap().clone()
    }
}

impl CloudClient for FakeCloud {
    fn list_virtual_machines<'a>(
        &'a self,
        _resource_group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<VirtualMachine>, CloudError>> {
        Box::pin(async move { Ok(self.vms.lock().unwrap().clone()) })
    }

    fn list_scale_sets<'a>(
        &'a self,
        _resource_group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ScaleSet>, CloudError>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn delete_virtual_machine<'a>(
        &'a self,
        _subscription_id: &'a str,
        _resource_group: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(async move {
            self.vms.lock().unwrap().retain(|vm| vm.name != name);
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    fn deploy_template<'a>(
        &'a self,
        _resource_group: &'a str,
        deployment_name: &'a str,
        _template: &'a DeploymentTemplate,
        _parameters: &'a DeploymentParameters,
    ) -> BoxFuture<'a, Result<DeploymentHandle, CloudError>> {
        Box::pin(async move {
            if *self.fail_deploy.lock().unwrap() {
                return Err(CloudError::Request("quota exceeded".to_string()));
            }
            self.deployments
                .lock()
                .unwrap()
                .push(deployment_name.to_string());
            Ok(DeploymentHandle {
                name: deployment_name.to_string(),
                provisioning_state: "Succeeded".to_string(),
            })
        })
    }
}

pub struct FakeConnector {
    cloud: Arc<FakeCloud>,
    credentials: Mutex<Vec<CloudCredentials>>,
}

impl FakeConnector {
    pub fn credentials(&self) -> Vec<CloudCredentials> {
        self.credentials.lock().unwrap().clone()
    }
}

impl CloudConnector for FakeConnector {
    fn connect<'a>(
        &'a self,
        credentials: &'a CloudCredentials,
    ) -> BoxFuture<'a, Result<Arc<dyn CloudClient>, CloudError>> {
        Box::pin(async move {
            self.credentials.lock().unwrap().push(credentials.clone());
            let client: Arc<dyn CloudClient> = self.cloud.clone();
            Ok(client)
        })
    }
}

// ── Resource groups and upgrades ──────────────────────────────────

#[derive(Default)]
pub struct FakeGroups {
    created: Mutex<Vec<String>>,
    tagged: Mutex<Vec<String>>,
    delete_result: Mutex<Option<CloudError>>,
}

impl FakeGroups {
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn tagged(&self) -> Vec<String> {
        self.tagged.lock().unwrap().clone()
    }

    pub fn set_delete_result(&self, result: Result<(), CloudError>) {
        *self.delete_result.lock().unwrap() = result.err();
    }
}

impl ResourceGroups for FakeGroups {
    fn create<'a>(
        &'a self,
        name: &'a str,
        _location: &'a str,
        _tags: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(async move {
            self.created.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, _name: &'a str) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(async move {
            match self.delete_result.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn update_tags<'a>(
        &'a self,
        name: &'a str,
        _tags: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(async move {
            self.tagged.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct FakeUpgrader {
    versions: Mutex<Vec<String>>,
}

impl FakeUpgrader {
    pub fn versions(&self) -> Vec<String> {
        self.versions.lock().unwrap().clone()
    }
}

impl ClusterUpgrader for FakeUpgrader {
    fn upgrade<'a>(
        &'a self,
        model: &'a ClusterModel,
        _resource_group: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, Result<ClusterModel, BoxError>> {
        Box::pin(async move {
            self.versions.lock().unwrap().push(version.to_string());
            let mut upgraded = model.clone();
            upgraded.properties.orchestrator_profile.orchestrator_version = version.to_string();
            Ok(upgraded)
        })
    }
}

// ── Generation, secrets and draining ──────────────────────────────

pub struct FakeGenerator;

impl ArtifactGenerator for FakeGenerator {
    fn generate(
        &self,
        model: &ClusterModel,
        _format: ArtifactFormat,
    ) -> Result<RenderedArtifacts, BoxError> {
        let parameters: BTreeMap<String, serde_json::Value> = model
            .properties
            .agent_pool_profiles
            .iter()
            .map(|p| (format!("{}Count", p.name), serde_json::json!({ "value": p.count })))
            .collect();
        let template = serde_json::json!({
            "parameters": {},
            "variables": {},
            "resources": [
                { "type": "Microsoft.Compute/availabilitySets", "name": "as" },
                { "type": "Microsoft.Compute/virtualMachines", "name": "agent" }
            ]
        });
        Ok(RenderedArtifacts {
            template: template.to_string(),
            parameters: serde_json::json!({ "parameters": parameters }).to_string(),
        })
    }
}

pub struct NoSecrets;

impl SecretResolver for NoSecrets {
    fn resolve<'a>(
        &'a self,
        reference: &'a KeyvaultSecretRef,
    ) -> BoxFuture<'a, Result<String, BoxError>> {
        Box::pin(async move { Err(format!("no vault for {}", reference.secret_name).into()) })
    }
}

pub struct NoopDrainer;

impl NodeDrainer for NoopDrainer {
    fn drain<'a>(
        &'a self,
        _kubeconfig: &'a KubeConfig,
        _nodes: &'a [String],
        _grace_period: Duration,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move { Ok(()) })
    }
}
