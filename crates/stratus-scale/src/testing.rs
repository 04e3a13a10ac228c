//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stratus_core::{ClusterModel, KubeConfig, ResourceId};
use stratus_template::{
    ArtifactFormat, DeploymentParameters, DeploymentTemplate, RenderedArtifacts,
};

use stratus_core::KeyvaultSecretRef;

use crate::collaborators::{
    ArtifactGenerator, BoxError, BoxFuture, CloudClient, CloudConnector, CloudCredentials,
    CloudError, DeploymentHandle, NodeDrainer, ScaleSet, SecretResolver, VirtualMachine,
};
use crate::context::ScaleContext;
use crate::topology::{PoolInventory, PoolTopology};

pub const CLUSTER_ID: &str = "12345678";

pub fn vm_names(pool: &str, count: u32) -> Vec<String> {
    (0..count)
        .map(|i| format!("k8s-{pool}-{CLUSTER_ID}-{i}"))
        .collect()
}

pub fn model() -> ClusterModel {
    ClusterModel::from_json(
        r#"{
            "apiVersion": "vlabs",
            "name": "prod",
            "location": "westus2",
            "properties": {
                "orchestratorProfile": { "orchestratorType": "Kubernetes", "orchestratorVersion": "1.10.3" },
                "masterProfile": { "count": 1, "dnsPrefix": "prod", "fqdn": "prod.westus2.cloudapp.azure.com" },
                "agentPoolProfiles": [
                    { "name": "agentpool1", "count": 5, "availabilityProfile": "AvailabilitySet" },
                    { "name": "agentpool2", "count": 2, "availabilityProfile": "VirtualMachineScaleSets" }
                ],
                "servicePrincipalProfile": { "clientId": "client", "secret": "s3cret" },
                "certificateProfile": { "caCertificate": "ca" }
            }
        }"#,
    )
    .unwrap()
}

/// Context for shrinking or growing `agentpool1` from `current` to `desired`.
pub fn context_for(cloud: Arc<FakeCloud>, current: u32, desired: u32) -> ScaleContext {
    ScaleContext {
        cluster: ResourceId::deployment("sub", "rg", "prod"),
        model: model(),
        revision: 1,
        pool_index: 0,
        pool_name: "agentpool1".to_string(),
        topology: PoolTopology::Indexed,
        inventory: PoolInventory {
            vms: vm_names("agentpool1", current),
            current_count: current,
            highest_used_index: current.saturating_sub(1),
            windows_index: None,
        },
        desired_count: desired,
        client: cloud,
    }
}

// ── Cloud ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCloud {
    pub vms: Mutex<Vec<VirtualMachine>>,
    pub scale_sets: Mutex<Vec<ScaleSet>>,
    failing_deletes: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    deployments: Mutex<Vec<(String, DeploymentTemplate, DeploymentParameters)>>,
}

impl FakeCloud {
    pub fn fail_delete(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn deployments(&self) -> Vec<(String, DeploymentTemplate, DeploymentParameters)> {
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
        Box::pin(async move { Ok(self.scale_sets.lock().unwrap().clone()) })
    }

    fn delete_virtual_machine<'a>(
        &'a self,
        _subscription_id: &'a str,
        _resource_group: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(async move {
            if self.failing_deletes.lock().unwrap().contains(name) {
                return Err(CloudError::Request(format!("delete {name} rejected")));
            }
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    fn deploy_template<'a>(
        &'a self,
        _resource_group: &'a str,
        deployment_name: &'a str,
        template: &'a DeploymentTemplate,
        parameters: &'a DeploymentParameters,
    ) -> BoxFuture<'a, Result<DeploymentHandle, CloudError>> {
        Box::pin(async move {
            self.deployments.lock().unwrap().push((
                deployment_name.to_string(),
                template.clone(),
                parameters.clone(),
            ));
            Ok(DeploymentHandle {
                name: deployment_name.to_string(),
                provisioning_state: "Succeeded".to_string(),
            })
        })
    }
}

// ── Drainer ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDrainer {
    fail: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeDrainer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl NodeDrainer for FakeDrainer {
    fn drain<'a>(
        &'a self,
        _kubeconfig: &'a KubeConfig,
        nodes: &'a [String],
        _grace_period: Duration,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(nodes.to_vec());
            if self.fail {
                return Err("eviction blocked by pod disruption budget".into());
            }
            Ok(())
        })
    }
}

// ── Generator ─────────────────────────────────────────────────────

/// Renders a small availability-set template with one parameter per pool.
#[derive(Default)]
pub struct FakeGenerator {
    pub formats: Mutex<Vec<ArtifactFormat>>,
    pub pools_seen: Mutex<Vec<Vec<String>>>,
}

impl ArtifactGenerator for FakeGenerator {
    fn generate(
        &self,
        model: &ClusterModel,
        format: ArtifactFormat,
    ) -> Result<RenderedArtifacts, BoxError> {
        self.formats.lock().unwrap().push(format);
        let pools: Vec<String> = model
            .properties
            .agent_pool_profiles
            .iter()
            .map(|p| p.name.clone())
            .collect();
        self.pools_seen.lock().unwrap().push(pools);

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
                { "type": "Microsoft.Network/networkSecurityGroups", "name": "nsg" },
                { "type": "Microsoft.Compute/availabilitySets", "name": "as" },
                { "type": "Microsoft.Compute/virtualMachines", "name": "agent", "dependsOn": ["nsg"] }
            ]
        });
        Ok(RenderedArtifacts {
            template: template.to_string(),
            parameters: serde_json::json!({ "parameters": parameters }).to_string(),
        })
    }
}

// ── Secrets and connections ───────────────────────────────────────

#[derive(Default)]
pub struct FakeSecrets {
    pub resolved: Mutex<Vec<String>>,
}

impl SecretResolver for FakeSecrets {
    fn resolve<'a>(
        &'a self,
        reference: &'a KeyvaultSecretRef,
    ) -> BoxFuture<'a, Result<String, BoxError>> {
        Box::pin(async move {
            self.resolved
                .lock()
                .unwrap()
                .push(reference.secret_name.clone());
            if reference.secret_name == "missing" {
                return Err("secret not found".into());
            }
            Ok(format!("vault-{}", reference.secret_name))
        })
    }
}

pub struct FakeConnector {
    pub cloud: Arc<FakeCloud>,
    pub credentials: Mutex<Vec<CloudCredentials>>,
}

impl FakeConnector {
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self {
            cloud,
            credentials: Mutex::new(Vec::new()),
        }
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
