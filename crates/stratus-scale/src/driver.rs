//! Scale driver — coordinates one agent pool scale operation.
//!
//! Phases: `Start → LoadModel → ResolveSecret → ClassifyTopology →
//! {ScaleDown | ScaleUp} → PersistModel → Done`. A no-op request goes
//! from `ClassifyTopology` straight to `Done`; any error ends in `Failed`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use stratus_core::{ClusterModel, ResourceId};
use stratus_state::StateStore;
use stratus_template::{TemplateNormalizer, VmasScaleUpNormalizer};
use tracing::{debug, info, warn};

use crate::calculator::{ScaleAction, decide, select_vms_for_removal};
use crate::collaborators::{
    ArtifactGenerator, CloudConnector, CloudCredentials, NodeDrainer, SecretResolver,
};
use crate::context::{ScaleContext, ScaleSettings};
use crate::error::{ScaleError, ScaleResult};
use crate::persist::{load_cluster_model, persist_cluster_model};
use crate::scale_down::scale_down;
use crate::scale_up::{deployment_name, scale_up};
use crate::topology::{classify, discover_inventory};

/// A request to bring one agent pool to `desired_count` instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleRequest {
    /// Cluster resource id, also the state store key.
    pub cluster_id: String,
    pub agent_pool_index: usize,
    pub desired_count: u32,
    /// Receives `apimodel.json`. Defaults to the directory stored with the cluster.
    pub deployment_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleOutcome {
    NoOp {
        pool: String,
        count: u32,
    },
    ScaledDown {
        pool: String,
        from: u32,
        to: u32,
        removed: Vec<String>,
    },
    ScaledUp {
        pool: String,
        from: u32,
        to: u32,
        deployment: String,
    },
}

/// Phase reached by a scale operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalePhase {
    Start,
    LoadModel,
    ResolveSecret,
    ClassifyTopology,
    ScaleDown,
    ScaleUp,
    PersistModel,
    Done,
    Failed {
        during: Box<ScalePhase>,
        reason: String,
    },
}

/// One scale operation in progress.
#[derive(Debug, Clone)]
pub struct ScaleOperation {
    pub request: ScaleRequest,
    pub phase: ScalePhase,
    started_at: Instant,
}

impl ScaleOperation {
    pub fn new(request: ScaleRequest) -> Self {
        Self {
            request,
            phase: ScalePhase::Start,
            started_at: Instant::now(),
        }
    }

    fn advance(&mut self, next: ScalePhase) {
        debug!(
            cluster = %self.request.cluster_id,
            from = ?self.phase,
            to = ?next,
            "scale phase"
        );
        self.phase = next;
    }

    fn fail(&mut self, err: &ScaleError) {
        warn!(
            cluster = %self.request.cluster_id,
            pool_index = self.request.agent_pool_index,
            phase = ?self.phase,
            error = %err,
            "scale operation failed"
        );
        let during = std::mem::replace(&mut self.phase, ScalePhase::Start);
        self.phase = ScalePhase::Failed {
            during: Box::new(during),
            reason: err.to_string(),
        };
    }
}

/// Injected collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub secrets: Arc<dyn SecretResolver>,
    pub connector: Arc<dyn CloudConnector>,
    pub generator: Arc<dyn ArtifactGenerator>,
    pub normalizer: Arc<dyn TemplateNormalizer>,
    pub drainer: Arc<dyn NodeDrainer>,
}

impl Collaborators {
    /// Collaborators using the availability-set scale-up normalizer.
    pub fn new(
        secrets: Arc<dyn SecretResolver>,
        connector: Arc<dyn CloudConnector>,
        generator: Arc<dyn ArtifactGenerator>,
        drainer: Arc<dyn NodeDrainer>,
    ) -> Self {
        Self {
            secrets,
            connector,
            generator,
            normalizer: Arc::new(VmasScaleUpNormalizer),
            drainer,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn TemplateNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }
}

/// Entry point for agent pool scaling.
///
/// Callers serialize operations per cluster; concurrent writers are
/// caught by the revision check when the model is persisted.
pub struct ScaleDriver {
    store: StateStore,
    collaborators: Collaborators,
    settings: ScaleSettings,
}

impl ScaleDriver {
    pub fn new(store: StateStore, collaborators: Collaborators, settings: ScaleSettings) -> Self {
        Self {
            store,
            collaborators,
            settings,
        }
    }

    pub fn settings(&self) -> &ScaleSettings {
        &self.settings
    }

    pub async fn scale_agent_pool(&self, request: &ScaleRequest) -> ScaleResult<ScaleOutcome> {
        let mut operation = ScaleOperation::new(request.clone());
        self.run(&mut operation).await
    }

    /// Run `operation`, leaving it in `Done` or `Failed`.
    pub async fn run(&self, operation: &mut ScaleOperation) -> ScaleResult<ScaleOutcome> {
        let result = self.execute(operation).await;
        match &result {
            Ok(outcome) => {
                operation.advance(ScalePhase::Done);
                info!(
                    cluster = %operation.request.cluster_id,
                    outcome = ?outcome,
                    elapsed_ms = operation.started_at.elapsed().as_millis() as u64,
                    "scale operation complete"
                );
            }
            Err(err) => operation.fail(err),
        }
        result
    }

    async fn execute(&self, operation: &mut ScaleOperation) -> ScaleResult<ScaleOutcome> {
        let request = operation.request.clone();

        operation.advance(ScalePhase::LoadModel);
        let cluster = ResourceId::parse(&request.cluster_id)?;
        let (model, record) = load_cluster_model(&self.store, &request.cluster_id)?;
        let pool = model.agent_pool(request.agent_pool_index)?.clone();

        operation.advance(ScalePhase::ResolveSecret);
        let credentials = self.credentials(&cluster, &model).await?;
        let client = self
            .collaborators
            .connector
            .connect(&credentials)
            .await
            .map_err(ScaleError::Client)?;

        operation.advance(ScalePhase::ClassifyTopology);
        let topology = classify(&pool);
        let inventory = discover_inventory(
            client.as_ref(),
            &cluster.resource_group,
            &model.cluster_id(),
            &pool,
            topology,
        )
        .await
        .map_err(|source| ScaleError::Inventory {
            pool: pool.name.clone(),
            source,
        })?;

        let ctx = ScaleContext {
            cluster,
            model,
            revision: record.revision,
            pool_index: request.agent_pool_index,
            pool_name: pool.name.clone(),
            topology,
            inventory,
            desired_count: request.desired_count,
            client,
        };
        let current = ctx.current_count();
        let action = decide(topology, current, request.desired_count);
        info!(
            cluster = %request.cluster_id,
            pool = %pool.name,
            ?topology,
            current,
            desired = request.desired_count,
            ?action,
            "scale decision"
        );

        let mut partial = None;
        let outcome = match action {
            ScaleAction::NoOp => {
                return Ok(ScaleOutcome::NoOp {
                    pool: pool.name,
                    count: current,
                });
            }
            ScaleAction::ScaleDown => {
                operation.advance(ScalePhase::ScaleDown);
                let removed = match scale_down(
                    &ctx,
                    self.collaborators.drainer.as_ref(),
                    &self.settings,
                )
                .await
                {
                    Ok(removed) => removed,
                    Err(ScaleError::PartialDeletion(err)) => {
                        let failed = err.failed_instances();
                        let removed = deleted_instances(&ctx, &failed);
                        partial = Some(err);
                        removed
                    }
                    Err(err) => return Err(err),
                };
                ScaleOutcome::ScaledDown {
                    pool: pool.name.clone(),
                    from: current,
                    to: request.desired_count,
                    removed,
                }
            }
            ScaleAction::ScaleUp => {
                operation.advance(ScalePhase::ScaleUp);
                let deployment = deployment_name(&ctx.model.name, &pool.name, epoch_secs());
                scale_up(
                    &ctx,
                    self.collaborators.generator.as_ref(),
                    self.collaborators.normalizer.as_ref(),
                    &deployment,
                )
                .await?;
                ScaleOutcome::ScaledUp {
                    pool: pool.name.clone(),
                    from: current,
                    to: request.desired_count,
                    deployment,
                }
            }
        };

        operation.advance(ScalePhase::PersistModel);
        let mut updated = ctx.model;
        updated.agent_pool_mut(request.agent_pool_index)?.count = request.desired_count;
        persist_cluster_model(
            &self.store,
            &request.cluster_id,
            ctx.revision,
            &updated,
            request.deployment_dir.as_deref(),
        )?;

        match partial {
            Some(err) => Err(err.into()),
            None => Ok(outcome),
        }
    }

    async fn credentials(
        &self,
        cluster: &ResourceId,
        model: &ClusterModel,
    ) -> ScaleResult<CloudCredentials> {
        let principal = model
            .properties
            .service_principal_profile
            .as_ref()
            .ok_or_else(|| {
                ScaleError::Configuration("api model has no service principal profile".to_string())
            })?;

        let client_secret = match (&principal.keyvault_secret_ref, &principal.secret) {
            (Some(reference), _) => self
                .collaborators
                .secrets
                .resolve(reference)
                .await
                .map_err(|source| ScaleError::SecretAccess {
                    secret: reference.secret_name.clone(),
                    source,
                })?,
            (None, Some(secret)) if !secret.is_empty() => secret.clone(),
            _ => {
                return Err(ScaleError::Configuration(
                    "service principal has neither a secret nor a key vault reference"
                        .to_string(),
                ));
            }
        };

        Ok(CloudCredentials {
            subscription_id: cluster.subscription_id.clone(),
            client_id: principal.client_id.clone(),
            client_secret,
        })
    }
}

/// Instances selected for removal that were actually deleted.
fn deleted_instances(ctx: &ScaleContext, failed: &[&str]) -> Vec<String> {
    select_vms_for_removal(
        &ctx.inventory.vms,
        ctx.current_count(),
        ctx.desired_count,
    )
    .into_iter()
    .filter(|name| !failed.contains(&name.as_str()))
    .collect()
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use stratus_core::KubeConfig;
    use stratus_state::{ClusterRecord, StateError};

    use crate::collaborators::{BoxError, BoxFuture, VirtualMachine};
    use crate::testing::{
        FakeCloud, FakeConnector, FakeDrainer, FakeGenerator, FakeSecrets, model, vm_names,
    };

    const ID: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Resources/deployments/prod";

    struct Harness {
        cloud: Arc<FakeCloud>,
        drainer: Arc<FakeDrainer>,
        generator: Arc<FakeGenerator>,
        store: StateStore,
        driver: ScaleDriver,
    }

    fn harness(model: ClusterModel, live_vms: u32) -> Harness {
        let cloud = Arc::new(FakeCloud::default());
        let suffix = model.cluster_id();
        *cloud.vms.lock().unwrap() = vm_names("agentpool1", live_vms)
            .into_iter()
            .map(|name| VirtualMachine {
                name,
                tags: BTreeMap::from([
                    ("poolName".to_string(), "agentpool1".to_string()),
                    ("resourceNameSuffix".to_string(), suffix.clone()),
                ]),
                image_publisher: None,
            })
            .collect();

        let store = StateStore::open_in_memory().unwrap();
        store
            .put_cluster(&ClusterRecord::new(ID, model.to_json_pretty().unwrap(), None, 0))
            .unwrap();

        let drainer = Arc::new(FakeDrainer::default());
        let generator = Arc::new(FakeGenerator::default());
        let driver = ScaleDriver::new(
            store.clone(),
            collaborators(&cloud, generator.clone(), drainer.clone()),
            ScaleSettings::default(),
        );
        Harness {
            cloud,
            drainer,
            generator,
            store,
            driver,
        }
    }

    fn collaborators(
        cloud: &Arc<FakeCloud>,
        generator: Arc<FakeGenerator>,
        drainer: Arc<dyn NodeDrainer>,
    ) -> Collaborators {
        Collaborators::new(
            Arc::new(FakeSecrets::default()),
            Arc::new(FakeConnector::new(cloud.clone())),
            generator,
            drainer,
        )
    }

    fn request(desired: u32) -> ScaleRequest {
        ScaleRequest {
            cluster_id: ID.to_string(),
            agent_pool_index: 0,
            desired_count: desired,
            deployment_dir: None,
        }
    }

    fn stored_count(store: &StateStore) -> u32 {
        let record = store.get_cluster(ID).unwrap().unwrap();
        ClusterModel::from_json(&record.api_model)
            .unwrap()
            .agent_pool(0)
            .unwrap()
            .count
    }

    /// Drainer that rewrites the stored record while the nodes drain.
    struct InterferingDrainer {
        store: StateStore,
    }

    impl NodeDrainer for InterferingDrainer {
        fn drain<'a>(
            &'a self,
            _kubeconfig: &'a KubeConfig,
            _nodes: &'a [String],
            _grace_period: Duration,
        ) -> BoxFuture<'a, Result<(), BoxError>> {
            Box::pin(async move {
                let record = self.store.get_cluster(ID)?.ok_or("missing record")?;
                self.store
                    .replace_cluster_if_revision(ID, record.revision, record.api_model)?;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn equal_counts_are_a_noop() {
        let h = harness(model(), 5);
        let mut operation = ScaleOperation::new(request(5));

        let outcome = h.driver.run(&mut operation).await.unwrap();

        assert_eq!(
            outcome,
            ScaleOutcome::NoOp {
                pool: "agentpool1".to_string(),
                count: 5
            }
        );
        assert_eq!(operation.phase, ScalePhase::Done);
        assert!(h.drainer.calls().is_empty());
        assert!(h.cloud.deleted().is_empty());
        assert!(h.cloud.deployments().is_empty());
        assert!(h.generator.formats.lock().unwrap().is_empty());
        assert_eq!(h.store.get_cluster(ID).unwrap().unwrap().revision, 1);
    }

    #[tokio::test]
    async fn shrink_drains_deletes_and_persists() {
        let h = harness(model(), 5);

        let outcome = h.driver.scale_agent_pool(&request(3)).await.unwrap();

        let names = vm_names("agentpool1", 5);
        assert_eq!(
            outcome,
            ScaleOutcome::ScaledDown {
                pool: "agentpool1".to_string(),
                from: 5,
                to: 3,
                removed: vec![names[4].clone(), names[3].clone()],
            }
        );
        assert_eq!(h.drainer.calls().len(), 1);
        assert_eq!(stored_count(&h.store), 3);
        assert!(h.cloud.deployments().is_empty());
    }

    #[tokio::test]
    async fn partial_deletion_still_persists() {
        let h = harness(model(), 5);
        let names = vm_names("agentpool1", 5);
        h.cloud.fail_delete(&names[3]);

        let err = h.driver.scale_agent_pool(&request(2)).await.unwrap_err();

        let ScaleError::PartialDeletion(partial) = &err else {
            panic!("expected partial deletion, got {err:?}");
        };
        assert_eq!(partial.failed_instances(), vec![names[3].as_str()]);
        assert!(err.model_persisted());
        assert_eq!(stored_count(&h.store), 2);
    }

    #[tokio::test]
    async fn drain_failure_leaves_model_untouched() {
        let h = harness(model(), 5);
        let driver = ScaleDriver::new(
            h.store.clone(),
            collaborators(&h.cloud, h.generator.clone(), Arc::new(FakeDrainer::failing())),
            ScaleSettings::default(),
        );
        let mut operation = ScaleOperation::new(request(3));

        let err = driver.run(&mut operation).await.unwrap_err();

        assert!(matches!(err, ScaleError::Drain { .. }));
        assert!(h.cloud.deleted().is_empty());
        assert_eq!(stored_count(&h.store), 5);
        assert!(matches!(
            operation.phase,
            ScalePhase::Failed { ref during, .. } if **during == ScalePhase::ScaleDown
        ));
    }

    #[tokio::test]
    async fn grow_deploys_and_persists() {
        let h = harness(model(), 3);

        let outcome = h.driver.scale_agent_pool(&request(4)).await.unwrap();

        let ScaleOutcome::ScaledUp { deployment, .. } = outcome else {
            panic!("expected scale-up");
        };
        assert!(deployment.starts_with("prod-scale-agentpool1-"));
        let (_, _, parameters) = &h.cloud.deployments()[0];
        assert_eq!(parameters.value("agentpool1Count"), Some(&serde_json::json!(4)));
        assert_eq!(parameters.value("agentpool1Offset"), Some(&serde_json::json!(3)));
        assert_eq!(stored_count(&h.store), 4);
    }

    #[tokio::test]
    async fn concurrent_write_is_a_conflict() {
        let h = harness(model(), 5);
        let driver = ScaleDriver::new(
            h.store.clone(),
            collaborators(
                &h.cloud,
                h.generator.clone(),
                Arc::new(InterferingDrainer {
                    store: h.store.clone(),
                }),
            ),
            ScaleSettings::default(),
        );

        let err = driver.scale_agent_pool(&request(3)).await.unwrap_err();

        let ScaleError::Persist(persist) = &err else {
            panic!("expected persist error, got {err:?}");
        };
        assert!(persist.is_conflict());
        assert_eq!(stored_count(&h.store), 5);
    }

    #[tokio::test]
    async fn missing_secret_source_is_a_configuration_error() {
        let mut model = model();
        model.properties.service_principal_profile = None;
        let h = harness(model, 3);

        let err = h.driver.scale_agent_pool(&request(4)).await.unwrap_err();
        assert!(matches!(err, ScaleError::Configuration(_)));
        assert!(h.cloud.deployments().is_empty());
    }

    #[tokio::test]
    async fn unknown_cluster_fails_in_load() {
        let h = harness(model(), 3);
        let mut req = request(4);
        req.cluster_id =
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Resources/deployments/other"
                .to_string();
        let mut operation = ScaleOperation::new(req);

        let err = h.driver.run(&mut operation).await.unwrap_err();
        assert!(matches!(err, ScaleError::State(StateError::NotFound(_))));
        assert!(matches!(
            operation.phase,
            ScalePhase::Failed { ref during, .. } if **during == ScalePhase::LoadModel
        ));
    }
}
