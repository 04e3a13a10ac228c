//! Scale-down of indexed pools: drain the highest-indexed nodes, then
//! delete their VMs.
//!
//! Draining is one blocking call for the whole batch and must succeed
//! before anything is deleted. Deletions run concurrently, bounded by
//! `max_parallel_deletions`, and every deletion is awaited; failures are
//! reported together in input order.

use std::collections::HashMap;
use std::sync::Arc;

use stratus_core::KubeConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::calculator::select_vms_for_removal;
use crate::collaborators::{CloudClient, CloudError, NodeDrainer};
use crate::context::{ScaleContext, ScaleSettings};
use crate::error::{InstanceFailure, PartialDeletionError, ScaleError, ScaleResult};

/// Drain and delete the instances above the desired count.
///
/// Returns the removed instance names, highest index first.
pub async fn scale_down(
    ctx: &ScaleContext,
    drainer: &dyn NodeDrainer,
    settings: &ScaleSettings,
) -> ScaleResult<Vec<String>> {
    if ctx.model.master_fqdn().is_none() {
        return Err(ScaleError::Configuration(format!(
            "cluster {:?} has no master FQDN, nodes cannot be drained",
            ctx.model.name
        )));
    }
    let kubeconfig = KubeConfig::from_model(&ctx.model, ctx.resource_group())
        .map_err(|e| ScaleError::Configuration(e.to_string()))?;

    let victims = select_vms_for_removal(
        &ctx.inventory.vms,
        ctx.current_count(),
        ctx.desired_count,
    );
    if victims.is_empty() {
        return Ok(victims);
    }

    info!(pool = %ctx.pool_name, nodes = ?victims, "draining nodes");
    drainer
        .drain(&kubeconfig, &victims, settings.drain_grace_period)
        .await
        .map_err(|source| ScaleError::Drain {
            nodes: victims.clone(),
            source,
        })?;

    info!(pool = %ctx.pool_name, count = victims.len(), "deleting drained instances");
    delete_instances(
        Arc::clone(&ctx.client),
        ctx.subscription_id(),
        ctx.resource_group(),
        &victims,
        settings.max_parallel_deletions,
    )
    .await?;

    Ok(victims)
}

/// Delete every instance in `instances`, at most `max_parallel` at a time.
pub async fn delete_instances(
    client: Arc<dyn CloudClient>,
    subscription_id: &str,
    resource_group: &str,
    instances: &[String],
    max_parallel: usize,
) -> Result<(), PartialDeletionError> {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut set = JoinSet::new();
    let mut positions = HashMap::new();

    for (position, name) in instances.iter().enumerate() {
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let subscription_id = subscription_id.to_string();
        let resource_group = resource_group.to_string();
        let name = name.clone();

        let handle = set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| CloudError::Request(e.to_string()))?;
            debug!(instance = %name, "deleting instance");
            client
                .delete_virtual_machine(&subscription_id, &resource_group, &name)
                .await
        });
        positions.insert(handle.id(), position);
    }

    let mut failures = Vec::new();
    while let Some(joined) = set.join_next_with_id().await {
        let (id, cause) = match joined {
            Ok((_, Ok(()))) => continue,
            Ok((id, Err(err))) => (id, err.to_string()),
            Err(join_err) => (join_err.id(), join_err.to_string()),
        };
        let Some(&position) = positions.get(&id) else {
            continue;
        };
        let instance = instances[position].clone();
        warn!(%instance, %cause, "instance deletion failed");
        failures.push((position, InstanceFailure { instance, cause }));
    }

    if failures.is_empty() {
        return Ok(());
    }
    failures.sort_by_key(|(position, _)| *position);
    Err(PartialDeletionError {
        failures: failures.into_iter().map(|(_, failure)| failure).collect(),
        attempted: instances.len(),
    })
}
