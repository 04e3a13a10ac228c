//! Offline scale planning against an inventory snapshot.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stratus_core::{ClusterModel, ResourceId, StratusConfig};
use stratus_scale::calculator::{decide, scale_up_injections, select_vms_for_removal};
use stratus_scale::topology::{classify, discover_inventory};
use stratus_scale::{
    BoxFuture, CloudClient, CloudError, DeploymentHandle, ScaleAction, ScaleSet, VirtualMachine,
};
use stratus_state::StateStore;

/// Compute listings captured from a resource group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub virtual_machines: Vec<VirtualMachine>,
    #[serde(default)]
    pub scale_sets: Vec<ScaleSet>,
}

/// Answers listings from a snapshot and refuses every mutation.
struct SnapshotClient(InventorySnapshot);

impl CloudClient for SnapshotClient {
    fn list_virtual_machines<'a>(
        &'a self,
        _resource_group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<VirtualMachine>, CloudError>> {
        Box::pin(async move { Ok(self.0.virtual_machines.clone()) })
    }

    fn list_scale_sets<'a>(
        &'a self,
        _resource_group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ScaleSet>, CloudError>> {
        Box::pin(async move { Ok(self.0.scale_sets.clone()) })
    }

    fn delete_virtual_machine<'a>(
        &'a self,
        _subscription_id: &'a str,
        _resource_group: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(async move { Err(CloudError::Request(format!("offline: cannot delete {name}"))) })
    }

    fn deploy_template<'a>(
        &'a self,
        _resource_group: &'a str,
        deployment_name: &'a str,
        _template: &'a stratus_template::DeploymentTemplate,
        _parameters: &'a stratus_template::DeploymentParameters,
    ) -> BoxFuture<'a, Result<DeploymentHandle, CloudError>> {
        Box::pin(async move {
            Err(CloudError::Request(format!(
                "offline: cannot deploy {deployment_name}"
            )))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScalePlan {
    NoOp {
        pool: String,
        count: u32,
    },
    ScaleDown {
        pool: String,
        from: u32,
        to: u32,
        /// Highest index first.
        remove: Vec<String>,
    },
    ScaleUp {
        pool: String,
        from: u32,
        to: u32,
        /// Template count after gap compensation.
        count: Option<u32>,
        offset: Option<u32>,
        windows_index: Option<u32>,
    },
}

pub async fn plan(
    config: &StratusConfig,
    id: &str,
    pool: usize,
    count: u32,
    inventory: &Path,
    format: &str,
) -> anyhow::Result<()> {
    let snapshot: InventorySnapshot = serde_json::from_str(
        &std::fs::read_to_string(inventory)
            .with_context(|| format!("reading {}", inventory.display()))?,
    )
    .with_context(|| format!("parsing {}", inventory.display()))?;
    let store = super::open_store(config)?;

    let plan = build_plan(&store, id, pool, count, snapshot).await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => println!("{}", format_plan(&plan)),
    }
    Ok(())
}

pub async fn build_plan(
    store: &StateStore,
    id: &str,
    pool_index: usize,
    desired: u32,
    snapshot: InventorySnapshot,
) -> anyhow::Result<ScalePlan> {
    let cluster = ResourceId::parse(id)?;
    let record = store
        .get_cluster(id)?
        .with_context(|| format!("cluster {id} is not managed"))?;
    let model = ClusterModel::from_json(&record.api_model)?;
    let pool = model.agent_pool(pool_index)?;

    let topology = classify(pool);
    let client = SnapshotClient(snapshot);
    let inventory = discover_inventory(
        &client,
        &cluster.resource_group,
        &model.cluster_id(),
        pool,
        topology,
    )
    .await?;

    let current = inventory.current_count;
    let name = pool.name.clone();
    Ok(match decide(topology, current, desired) {
        ScaleAction::NoOp => ScalePlan::NoOp {
            pool: name,
            count: current,
        },
        ScaleAction::ScaleDown => ScalePlan::ScaleDown {
            pool: name,
            from: current,
            to: desired,
            remove: select_vms_for_removal(&inventory.vms, current, desired),
        },
        ScaleAction::ScaleUp => {
            let injections = scale_up_injections(topology, &inventory, desired)?;
            ScalePlan::ScaleUp {
                pool: name,
                from: current,
                to: desired,
                count: injections.count,
                offset: injections.offset,
                windows_index: injections.windows_index,
            }
        }
    })
}

fn format_plan(plan: &ScalePlan) -> String {
    match plan {
        ScalePlan::NoOp { pool, count } => {
            format!("{pool}: already at {count}, nothing to do")
        }
        ScalePlan::ScaleDown {
            pool,
            from,
            to,
            remove,
        } => {
            let mut out = format!("{pool}: scale down {from} -> {to}, drain and delete:");
            for vm in remove {
                out.push_str(&format!("\n  - {vm}"));
            }
            out
        }
        ScalePlan::ScaleUp {
            pool,
            from,
            to,
            count,
            offset,
            windows_index,
        } => {
            let mut out = format!("{pool}: scale up {from} -> {to} by deployment");
            if let Some(count) = count {
                out.push_str(&format!("\n  count:  {count}"));
            }
            if let Some(offset) = offset {
                out.push_str(&format!("\n  offset: {offset}"));
            }
            if let Some(index) = windows_index {
                out.push_str(&format!("\n  index:  {index}"));
            }
            out
        }
    }
}
