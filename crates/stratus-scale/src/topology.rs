//! Pool topology classification and live inventory discovery.

use std::collections::BTreeMap;

use stratus_core::AgentPoolProfile;
use tracing::debug;

use crate::collaborators::{CloudClient, is_windows_publisher};
use crate::error::InventoryError;
use crate::names::{parse_linux_vm_name, parse_windows_scale_set_name, parse_windows_vm_name};

const POOL_NAME_TAG: &str = "poolName";
const NAME_SUFFIX_TAG: &str = "resourceNameSuffix";

/// How a pool's instances are provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolTopology {
    /// Availability set: individually named VMs with fixed indices.
    Indexed,
    /// Virtual machine scale set: interchangeable instances.
    Uniform,
}

impl PoolTopology {
    pub fn is_indexed(self) -> bool {
        matches!(self, PoolTopology::Indexed)
    }
}

pub fn classify(pool: &AgentPoolProfile) -> PoolTopology {
    if pool.is_availability_set() {
        PoolTopology::Indexed
    } else {
        PoolTopology::Uniform
    }
}

/// Live state of one agent pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolInventory {
    /// Instance names in ascending index order. Empty for uniform pools.
    pub vms: Vec<String>,
    pub current_count: u32,
    /// Highest index in use. Always 0 for uniform pools.
    pub highest_used_index: u32,
    pub windows_index: Option<u32>,
}

/// Read the pool's live inventory from the compute API.
pub async fn discover_inventory(
    client: &dyn CloudClient,
    resource_group: &str,
    cluster_id: &str,
    pool: &AgentPoolProfile,
    topology: PoolTopology,
) -> Result<PoolInventory, InventoryError> {
    let inventory = match topology {
        PoolTopology::Indexed => {
            discover_indexed(client, resource_group, cluster_id, &pool.name).await?
        }
        PoolTopology::Uniform => {
            discover_uniform(client, resource_group, cluster_id, &pool.name).await?
        }
    };
    debug!(
        pool = %pool.name,
        current = inventory.current_count,
        highest_index = inventory.highest_used_index,
        windows_index = ?inventory.windows_index,
        "pool inventory"
    );
    Ok(inventory)
}

async fn discover_indexed(
    client: &dyn CloudClient,
    resource_group: &str,
    cluster_id: &str,
    pool: &str,
) -> Result<PoolInventory, InventoryError> {
    let mut indexed = Vec::new();
    let mut windows_index = None;

    for vm in client.list_virtual_machines(resource_group).await? {
        if !belongs_to_pool(&vm.tags, pool, cluster_id) {
            continue;
        }
        let index = if is_windows_publisher(vm.image_publisher.as_deref()) {
            let parsed = parse_windows_vm_name(&vm.name)?;
            windows_index = Some(parsed.pool_index);
            parsed.index
        } else {
            parse_linux_vm_name(&vm.name)?.index
        };
        indexed.push((index, vm.name));
    }

    indexed.sort_by_key(|(index, _)| *index);
    let highest_used_index = indexed.last().map(|(index, _)| *index).unwrap_or(0);

    Ok(PoolInventory {
        current_count: indexed.len() as u32,
        highest_used_index,
        windows_index,
        vms: indexed.into_iter().map(|(_, name)| name).collect(),
    })
}

async fn discover_uniform(
    client: &dyn CloudClient,
    resource_group: &str,
    cluster_id: &str,
    pool: &str,
) -> Result<PoolInventory, InventoryError> {
    let sets = client.list_scale_sets(resource_group).await?;
    let Some(set) = sets
        .into_iter()
        .find(|set| belongs_to_pool(&set.tags, pool, cluster_id))
    else {
        return Ok(PoolInventory::default());
    };

    let windows_index = if is_windows_publisher(set.image_publisher.as_deref()) {
        Some(parse_windows_scale_set_name(&set.name)?)
    } else {
        None
    };

    Ok(PoolInventory {
        vms: Vec::new(),
        current_count: set.capacity,
        highest_used_index: 0,
        windows_index,
    })
}

fn belongs_to_pool(tags: &BTreeMap<String, String>, pool: &str, cluster_id: &str) -> bool {
    let pool_matches = tags
        .get(POOL_NAME_TAG)
        .is_some_and(|name| name.eq_ignore_ascii_case(pool));
    let suffix_matches = tags
        .get(NAME_SUFFIX_TAG)
        .is_none_or(|suffix| cluster_id.contains(suffix.as_str()));
    pool_matches && suffix_matches
}
