//! Pure count and index arithmetic for agent pool scaling.
//!
//! Indexed pools keep their instances' identities: an instance's index is
//! fixed at creation and gaps left by earlier deletions are never refilled.
//! The template generator allocates indices `offset..count`, so the count
//! submitted on scale-up must cover the gaps below the highest used index.

use std::cmp::Ordering;

use stratus_template::ScaleInjections;

use crate::error::{ScaleError, ScaleResult};
use crate::topology::{PoolInventory, PoolTopology};

/// Result of comparing the live count with the desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountDelta {
    NoOp,
    Shrink(u32),
    Grow(u32),
}

pub fn compare_counts(current: u32, desired: u32) -> CountDelta {
    match current.cmp(&desired) {
        Ordering::Equal => CountDelta::NoOp,
        Ordering::Greater => CountDelta::Shrink(current - desired),
        Ordering::Less => CountDelta::Grow(desired - current),
    }
}

/// What a scale request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    NoOp,
    ScaleDown,
    ScaleUp,
}

/// Uniform pools shrink through a scale-up deployment of the lower count.
pub fn decide(topology: PoolTopology, current: u32, desired: u32) -> ScaleAction {
    match compare_counts(current, desired) {
        CountDelta::NoOp => ScaleAction::NoOp,
        CountDelta::Shrink(_) if topology.is_indexed() => ScaleAction::ScaleDown,
        CountDelta::Shrink(_) | CountDelta::Grow(_) => ScaleAction::ScaleUp,
    }
}

/// Count to submit in the deployment parameters.
///
/// `highest_used_index == 0` is the uniform sentinel and returns `desired`.
/// Otherwise the count is `desired + (highest_used_index + 1 - current)`:
/// the index gaps are counted so the new instances land above the highest
/// used index. `None` when the count does not fit in a `u32`.
pub fn compute_target_count(desired: u32, highest_used_index: u32, current: u32) -> Option<u32> {
    if highest_used_index == 0 {
        return Some(desired);
    }
    let gaps = highest_used_index.checked_add(1)?.saturating_sub(current);
    desired.checked_add(gaps)
}

/// The highest-indexed `current - desired` instances, highest first.
///
/// `vms` must be ordered by ascending index.
pub fn select_vms_for_removal(vms: &[String], current: u32, desired: u32) -> Vec<String> {
    let end = (current as usize).min(vms.len());
    let start = (desired as usize).min(end);
    vms[start..end].iter().rev().cloned().collect()
}

/// Parameter and variable values for a scale-up of `topology`.
pub fn scale_up_injections(
    topology: PoolTopology,
    inventory: &PoolInventory,
    desired: u32,
) -> ScaleResult<ScaleInjections> {
    let out_of_range = || {
        ScaleError::Configuration(format!(
            "desired count {desired} with highest used index {} exceeds the index range",
            inventory.highest_used_index
        ))
    };
    let count = compute_target_count(
        desired,
        inventory.highest_used_index,
        inventory.current_count,
    )
    .ok_or_else(out_of_range)?;
    let offset = match topology {
        PoolTopology::Indexed if inventory.current_count == 0 => Some(0),
        PoolTopology::Indexed => Some(
            inventory
                .highest_used_index
                .checked_add(1)
                .ok_or_else(out_of_range)?,
        ),
        PoolTopology::Uniform => None,
    };

    Ok(ScaleInjections {
        count: Some(count),
        offset,
        windows_index: inventory.windows_index,
    })
}
