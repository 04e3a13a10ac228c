//! Stratus agent pool scaling.
//!
//! Brings one agent pool of a running cluster to a desired instance count
//! while keeping the stored api model and the live infrastructure in step.
//!
//! - **Indexed pools** (availability sets) shrink by draining and deleting
//!   their highest-indexed VMs, and grow by redeploying a single-pool
//!   template whose count and offset skip every index already in use.
//! - **Uniform pools** (scale sets) are always resized by redeploying the
//!   template with the new capacity.
//!
//! [`ScaleDriver::scale_agent_pool`] is the entry point. Every external
//! system is reached through the traits in [`collaborators`].

pub mod calculator;
pub mod collaborators;
pub mod context;
pub mod driver;
pub mod error;
pub mod names;
pub mod persist;
pub mod scale_down;
pub mod scale_up;
pub mod topology;

#[cfg(test)]
mod testing;

pub use calculator::{CountDelta, ScaleAction, compare_counts, compute_target_count, select_vms_for_removal};
pub use collaborators::{
    ArtifactGenerator, BoxError, BoxFuture, CloudClient, CloudConnector, CloudCredentials,
    CloudError, DeploymentHandle, NodeDrainer, ScaleSet, SecretResolver, VirtualMachine,
};
pub use context::{ScaleContext, ScaleSettings};
pub use driver::{
    Collaborators, ScaleDriver, ScaleOperation, ScaleOutcome, ScalePhase, ScaleRequest,
};
pub use error::{
    InstanceFailure, InventoryError, PartialDeletionError, PersistError, ScaleError, ScaleResult,
};
pub use topology::{PoolInventory, PoolTopology};
