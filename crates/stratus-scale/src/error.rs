//! Error types for the scale subsystem.

use std::fmt;
use std::path::PathBuf;

use stratus_core::apimodel::ApiModelError;
use stratus_core::resource_id::ResourceIdError;
use stratus_state::StateError;
use stratus_template::TemplateError;
use thiserror::Error;

use crate::collaborators::{BoxError, CloudError};
use crate::names::NameError;

/// Result type alias for scale operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Errors returned by [`crate::ScaleDriver::scale_agent_pool`].
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to read service principal secret {secret:?} from key vault: {source}")]
    SecretAccess {
        secret: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to parse cluster resource id: {0}")]
    ResourceId(#[from] ResourceIdError),

    #[error("failed to load api model: {0}")]
    Parse(#[from] ApiModelError),

    #[error("failed to connect to the cloud API: {0}")]
    Client(#[source] CloudError),

    #[error("failed to generate deployment artifacts for pool {pool:?}: {source}")]
    Generation {
        pool: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to prepare scale-up template for pool {pool:?}: {source}")]
    Normalization {
        pool: String,
        #[source]
        source: TemplateError,
    },

    #[error("failed to read inventory of pool {pool:?}: {source}")]
    Inventory {
        pool: String,
        #[source]
        source: InventoryError,
    },

    #[error("failed to drain nodes {nodes:?}: {source}")]
    Drain {
        nodes: Vec<String>,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    PartialDeletion(#[from] PartialDeletionError),

    #[error("deployment {deployment:?} failed: {source}")]
    Deployment {
        deployment: String,
        #[source]
        source: CloudError,
    },

    #[error("failed to persist api model: {0}")]
    Persist(#[from] PersistError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl ScaleError {
    /// Whether the persisted api model already reflects the desired count.
    pub fn model_persisted(&self) -> bool {
        matches!(self, ScaleError::PartialDeletion(_))
    }
}

// ── Inventory ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("listing failed: {0}")]
    List(#[from] CloudError),

    #[error("unrecognised instance name: {0}")]
    Name(#[from] NameError),
}

// ── Deletion ──────────────────────────────────────────────────────

/// One instance that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFailure {
    pub instance: String,
    pub cause: String,
}

/// Aggregate of every failed deletion in one scale-down, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDeletionError {
    pub failures: Vec<InstanceFailure>,
    /// Number of deletions attempted, failed ones included.
    pub attempted: usize,
}

impl PartialDeletionError {
    pub fn failed_instances(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.instance.as_str()).collect()
    }
}

impl fmt::Display for PartialDeletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} instance deletions failed",
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(
                f,
                "; node '{}' failed to delete with error: '{}'",
                failure.instance, failure.cause
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialDeletionError {}

// ── Persistence ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{0}")]
    Model(#[from] ApiModelError),

    #[error("{0}")]
    State(#[from] StateError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistError {
    /// True when another writer replaced the record since it was loaded.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PersistError::State(StateError::Conflict { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_deletion_names_each_failure() {
        let err = PartialDeletionError {
            failures: vec![InstanceFailure {
                instance: "k8s-agentpool1-12345678-4".to_string(),
                cause: "request failed: 500".to_string(),
            }],
            attempted: 3,
        };

        let message = err.to_string();
        assert!(message.starts_with("1 of 3 instance deletions failed"));
        assert!(message.contains(
            "node 'k8s-agentpool1-12345678-4' failed to delete with error: 'request failed: 500'"
        ));
        assert_eq!(err.failed_instances(), vec!["k8s-agentpool1-12345678-4"]);
    }

    #[test]
    fn only_partial_deletion_reports_persisted_model() {
        let partial = ScaleError::PartialDeletion(PartialDeletionError {
            failures: Vec::new(),
            attempted: 0,
        });
        assert!(partial.model_persisted());
        assert!(!ScaleError::Configuration("x".to_string()).model_persisted());
    }

    #[test]
    fn conflict_is_detected() {
        let err = PersistError::State(StateError::Conflict {
            id: "c".to_string(),
            expected: 1,
            found: 2,
        });
        assert!(err.is_conflict());
        assert!(!PersistError::State(StateError::NotFound("c".to_string())).is_conflict());
    }
}
