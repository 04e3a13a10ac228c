//! Provider error types.

use stratus_core::apimodel::ApiModelError;
use stratus_core::kubeconfig::KubeConfigError;
use stratus_core::resource_id::ResourceIdError;
use stratus_scale::{BoxError, CloudError, PersistError, ScaleError};
use stratus_state::StateError;
use stratus_template::TemplateError;
use thiserror::Error;

/// Errors that can occur during cluster lifecycle operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid cluster resource id {id:?}: {source}")]
    ResourceId {
        id: String,
        #[source]
        source: ResourceIdError,
    },

    #[error("invalid cluster spec: {0}")]
    InvalidSpec(String),

    #[error("cluster not found: {0}")]
    NotFound(String),

    #[error("cluster already managed: {0}")]
    AlreadyExists(String),

    #[error("resource group {name:?}: {source}")]
    ResourceGroup {
        name: String,
        #[source]
        source: CloudError,
    },

    #[error("failed to generate deployment artifacts: {0}")]
    Generation(#[source] BoxError),

    #[error("invalid deployment artifacts: {0}")]
    Template(#[from] TemplateError),

    #[error("failed to connect to the cloud API: {0}")]
    Client(#[source] CloudError),

    #[error("deployment {name:?} failed: {source}")]
    Deployment {
        name: String,
        #[source]
        source: CloudError,
    },

    #[error("cannot upgrade Kubernetes from {from} to {to}: {reason}")]
    InvalidUpgrade {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Kubernetes upgrade to {version} failed: {source}")]
    Upgrade {
        version: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to scale agent pool {pool:?}: {source}")]
    Scale {
        pool: String,
        #[source]
        source: ScaleError,
    },

    #[error("api model error: {0}")]
    Model(#[from] ApiModelError),

    #[error("kubeconfig error: {0}")]
    KubeConfig(#[from] KubeConfigError),

    #[error("failed to persist api model: {0}")]
    Persist(#[from] PersistError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
