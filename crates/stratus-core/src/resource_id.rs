//! Cloud resource id parsing.
//!
//! Cluster resources are identified by the id of the deployment that
//! created them:
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Resources/deployments/{name}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEPLOYMENTS_PROVIDER: &str = "Microsoft.Resources";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: Option<String>,
    /// Remaining `{type}/{name}` pairs after the provider namespace.
    pub path: BTreeMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceIdError {
    #[error("resource id is empty")]
    Empty,
    #[error("resource id {0:?} has an odd number of segments")]
    OddSegments(String),
    #[error("resource id {0:?} has no subscription")]
    MissingSubscription(String),
    #[error("resource id {0:?} has no resource group")]
    MissingResourceGroup(String),
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self, ResourceIdError> {
        let trimmed = id.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ResourceIdError::Empty);
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(ResourceIdError::OddSegments(id.to_string()));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut path = BTreeMap::new();

        for pair in segments.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.eq_ignore_ascii_case("subscriptions") && subscription_id.is_none() {
                subscription_id = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("resourceGroups") && resource_group.is_none() {
                resource_group = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("providers") && provider.is_none() {
                provider = Some(value.to_string());
            } else {
                path.insert(key.to_string(), value.to_string());
            }
        }

        let subscription_id = subscription_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResourceIdError::MissingSubscription(id.to_string()))?;
        let resource_group = resource_group
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResourceIdError::MissingResourceGroup(id.to_string()))?;

        Ok(ResourceId {
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }

    /// Build the id of a resource-group deployment.
    pub fn deployment(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        let mut path = BTreeMap::new();
        path.insert("deployments".to_string(), name.to_string());
        ResourceId {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            provider: Some(DEPLOYMENTS_PROVIDER.to_string()),
            path,
        }
    }

    pub fn deployment_name(&self) -> Option<&str> {
        self.path.get("deployments").map(String::as_str)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{provider}")?;
        }
        for (key, value) in &self.path {
            write!(f, "/{key}/{value}")?;
        }
        Ok(())
    }
}
