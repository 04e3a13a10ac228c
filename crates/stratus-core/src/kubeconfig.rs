//! Admin kubeconfig derived from a cluster api model.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apimodel::ClusterModel;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KubeConfigError {
    #[error("cluster {0:?} has no master FQDN")]
    MissingFqdn(String),
}

/// Connection details for the cluster's control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeConfig {
    pub cluster_name: String,
    /// `https://{fqdn}`
    pub server: String,
    pub username: String,
    /// Base64-encoded PEM, as stored in kubeconfig `*-data` fields.
    pub certificate_authority_data: Option<String>,
    pub client_certificate_data: Option<String>,
    pub client_key_data: Option<String>,
}

impl KubeConfig {
    /// Derive the admin kubeconfig. `resource_group` scopes the user name.
    pub fn from_model(model: &ClusterModel, resource_group: &str) -> Result<Self, KubeConfigError> {
        let fqdn = model
            .master_fqdn()
            .ok_or_else(|| KubeConfigError::MissingFqdn(model.name.clone()))?;

        let certs = model.properties.certificate_profile.clone().unwrap_or_default();
        let encode = |pem: Option<String>| pem.map(|p| STANDARD.encode(p.as_bytes()));

        Ok(KubeConfig {
            cluster_name: model.properties.master_profile.dns_prefix.clone(),
            server: format!("https://{fqdn}"),
            username: format!("clusterAdmin_{resource_group}_{}", model.name),
            certificate_authority_data: encode(certs.ca_certificate),
            client_certificate_data: encode(certs.kube_config_certificate),
            client_key_data: encode(certs.kube_config_private_key),
        })
    }

    /// Render as a kubeconfig document (JSON is accepted by kubectl).
    pub fn to_document(&self) -> serde_json::Value {
        let context = self.cluster_name.clone();
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "Config",
            "clusters": [{
                "name": self.cluster_name,
                "cluster": {
                    "server": self.server,
                    "certificate-authority-data": self.certificate_authority_data,
                },
            }],
            "users": [{
                "name": self.username,
                "user": {
                    "client-certificate-data": self.client_certificate_data,
                    "client-key-data": self.client_key_data,
                },
            }],
            "contexts": [{
                "name": context,
                "context": { "cluster": self.cluster_name, "user": self.username },
            }],
            "current-context": context,
        })
    }

    pub fn to_raw(&self) -> String {
        // Serializing a `Value` cannot fail.
        serde_json::to_string_pretty(&self.to_document()).unwrap_or_default()
    }
}
