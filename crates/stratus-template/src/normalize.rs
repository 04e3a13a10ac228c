//! Scale-up normalization for availability-set templates.
//!
//! A regenerated template describes the whole cluster. Redeploying it to
//! grow one availability-set pool must leave the masters and the shared
//! network resources alone, so the pass below:
//!
//! 1. strips `vmSize`, `customData` and `imageReference` from master VMs
//!    so they redeploy unchanged;
//! 2. removes the network security group (required) and the route table
//!    (optional);
//! 3. drops `dependsOn` entries that pointed at the removed resources.
//!
//! Templates with no availability set are returned untouched.

use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{DeploymentTemplate, TemplateResource};
use crate::error::TemplateError;

pub const AVAILABILITY_SET_TYPE: &str = "Microsoft.Compute/availabilitySets";
pub const VIRTUAL_MACHINE_TYPE: &str = "Microsoft.Compute/virtualMachines";
pub const NSG_TYPE: &str = "Microsoft.Network/networkSecurityGroups";
pub const ROUTE_TABLE_TYPE: &str = "Microsoft.Network/routeTables";

const MASTER_NAME_MARKER: &str = "variables('masterVMNamePrefix')";
const NSG_ID_VARIABLE: &str = "variables('nsgID')";
const ROUTE_TABLE_ID_VARIABLE: &str = "variables('routeTableID')";

/// Template transform applied to every scale-up template before submission.
pub trait TemplateNormalizer: Send + Sync {
    fn normalize(&self, template: &mut DeploymentTemplate) -> Result<(), TemplateError>;
}

/// Normalizer for growing availability-set pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmasScaleUpNormalizer;

impl TemplateNormalizer for VmasScaleUpNormalizer {
    fn normalize(&self, template: &mut DeploymentTemplate) -> Result<(), TemplateError> {
        if !template.has_resource_type(AVAILABILITY_SET_TYPE) {
            debug!("no availability sets in template, skipping scale-up normalization");
            return Ok(());
        }

        let mut masters = 0;
        for resource in template.resources.iter_mut().filter(|r| is_master_vm(r)) {
            strip_master_fields(resource);
            masters += 1;
        }

        if !template.has_resource_type(NSG_TYPE) {
            return Err(TemplateError::MissingResource(NSG_TYPE));
        }
        if !template.has_resource_type(ROUTE_TABLE_TYPE) {
            warn!("template has no route table, leaving dependencies untouched");
        }

        template
            .resources
            .retain(|r| !r.is_type(NSG_TYPE) && !r.is_type(ROUTE_TABLE_TYPE));

        for resource in &mut template.resources {
            resource
                .depends_on
                .retain(|dependency| !references_removed_resource(dependency));
        }

        debug!(
            masters,
            resources = template.resources.len(),
            "normalized template for availability-set scale-up"
        );
        Ok(())
    }
}

fn is_master_vm(resource: &TemplateResource) -> bool {
    resource.is_type(VIRTUAL_MACHINE_TYPE)
        && resource
            .name
            .as_deref()
            .is_some_and(|name| name.contains(MASTER_NAME_MARKER))
}

fn strip_master_fields(resource: &mut TemplateResource) {
    let Some(properties) = resource.properties_mut() else {
        return;
    };

    if let Some(Value::Object(hardware)) = properties.get_mut("hardwareProfile") {
        hardware.remove("vmSize");
    }
    if let Some(Value::Object(os)) = properties.get_mut("osProfile") {
        os.remove("customData");
    }
    if let Some(Value::Object(storage)) = properties.get_mut("storageProfile") {
        storage.remove("imageReference");
    }
}

fn references_removed_resource(dependency: &str) -> bool {
    dependency.contains(NSG_TYPE)
        || dependency.contains(NSG_ID_VARIABLE)
        || dependency.contains(ROUTE_TABLE_TYPE)
        || dependency.contains(ROUTE_TABLE_ID_VARIABLE)
}
