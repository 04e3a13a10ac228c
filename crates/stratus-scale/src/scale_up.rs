//! Scale-up through a regenerated single-pool deployment.
//!
//! The template is rendered from a copy of the model that holds only the
//! target pool, so the deployment cannot touch any other pool. Computed
//! count, offset and Windows index values are injected into the raw
//! artifacts before submission.

use stratus_core::ClusterModel;
use stratus_template::{ArtifactFormat, TemplateNormalizer};
use tracing::{debug, info};

use crate::calculator::scale_up_injections;
use crate::collaborators::{ArtifactGenerator, DeploymentHandle};
use crate::context::ScaleContext;
use crate::error::{ScaleError, ScaleResult};

/// Copy of `model` whose only agent pool is the one at `pool_index`.
pub fn single_pool_model(model: &ClusterModel, pool_index: usize) -> ScaleResult<ClusterModel> {
    let pool = model.agent_pool(pool_index)?.clone();
    let mut collapsed = model.clone();
    collapsed.properties.agent_pool_profiles = vec![pool];
    Ok(collapsed)
}

/// Name for a scale deployment submitted at `unix_secs`.
pub fn deployment_name(cluster: &str, pool: &str, unix_secs: u64) -> String {
    format!("{cluster}-scale-{pool}-{unix_secs}")
}

pub async fn scale_up(
    ctx: &ScaleContext,
    generator: &dyn ArtifactGenerator,
    normalizer: &dyn TemplateNormalizer,
    deployment: &str,
) -> ScaleResult<DeploymentHandle> {
    let pool = ctx.pool_name.as_str();
    let injections = scale_up_injections(ctx.topology, &ctx.inventory, ctx.desired_count)?;
    let model = single_pool_model(&ctx.model, ctx.pool_index)?;

    let artifacts = generator
        .generate(&model, ArtifactFormat::Raw)
        .map_err(|source| ScaleError::Generation {
            pool: pool.to_string(),
            source,
        })?;
    let normalization = |source| ScaleError::Normalization {
        pool: pool.to_string(),
        source,
    };
    let (mut template, mut parameters) = artifacts.parse().map_err(normalization)?;

    injections.apply_template(pool, &mut template);
    normalizer.normalize(&mut template).map_err(normalization)?;
    injections.apply_parameters(pool, &mut parameters);
    debug!(
        pool,
        count = ?injections.count,
        offset = ?injections.offset,
        windows_index = ?injections.windows_index,
        "scale-up values injected"
    );

    info!(pool, %deployment, resource_group = %ctx.resource_group(), "submitting scale deployment");
    let handle = ctx
        .client
        .deploy_template(ctx.resource_group(), deployment, &template, &parameters)
        .await
        .map_err(|source| ScaleError::Deployment {
            deployment: deployment.to_string(),
            source,
        })?;
    info!(pool, %deployment, state = %handle.provisioning_state, "scale deployment finished");
    Ok(handle)
}
