//! Loading and persisting the cluster api model.
//!
//! The state store holds the authoritative copy; `apimodel.json` in the
//! deployment directory is rewritten after every successful store update.

use std::fs;
use std::path::{Path, PathBuf};

use stratus_core::ClusterModel;
use stratus_state::{ClusterRecord, StateError, StateStore};
use tracing::{debug, info};

use crate::error::{PersistError, ScaleResult};

pub const APIMODEL_FILE: &str = "apimodel.json";

/// Load the stored model for `cluster_id` along with its record.
pub fn load_cluster_model(
    store: &StateStore,
    cluster_id: &str,
) -> ScaleResult<(ClusterModel, ClusterRecord)> {
    let record = store
        .get_cluster(cluster_id)?
        .ok_or_else(|| StateError::NotFound(cluster_id.to_string()))?;
    let model = ClusterModel::from_json(&record.api_model)?;
    debug!(cluster = %cluster_id, revision = record.revision, "api model loaded");
    Ok((model, record))
}

/// Replace the stored model if it is still at `expected_revision`, then
/// write `apimodel.json` into `deployment_dir`.
///
/// When `deployment_dir` is `None` the directory recorded with the cluster
/// is used; with neither, only the store is updated.
pub fn persist_cluster_model(
    store: &StateStore,
    cluster_id: &str,
    expected_revision: u64,
    model: &ClusterModel,
    deployment_dir: Option<&Path>,
) -> Result<ClusterRecord, PersistError> {
    let document = model.to_json_pretty()?;
    let record = store.replace_cluster_if_revision(cluster_id, expected_revision, document.clone())?;

    let dir = deployment_dir
        .map(Path::to_path_buf)
        .or_else(|| record.deployment_dir.as_ref().map(PathBuf::from));
    if let Some(dir) = dir {
        write_apimodel(&dir, &document)?;
    }

    info!(cluster = %cluster_id, revision = record.revision, "api model persisted");
    Ok(record)
}

/// Write `document` to `dir/apimodel.json`, creating `dir` if needed.
pub fn write_apimodel(dir: &Path, document: &str) -> Result<PathBuf, PersistError> {
    let path = dir.join(APIMODEL_FILE);
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&path, document))
        .map_err(|source| PersistError::Write {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), "api model written");
    Ok(path)
}
