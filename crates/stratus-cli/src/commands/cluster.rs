use std::path::{Path, PathBuf};

use anyhow::Context;
use stratus_core::{ClusterModel, StratusConfig};
use stratus_provider::{ClusterState, import_cluster, read_cluster};
use stratus_state::StateStore;

pub fn import(
    config: &StratusConfig,
    id: &str,
    apimodel: &Path,
    dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(apimodel)
        .with_context(|| format!("reading {}", apimodel.display()))?;
    let store = super::open_store(config)?;
    let state = import_into(&store, config, id, &document, dir)?;
    println!("✓ Imported {} ({})", state.name, state.id);
    Ok(())
}

fn import_into(
    store: &StateStore,
    config: &StratusConfig,
    id: &str,
    document: &str,
    dir: Option<PathBuf>,
) -> anyhow::Result<ClusterState> {
    let dir = match dir {
        Some(dir) => dir,
        None => {
            let model = ClusterModel::from_json(document)?;
            Path::new(config.deployment_dir()).join(&model.properties.master_profile.dns_prefix)
        }
    };
    Ok(import_cluster(store, id, document, Some(dir))?)
}

pub fn list(config: &StratusConfig) -> anyhow::Result<()> {
    let store = super::open_store(config)?;
    for record in store.list_clusters()? {
        println!("{}\trevision {}", record.id, record.revision);
    }
    Ok(())
}

pub fn show(config: &StratusConfig, id: &str, format: &str) -> anyhow::Result<()> {
    let store = super::open_store(config)?;
    let state = read_cluster(&store, id)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&state)?),
        _ => print!("{}", format_state(&state)),
    }
    Ok(())
}

pub fn kubeconfig(config: &StratusConfig, id: &str) -> anyhow::Result<()> {
    let store = super::open_store(config)?;
    let state = read_cluster(&store, id)?;
    let raw = state
        .kube_config_raw
        .with_context(|| format!("cluster {id} has no master FQDN yet"))?;
    println!("{raw}");
    Ok(())
}

fn format_state(state: &ClusterState) -> String {
    let mut out = String::new();
    out.push_str(&format!("Cluster:     {}\n", state.name));
    out.push_str(&format!("Id:          {}\n", state.id));
    out.push_str(&format!("Group:       {}\n", state.resource_group));
    out.push_str(&format!("Location:    {}\n", state.location));
    out.push_str(&format!("Kubernetes:  {}\n", state.kubernetes_version));
    out.push_str(&format!("Revision:    {}\n", state.revision));
    if let Some(fqdn) = &state.master_profile.fqdn {
        out.push_str(&format!("API server:  https://{fqdn}\n"));
    }
    out.push_str(&format!(
        "Masters:     {} x {}\n",
        state.master_profile.count, state.master_profile.vm_size
    ));
    out.push_str("Agent pools:\n");
    for (index, pool) in state.agent_pool_profiles.iter().enumerate() {
        let kind = if pool.is_availability_set() {
            "availability set"
        } else {
            "scale set"
        };
        out.push_str(&format!(
            "  [{index}] {:<16} {:>3} x {:<18} {kind}\n",
            pool.name, pool.count, pool.vm_size
        ));
    }
    if !state.tags.is_empty() {
        out.push_str("Tags:\n");
        for (key, value) in &state.tags {
            out.push_str(&format!("  {key} = {value}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str =
        "/subscriptions/sub/resourceGroups/prod-rg/providers/Microsoft.Resources/deployments/prod";

    const DOCUMENT: &str = r#"{
        "apiVersion": "vlabs",
        "name": "prod",
        "location": "westus2",
        "tags": { "env": "prod" },
        "properties": {
            "orchestratorProfile": { "orchestratorType": "Kubernetes", "orchestratorVersion": "1.10.3" },
            "masterProfile": { "count": 3, "dnsPrefix": "prodk8s", "vmSize": "Standard_D2_v2", "fqdn": "prodk8s.westus2.cloudapp.azure.com" },
            "agentPoolProfiles": [
                { "name": "linuxpool", "count": 4, "vmSize": "Standard_D2_v2" },
                { "name": "scalepool", "count": 2, "vmSize": "Standard_D2_v2", "availabilityProfile": "VirtualMachineScaleSets" }
            ]
        }
    }"#;

    #[test]
    fn import_defaults_directory_from_config() {
        let out = tempfile::tempdir().unwrap();
        let mut config = StratusConfig::scaffold();
        config.deployment = Some(stratus_core::config::DeploymentConfig {
            directory: Some(out.path().display().to_string()),
        });
        let store = StateStore::open_in_memory().unwrap();

        let state = import_into(&store, &config, ID, DOCUMENT, None).unwrap();
        assert_eq!(state.resource_group, "prod-rg");
        assert!(out.path().join("prodk8s").join("apimodel.json").exists());
    }

    #[test]
    fn text_view_lists_pools_and_tags() {
        let store = StateStore::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        import_into(
            &store,
            &StratusConfig::default(),
            ID,
            DOCUMENT,
            Some(dir.path().to_path_buf()),
        )
        .unwrap();

        let text = format_state(&read_cluster(&store, ID).unwrap());
        assert!(text.contains("API server:  https://prodk8s.westus2.cloudapp.azure.com"));
        assert!(text.contains("[0] linuxpool"));
        assert!(text.contains("scale set"));
        assert!(text.contains("env = prod"));
    }

    #[test]
    fn json_view_omits_credentials() {
        let store = StateStore::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let state = import_into(
            &store,
            &StratusConfig::default(),
            ID,
            DOCUMENT,
            Some(dir.path().to_path_buf()),
        )
        .unwrap();
        assert!(state.kube_config_raw.is_some());

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("kube_config_raw").is_none());
        assert_eq!(json["agent_pool_profiles"][0]["count"], 4);
    }
}
