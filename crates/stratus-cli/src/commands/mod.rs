pub mod cluster;
pub mod plan;

use std::path::Path;

use anyhow::Context;
use stratus_core::StratusConfig;
use stratus_state::StateStore;

const CONFIG_FILE: &str = "stratus.toml";

/// An explicit `--config` must exist; otherwise `./stratus.toml` is used
/// when present and defaults apply when it is not.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<StratusConfig> {
    match path {
        Some(path) => StratusConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display())),
        None if Path::new(CONFIG_FILE).exists() => StratusConfig::from_file(Path::new(CONFIG_FILE)),
        None => Ok(StratusConfig::default()),
    }
}

pub fn open_store(config: &StratusConfig) -> anyhow::Result<StateStore> {
    let path = Path::new(config.state_path());
    StateStore::open(path).with_context(|| format!("opening state store {}", path.display()))
}

pub fn init(path: &Path) -> anyhow::Result<()> {
    let output = path.join(CONFIG_FILE);
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }
    std::fs::write(&output, StratusConfig::scaffold().to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
