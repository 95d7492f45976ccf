//! TOML loading of simulation configurations.

use std::path::Path;

use anyhow::Context;
use xdiffract::SimulationConfig;

pub fn load_config(path: &Path) -> anyhow::Result<SimulationConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: SimulationConfig =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
