//! Simulation configuration loading.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use galton_board_core::SimulationConfig;

/// Command-line values that take precedence over the configuration file.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Overrides {
    /// Replacement RNG seed.
    pub(crate) seed: Option<u64>,
    /// Replacement token pool size.
    pub(crate) pool_capacity: Option<usize>,
}

/// Loads the configuration at `path`, or the built-in defaults without one.
pub(crate) fn load(path: Option<&Path>) -> Result<SimulationConfig> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse(contents: &str) -> Result<SimulationConfig> {
    let config: SimulationConfig =
        toml::from_str(contents).context("failed to parse config toml contents")?;
    config.validate()?;
    Ok(config)
}

/// Applies command-line overrides and re-validates the result.
pub(crate) fn apply_overrides(
    mut config: SimulationConfig,
    overrides: Overrides,
) -> Result<SimulationConfig> {
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(pool_capacity) = overrides.pool_capacity {
        config.pool_capacity = pool_capacity;
    }
    config
        .validate()
        .context("command-line overrides produced an invalid configuration")?;
    Ok(config)
}
