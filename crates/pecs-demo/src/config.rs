//! Demo run settings.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Parameters of one kill/respawn run. Missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub entity_count: usize,
    pub ticks: u32,
    /// Tick after whose update the kill/respawn batch runs.
    pub kill_tick: u32,
    pub kill_count: usize,
    pub dt: f64,
    /// Pick random victims with this seed instead of the first `kill_count`
    /// entities.
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            entity_count: 2_000_000,
            ticks: 10,
            kill_tick: 5,
            kill_count: 500,
            dt: 1.0,
            seed: None,
        }
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Settings from `path` if given, the defaults otherwise. Both are
    /// validated.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate().context("default config")?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.kill_count > self.entity_count {
            bail!(
                "kill_count {} exceeds entity_count {}",
                self.kill_count,
                self.entity_count
            );
        }
        if self.entity_count > u32::MAX as usize {
            bail!("entity_count {} does not fit a 32-bit id", self.entity_count);
        }
        Ok(())
    }
}
