//! Simulation and worker-thread settings, loadable from TOML.
//!
//! ```toml
//! [simulation]
//! bodies = 100000
//! dt = 0.05
//! theta = 1.0
//! epsilon = 1.0
//! strategy = { kind = "partition", leaf_capacity = 16 }
//!
//! [shell]
//! tick_interval_ms = 1
//! pause_interval_ms = 10
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::Result, spatial::TreeStrategy};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of bodies in the initial disc.
    pub bodies: usize,
    /// Upper bound used to pre-size every buffer; defaults to `bodies`.
    pub capacity: Option<usize>,
    /// Time step per tick.
    pub dt: f32,
    /// Barnes-Hut opening threshold.
    pub theta: f32,
    /// Softening length.
    pub epsilon: f32,
    /// Seed for the initial distribution.
    pub seed: u64,
    /// Evaluate accelerations and integration on the rayon pool.
    pub parallel: bool,
    pub strategy: TreeStrategy,
    /// Cap on tree nodes; a tick that would exceed it fails and is rolled back.
    pub max_nodes: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bodies: 100_000,
            capacity: None,
            dt: 0.05,
            theta: 1.0,
            epsilon: 1.0,
            seed: 0,
            parallel: true,
            strategy: TreeStrategy::default(),
            max_nodes: None,
        }
    }
}

impl SimulationConfig {
    pub fn capacity(&self) -> usize {
        self.capacity.unwrap_or(self.bodies)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Sleep between ticks while running.
    pub tick_interval_ms: u64,
    /// Sleep between polls while paused.
    pub pause_interval_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1,
            pause_interval_ms: 10,
        }
    }
}

impl ShellConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn pause_interval(&self) -> Duration {
        Duration::from_millis(self.pause_interval_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub shell: ShellConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
