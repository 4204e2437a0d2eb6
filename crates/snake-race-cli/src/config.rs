//! Configuration management for the snake race CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use snake_race_runtime::policy::PolicyConfig;
use snake_race_runtime::simulation::SimulationConfig;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "snake-race.toml";

/// Project configuration, as stored in `snake-race.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_agents")]
    pub agents: usize,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    #[serde(default = "default_initial_max_length")]
    pub initial_max_length: usize,
}

// Default value functions
fn default_agents() -> usize { SimulationConfig::default().agents }
fn default_width() -> i32 { SimulationConfig::default().width }
fn default_height() -> i32 { SimulationConfig::default().height }
fn default_tick_period_ms() -> u64 { SimulationConfig::default().tick_period_ms }
fn default_initial_max_length() -> usize { SimulationConfig::default().initial_max_length }

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            width: default_width(),
            height: default_height(),
            tick_period_ms: default_tick_period_ms(),
            initial_max_length: default_initial_max_length(),
        }
    }
}

impl From<&SimulationSection> for SimulationConfig {
    fn from(section: &SimulationSection) -> Self {
        SimulationConfig {
            agents: section.agents,
            width: section.width,
            height: section.height,
            tick_period_ms: section.tick_period_ms,
            initial_max_length: section.initial_max_length,
        }
    }
}

impl Config {
    /// Load config from snake-race.toml in the current or parent directories.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig::from(&self.simulation)
    }
}

/// Find snake-race.toml in current or parent directories.
pub fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}
