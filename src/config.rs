use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub general: GeneralConfig,
    /// One entry per monitored variable, keyed by its snake_case name.
    #[serde(default)]
    pub variables: BTreeMap<String, ControlConfig>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GeneralConfig {
    /// Seconds between poll cycles.
    #[validate(range(min = 1))]
    pub poll_interval_secs: u64,
    /// Sensor data-ready retry budget per read; exhaustion is fatal.
    #[validate(range(min = 1))]
    pub sensor_max_attempts: u32,
    /// Optional environment profile layered over the defaults
    /// (`config/profiles/<name>.toml`).
    #[serde(default)]
    pub profile: Option<String>,
}

/// Control strategy selector for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStrategy {
    Threshold,
    Frequency,
    Schedule,
    Disabled,
}

/// Raw per-variable control settings as they appear in the config file. The
/// registry lowers these into validated strategy parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub strategy: ControlStrategy,

    // Threshold strategy: min and max sides drive independent devices.
    pub min_threshold: Option<f64>,
    pub min_channel: Option<u8>,
    pub min_device: Option<String>,
    pub max_threshold: Option<f64>,
    pub max_channel: Option<u8>,
    pub max_device: Option<String>,
    /// Minimum-on hold after a threshold activation.
    pub hold_secs: Option<u64>,

    // Frequency strategy.
    pub period_secs: Option<u64>,
    pub on_duration_secs: Option<u64>,
    pub start_offset_secs: Option<u64>,

    // Schedule strategy.
    pub on_hour: Option<u32>,
    pub off_hour: Option<u32>,

    // Single channel for frequency/schedule strategies.
    pub channel: Option<u8>,
    pub device: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Layering order: defaults file, then the selected profile file, then
    /// `CLIMATE__`-prefixed environment variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let base = Figment::new().merge(Toml::file(path.as_ref()));

        // First pass only to learn which profile is selected.
        let first: Config = base
            .clone()
            .merge(Env::prefixed("CLIMATE__").split("__"))
            .extract()?;

        let figment = match &first.general.profile {
            Some(profile) => base.merge(Toml::file(format!("config/profiles/{profile}.toml"))),
            None => base,
        };
        let cfg: Config = figment
            .merge(Env::prefixed("CLIMATE__").split("__"))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}
