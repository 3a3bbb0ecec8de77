//! Builds the set of active variable controllers from configuration,
//! validating strategy parameters up front so runtime evaluation never sees a
//! malformed config.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{info, warn};

use super::variable::{
    FrequencyParams, ScheduleParams, StrategyParams, ThresholdParams, ThresholdSideParams,
    VariableController,
};
use crate::config::{Config, ControlConfig, ControlStrategy};
use crate::domain::Variable;
use crate::hardware::RelayPort;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The name has no matching controller type. Logged and skipped by
    /// `build`, never fatal to the rest of the registry.
    #[error("no controller exists for variable '{0}'")]
    UnknownVariable(String),

    #[error("invalid configuration for {variable}: {field}: {reason}")]
    InvalidConfiguration {
        variable: Variable,
        field: &'static str,
        reason: String,
    },

    #[error("no usable variable controllers were configured")]
    Empty,
}

pub struct ControllerRegistry;

impl ControllerRegistry {
    /// Translate configuration entries into validated controllers, ordered by
    /// variable so evaluation order is deterministic. Unknown variable names
    /// are skipped; invalid parameters abort startup.
    pub fn build(
        config: &Config,
        relay: Arc<dyn RelayPort>,
    ) -> Result<Vec<VariableController>, RegistryError> {
        let mut by_variable: BTreeMap<Variable, &ControlConfig> = BTreeMap::new();
        for (name, entry) in &config.variables {
            match Variable::from_str(name) {
                Ok(variable) => {
                    by_variable.insert(variable, entry);
                }
                Err(_) => {
                    let err = RegistryError::UnknownVariable(name.clone());
                    warn!(variable = %name, error = %err, "skipping unknown variable");
                }
            }
        }

        let mut controllers = Vec::new();
        for variable in Variable::iter() {
            let Some(entry) = by_variable.get(&variable).copied() else {
                continue;
            };
            let params = lower_params(variable, entry)?;
            info!(
                variable = %variable,
                strategy = ?entry.strategy,
                enabled = entry.enabled,
                "registered variable controller"
            );
            controllers.push(VariableController::new(
                variable,
                entry.enabled,
                params,
                relay.clone(),
            ));
        }

        if controllers.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(controllers)
    }
}

fn invalid(
    variable: Variable,
    field: &'static str,
    reason: impl Into<String>,
) -> RegistryError {
    RegistryError::InvalidConfiguration {
        variable,
        field,
        reason: reason.into(),
    }
}

fn lower_params(
    variable: Variable,
    cfg: &ControlConfig,
) -> Result<StrategyParams, RegistryError> {
    match cfg.strategy {
        ControlStrategy::Disabled => Ok(StrategyParams::Disabled),
        ControlStrategy::Threshold => lower_threshold(variable, cfg),
        ControlStrategy::Frequency => lower_frequency(variable, cfg),
        ControlStrategy::Schedule => lower_schedule(variable, cfg),
    }
}

fn lower_threshold(
    variable: Variable,
    cfg: &ControlConfig,
) -> Result<StrategyParams, RegistryError> {
    let min = match cfg.min_threshold {
        Some(threshold) => Some(ThresholdSideParams {
            threshold,
            channel: cfg
                .min_channel
                .ok_or_else(|| invalid(variable, "min_channel", "required with min_threshold"))?,
            device: cfg
                .min_device
                .clone()
                .ok_or_else(|| invalid(variable, "min_device", "required with min_threshold"))?,
        }),
        None => None,
    };
    let max = match cfg.max_threshold {
        Some(threshold) => Some(ThresholdSideParams {
            threshold,
            channel: cfg
                .max_channel
                .ok_or_else(|| invalid(variable, "max_channel", "required with max_threshold"))?,
            device: cfg
                .max_device
                .clone()
                .ok_or_else(|| invalid(variable, "max_device", "required with max_threshold"))?,
        }),
        None => None,
    };

    if min.is_none() && max.is_none() {
        return Err(invalid(
            variable,
            "min_threshold",
            "threshold strategy needs at least one of min_threshold/max_threshold",
        ));
    }
    if let (Some(lo), Some(hi)) = (&min, &max) {
        if lo.threshold > hi.threshold {
            return Err(invalid(
                variable,
                "min_threshold",
                format!(
                    "min_threshold {} exceeds max_threshold {}",
                    lo.threshold, hi.threshold
                ),
            ));
        }
    }

    Ok(StrategyParams::Threshold(ThresholdParams {
        min,
        max,
        hold_secs: cfg.hold_secs,
    }))
}

fn lower_frequency(
    variable: Variable,
    cfg: &ControlConfig,
) -> Result<StrategyParams, RegistryError> {
    let period_secs = cfg
        .period_secs
        .ok_or_else(|| invalid(variable, "period_secs", "required for frequency strategy"))?;
    if period_secs == 0 {
        return Err(invalid(variable, "period_secs", "must be greater than zero"));
    }
    let on_secs = cfg.on_duration_secs.ok_or_else(|| {
        invalid(variable, "on_duration_secs", "required for frequency strategy")
    })?;
    if on_secs > period_secs {
        return Err(invalid(
            variable,
            "on_duration_secs",
            format!("on duration {on_secs}s exceeds period {period_secs}s"),
        ));
    }
    Ok(StrategyParams::Frequency(FrequencyParams {
        period_secs,
        on_secs,
        start_offset_secs: cfg.start_offset_secs,
        channel: cfg
            .channel
            .ok_or_else(|| invalid(variable, "channel", "required for frequency strategy"))?,
        device: cfg
            .device
            .clone()
            .ok_or_else(|| invalid(variable, "device", "required for frequency strategy"))?,
    }))
}

fn lower_schedule(
    variable: Variable,
    cfg: &ControlConfig,
) -> Result<StrategyParams, RegistryError> {
    let on_hour = cfg
        .on_hour
        .ok_or_else(|| invalid(variable, "on_hour", "required for schedule strategy"))?;
    let off_hour = cfg
        .off_hour
        .ok_or_else(|| invalid(variable, "off_hour", "required for schedule strategy"))?;
    if on_hour > 23 {
        return Err(invalid(variable, "on_hour", "hour must be 0-23"));
    }
    if off_hour > 23 {
        return Err(invalid(variable, "off_hour", "hour must be 0-23"));
    }
    if on_hour >= off_hour {
        return Err(invalid(
            variable,
            "on_hour",
            format!("on_hour {on_hour} must precede off_hour {off_hour} (wrapping windows are not supported)"),
        ));
    }
    Ok(StrategyParams::Schedule(ScheduleParams {
        on_hour,
        off_hour,
        channel: cfg
            .channel
            .ok_or_else(|| invalid(variable, "channel", "required for schedule strategy"))?,
        device: cfg
            .device
            .clone()
            .ok_or_else(|| invalid(variable, "device", "required for schedule strategy"))?,
    }))
}
