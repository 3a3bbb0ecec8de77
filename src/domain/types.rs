use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// A monitored environmental quantity. The set is fixed at startup;
/// configuration refers to variables by their snake_case names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Variable {
    Co2,
    TempF,
    TempC,
    Humidity,
    Light,
}

impl Variable {
    /// Unit suffix used in display/log output.
    pub fn unit(&self) -> &'static str {
        match self {
            Variable::Co2 => "ppm",
            Variable::TempF => "F",
            Variable::TempC => "C",
            Variable::Humidity => "%RH",
            Variable::Light => "",
        }
    }

    /// Decimal places used when rendering this variable.
    pub fn display_precision(&self) -> usize {
        match self {
            Variable::Co2 => 0,
            _ => 1,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Variable::Co2 => "CO2",
            Variable::TempF => "Temp Fahrenheit",
            Variable::TempC => "Temp Celsius",
            Variable::Humidity => "Humidity",
            Variable::Light => "Light",
        }
    }
}

/// The controller's belief about a relay channel's physical state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayState {
    #[default]
    Off,
    On,
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayState::Off => write!(f, "off"),
            RelayState::On => write!(f, "on"),
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Snapshot of measured values for one poll cycle. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    taken_at: DateTime<Utc>,
    values: BTreeMap<Variable, f64>,
}

impl SensorReading {
    pub fn new(taken_at: DateTime<Utc>, values: BTreeMap<Variable, f64>) -> Self {
        Self { taken_at, values }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn value(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied()
    }

    /// One-line rendering for the display and the cycle log,
    /// e.g. `812ppm 72.5F 54.1%RH`.
    pub fn summary_line(&self) -> String {
        let mut parts = Vec::new();
        for variable in Variable::iter() {
            if let Some(value) = self.value(variable) {
                parts.push(format!(
                    "{value:.prec$}{unit}",
                    prec = variable.display_precision(),
                    unit = variable.unit(),
                ));
            }
        }
        parts.join(" ")
    }
}

/// Result of one controller evaluation, consumed by the control loop for
/// logging and telemetry only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlOutcome {
    /// Controller is disabled; comparative state was still updated.
    Skipped {
        variable: Variable,
        value: Option<f64>,
    },
    Evaluated {
        variable: Variable,
        old_status: RelayState,
        new_status: RelayState,
        value: Option<f64>,
    },
}

impl ControlOutcome {
    pub fn variable(&self) -> Variable {
        match self {
            ControlOutcome::Skipped { variable, .. } => *variable,
            ControlOutcome::Evaluated { variable, .. } => *variable,
        }
    }

    /// Whether this evaluation flipped the relay.
    pub fn changed(&self) -> bool {
        match self {
            ControlOutcome::Skipped { .. } => false,
            ControlOutcome::Evaluated {
                old_status,
                new_status,
                ..
            } => old_status != new_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn variable_names_round_trip() {
        assert_eq!(Variable::from_str("co2").unwrap(), Variable::Co2);
        assert_eq!(Variable::from_str("temp_f").unwrap(), Variable::TempF);
        assert_eq!(Variable::from_str("humidity").unwrap(), Variable::Humidity);
        assert!(Variable::from_str("oxygen").is_err());
        assert_eq!(Variable::TempC.to_string(), "temp_c");
    }

    #[test]
    fn reading_serializes_with_snake_case_keys() {
        let mut values = BTreeMap::new();
        values.insert(Variable::Co2, 812.0);
        values.insert(Variable::TempF, 72.5);
        let reading = SensorReading::new(Utc.timestamp_opt(0, 0).unwrap(), values);

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["values"]["co2"], 812.0);
        assert_eq!(json["values"]["temp_f"], 72.5);
    }

    #[test]
    fn summary_line_orders_and_formats_values() {
        let mut values = BTreeMap::new();
        values.insert(Variable::Humidity, 54.13);
        values.insert(Variable::Co2, 812.4);
        values.insert(Variable::TempF, 72.51);
        let reading = SensorReading::new(Utc::now(), values);

        assert_eq!(reading.summary_line(), "812ppm 72.5F 54.1%RH");
    }

    #[test]
    fn temperature_conversion() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < f64::EPSILON);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < f64::EPSILON);
    }

    #[test]
    fn outcome_change_detection() {
        let flipped = ControlOutcome::Evaluated {
            variable: Variable::Co2,
            old_status: RelayState::Off,
            new_status: RelayState::On,
            value: Some(1500.0),
        };
        assert!(flipped.changed());

        let skipped = ControlOutcome::Skipped {
            variable: Variable::Light,
            value: None,
        };
        assert!(!skipped.changed());
    }
}
