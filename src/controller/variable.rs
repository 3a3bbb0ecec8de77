//! Per-variable controller: one instance owns one environmental variable's
//! strategy parameters and temporal state, and decides the relay action for
//! each polling cycle.

use chrono::{DateTime, Duration as ChronoDuration, Local, Timelike};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{ControlOutcome, RelayState, SensorReading, Variable};
use crate::hardware::{RelayError, RelayPort};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("reading carries no value for {0}")]
    MissingVariable(Variable),

    #[error("relay command failed for {variable}")]
    Relay {
        variable: Variable,
        #[source]
        source: RelayError,
    },
}

/// Which threshold bound armed the relay. Min and max drive different
/// physical devices (e.g. humidifier vs dehumidifier), so deactivation must
/// address the side that was energized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdSide {
    Min,
    Max,
}

impl std::fmt::Display for ThresholdSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdSide::Min => write!(f, "min"),
            ThresholdSide::Max => write!(f, "max"),
        }
    }
}

/// One armed bound of a threshold strategy: the trigger value and the relay
/// channel/device it drives.
#[derive(Debug, Clone)]
pub struct ThresholdSideParams {
    pub threshold: f64,
    pub channel: u8,
    pub device: String,
}

#[derive(Debug, Clone)]
pub struct ThresholdParams {
    pub min: Option<ThresholdSideParams>,
    pub max: Option<ThresholdSideParams>,
    /// Minimum-on hold; while it runs, on/off transitions are suppressed.
    pub hold_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FrequencyParams {
    pub period_secs: u64,
    pub on_secs: u64,
    pub start_offset_secs: Option<u64>,
    pub channel: u8,
    pub device: String,
}

#[derive(Debug, Clone)]
pub struct ScheduleParams {
    /// Device is on during the half-open window `[on_hour, off_hour)`.
    pub on_hour: u32,
    pub off_hour: u32,
    pub channel: u8,
    pub device: String,
}

/// Validated strategy parameters, produced by the registry.
#[derive(Debug, Clone)]
pub enum StrategyParams {
    Threshold(ThresholdParams),
    Frequency(FrequencyParams),
    Schedule(ScheduleParams),
    Disabled,
}

/// Live state owned exclusively by one controller.
#[derive(Debug, Default)]
struct ControllerState {
    relay_status: RelayState,
    last_value: Option<f64>,
    activation_started_at: Option<DateTime<Local>>,
    /// Deadline form of the pending-release flag: transitions are suppressed
    /// while `now < hold_until`.
    hold_until: Option<DateTime<Local>>,
    active_side: Option<ThresholdSide>,
    started_at: Option<DateTime<Local>>,
}

pub struct VariableController {
    variable: Variable,
    enabled: bool,
    params: StrategyParams,
    relay: Arc<dyn RelayPort>,
    state: ControllerState,
}

// The relay handle is opaque; everything else prints.
impl std::fmt::Debug for VariableController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableController")
            .field("variable", &self.variable)
            .field("enabled", &self.enabled)
            .field("params", &self.params)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl VariableController {
    pub fn new(
        variable: Variable,
        enabled: bool,
        params: StrategyParams,
        relay: Arc<dyn RelayPort>,
    ) -> Self {
        Self {
            variable,
            enabled,
            params,
            relay,
            state: ControllerState::default(),
        }
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn relay_status(&self) -> RelayState {
        self.state.relay_status
    }

    pub fn last_value(&self) -> Option<f64> {
        self.state.last_value
    }

    /// Record the warm-up value without driving hardware.
    pub fn prime(&mut self, reading: &SensorReading) {
        if let Some(value) = reading.value(self.variable) {
            self.state.last_value = Some(value);
        }
    }

    /// Evaluate one polling cycle and issue at most one relay command.
    pub async fn evaluate(
        &mut self,
        reading: &SensorReading,
        now: DateTime<Local>,
    ) -> Result<ControlOutcome, ControlError> {
        if self.state.started_at.is_none() {
            self.state.started_at = Some(now);
        }

        let value = reading.value(self.variable);

        if !self.enabled || matches!(self.params, StrategyParams::Disabled) {
            // Disabled controllers still track the value so deviations stay
            // visible in the logs.
            if value.is_some() {
                self.state.last_value = value;
            }
            return Ok(ControlOutcome::Skipped {
                variable: self.variable,
                value,
            });
        }

        let old_status = self.state.relay_status;
        let params = self.params.clone();
        match params {
            StrategyParams::Threshold(p) => {
                let value = value.ok_or(ControlError::MissingVariable(self.variable))?;
                self.control_threshold(&p, value, now).await?;
            }
            StrategyParams::Frequency(p) => self.control_frequency(&p, now).await?,
            StrategyParams::Schedule(p) => self.control_schedule(&p, now).await?,
            StrategyParams::Disabled => unreachable!("handled above"),
        }

        if value.is_some() {
            self.state.last_value = value;
        }
        Ok(ControlOutcome::Evaluated {
            variable: self.variable,
            old_status,
            new_status: self.state.relay_status,
            value,
        })
    }

    /// Process-exit safety net: release the active channel unconditionally,
    /// hold or not.
    pub async fn shutdown(&mut self) -> Result<(), ControlError> {
        if self.state.relay_status != RelayState::On {
            return Ok(());
        }
        let Some((channel, device)) = self.active_channel() else {
            return Ok(());
        };
        info!(variable = %self.variable, channel, "releasing relay on shutdown");
        self.deenergize(channel, &device).await?;
        self.state.relay_status = RelayState::Off;
        self.state.active_side = None;
        self.state.hold_until = None;
        Ok(())
    }

    fn pending_release(&self, now: DateTime<Local>) -> bool {
        self.state.hold_until.is_some_and(|until| now < until)
    }

    /// Channel currently believed energized, with its device name.
    fn active_channel(&self) -> Option<(u8, String)> {
        match &self.params {
            StrategyParams::Threshold(p) => {
                let side = match self.state.active_side? {
                    ThresholdSide::Min => p.min.as_ref(),
                    ThresholdSide::Max => p.max.as_ref(),
                };
                side.map(|s| (s.channel, s.device.clone()))
            }
            StrategyParams::Frequency(p) => Some((p.channel, p.device.clone())),
            StrategyParams::Schedule(p) => Some((p.channel, p.device.clone())),
            StrategyParams::Disabled => None,
        }
    }

    async fn control_threshold(
        &mut self,
        p: &ThresholdParams,
        value: f64,
        now: DateTime<Local>,
    ) -> Result<(), ControlError> {
        // An active minimum-on hold outranks threshold state entirely,
        // in both directions, to prevent chattering.
        if self.pending_release(now) {
            debug!(variable = %self.variable, "hold pending, skipping evaluation");
            return Ok(());
        }

        let armed = armed_side(p, value);

        match (armed, self.state.relay_status) {
            (Some((side, sp)), RelayState::Off) => {
                // This only fires on the Off->On edge, so one warning per
                // breach episode.
                match side {
                    ThresholdSide::Min => warn!(
                        variable = %self.variable,
                        value,
                        threshold = sp.threshold,
                        unit = self.variable.unit(),
                        "{} has dropped below its minimum threshold",
                        self.variable.description(),
                    ),
                    ThresholdSide::Max => warn!(
                        variable = %self.variable,
                        value,
                        threshold = sp.threshold,
                        unit = self.variable.unit(),
                        "{} has risen above its maximum threshold",
                        self.variable.description(),
                    ),
                }

                let hold = p.hold_secs.map(Duration::from_secs);
                self.energize(sp.channel, &sp.device, hold).await?;
                self.state.relay_status = RelayState::On;
                self.state.active_side = Some(side);
                self.state.activation_started_at = Some(now);
                if let Some(hold_secs) = p.hold_secs {
                    self.state.hold_until =
                        Some(now + ChronoDuration::seconds(hold_secs as i64));
                }
            }
            // The armed side flipped while the relay is on (min device
            // running, value now past the max bound, or vice versa). Release
            // the stale side now; the newly armed side energizes on the next
            // cycle, so at most one command is issued per evaluation.
            (Some((side, _)), RelayState::On) if Some(side) != self.state.active_side => {
                if let Some((channel, device)) = self.active_channel() {
                    self.deenergize(channel, &device).await?;
                }
                self.state.relay_status = RelayState::Off;
                self.state.active_side = None;
            }
            (None, RelayState::On) => {
                if let Some((channel, device)) = self.active_channel() {
                    self.deenergize(channel, &device).await?;
                }
                self.state.relay_status = RelayState::Off;
                self.state.active_side = None;
            }
            _ => {}
        }
        Ok(())
    }

    async fn control_frequency(
        &mut self,
        p: &FrequencyParams,
        now: DateTime<Local>,
    ) -> Result<(), ControlError> {
        if let Some(offset) = p.start_offset_secs {
            let started = self.state.started_at.unwrap_or(now);
            if (now - started).num_seconds() < offset as i64 {
                return Ok(());
            }
        }

        match self.state.relay_status {
            RelayState::Off => {
                let due = match self.state.activation_started_at {
                    None => true,
                    Some(started) => (now - started).num_seconds() >= p.period_secs as i64,
                };
                if due {
                    self.energize(p.channel, &p.device, Some(Duration::from_secs(p.on_secs)))
                        .await?;
                    self.state.relay_status = RelayState::On;
                    self.state.activation_started_at = Some(now);
                }
            }
            RelayState::On => {
                let done = self
                    .state
                    .activation_started_at
                    .is_some_and(|started| (now - started).num_seconds() >= p.on_secs as i64);
                if done {
                    self.deenergize(p.channel, &p.device).await?;
                    self.state.relay_status = RelayState::Off;
                }
            }
        }
        Ok(())
    }

    async fn control_schedule(
        &mut self,
        p: &ScheduleParams,
        now: DateTime<Local>,
    ) -> Result<(), ControlError> {
        let hour = now.hour();
        let in_window = p.on_hour <= hour && hour < p.off_hour;

        match (in_window, self.state.relay_status) {
            (true, RelayState::Off) => {
                self.energize(p.channel, &p.device, None).await?;
                self.state.relay_status = RelayState::On;
            }
            (false, RelayState::On) => {
                self.deenergize(p.channel, &p.device).await?;
                self.state.relay_status = RelayState::Off;
            }
            _ => {}
        }
        Ok(())
    }

    async fn energize(
        &self,
        channel: u8,
        device: &str,
        hold: Option<Duration>,
    ) -> Result<(), ControlError> {
        self.relay
            .energize(channel, device, hold)
            .await
            .map_err(|source| ControlError::Relay {
                variable: self.variable,
                source,
            })
    }

    async fn deenergize(&self, channel: u8, device: &str) -> Result<(), ControlError> {
        self.relay
            .deenergize(channel, device)
            .await
            .map_err(|source| ControlError::Relay {
                variable: self.variable,
                source,
            })
    }
}

/// Which side, if any, a value arms. Minimum is checked first: when both
/// bounds are somehow breached at once, the min side wins.
fn armed_side(p: &ThresholdParams, value: f64) -> Option<(ThresholdSide, &ThresholdSideParams)> {
    if let Some(m) = p.min.as_ref().filter(|m| value <= m.threshold) {
        return Some((ThresholdSide::Min, m));
    }
    if let Some(m) = p.max.as_ref().filter(|m| value >= m.threshold) {
        return Some((ThresholdSide::Max, m));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{RecordingRelay, RelayCommand};
    use crate::hardware::MockRelayPort;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn at_hour(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn reading(pairs: &[(Variable, f64)]) -> SensorReading {
        let values: BTreeMap<Variable, f64> = pairs.iter().copied().collect();
        SensorReading::new(chrono::Utc::now(), values)
    }

    fn co2_threshold_params() -> StrategyParams {
        StrategyParams::Threshold(ThresholdParams {
            min: Some(ThresholdSideParams {
                threshold: 400.0,
                channel: 1,
                device: "co2 generator".into(),
            }),
            max: Some(ThresholdSideParams {
                threshold: 1200.0,
                channel: 2,
                device: "exhaust fan".into(),
            }),
            hold_secs: None,
        })
    }

    fn controller(params: StrategyParams, relay: Arc<RecordingRelay>) -> VariableController {
        VariableController::new(Variable::Co2, true, params, relay)
    }

    #[rstest]
    #[case::below_min(350.0, Some(1))]
    #[case::at_min(400.0, Some(1))]
    #[case::in_band(800.0, None)]
    #[case::at_max(1200.0, Some(2))]
    #[case::above_max(1500.0, Some(2))]
    #[tokio::test]
    async fn threshold_arms_the_right_side(
        #[case] value: f64,
        #[case] expect_channel: Option<u8>,
    ) {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl = controller(co2_threshold_params(), relay.clone());

        let outcome = ctl
            .evaluate(&reading(&[(Variable::Co2, value)]), at_hour(12))
            .await
            .unwrap();

        match expect_channel {
            Some(channel) => {
                assert_eq!(ctl.relay_status(), RelayState::On);
                assert_eq!(relay.energize_count(channel), 1);
                assert!(outcome.changed());
            }
            None => {
                assert_eq!(ctl.relay_status(), RelayState::Off);
                assert!(relay.commands().is_empty());
                assert!(!outcome.changed());
            }
        }
    }

    #[tokio::test]
    async fn breach_energizes_once_per_episode() {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl = controller(co2_threshold_params(), relay.clone());
        let breached = reading(&[(Variable::Co2, 1500.0)]);

        let now = at_hour(12);
        ctl.evaluate(&breached, now).await.unwrap();
        // Still breached on later cycles: no further hardware writes.
        ctl.evaluate(&breached, now + ChronoDuration::seconds(5))
            .await
            .unwrap();
        ctl.evaluate(&breached, now + ChronoDuration::seconds(10))
            .await
            .unwrap();

        assert_eq!(relay.energize_count(2), 1);
        assert_eq!(relay.commands().len(), 1);
    }

    #[tokio::test]
    async fn evaluate_is_idempotent_with_no_elapsed_time() {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl = controller(co2_threshold_params(), relay.clone());
        let breached = reading(&[(Variable::Co2, 350.0)]);

        let now = at_hour(12);
        ctl.evaluate(&breached, now).await.unwrap();
        ctl.evaluate(&breached, now).await.unwrap();

        assert_eq!(relay.commands().len(), 1);
    }

    #[tokio::test]
    async fn recovery_releases_the_side_that_was_energized() {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl = controller(co2_threshold_params(), relay.clone());

        let now = at_hour(12);
        ctl.evaluate(&reading(&[(Variable::Co2, 350.0)]), now)
            .await
            .unwrap();
        ctl.evaluate(
            &reading(&[(Variable::Co2, 800.0)]),
            now + ChronoDuration::seconds(5),
        )
        .await
        .unwrap();

        // Min side was energized; the min channel, not the max channel,
        // must be released.
        assert_eq!(
            relay.commands(),
            vec![
                RelayCommand::Energize {
                    channel: 1,
                    device: "co2 generator".into(),
                    hold: None,
                },
                RelayCommand::Deenergize {
                    channel: 1,
                    device: "co2 generator".into(),
                },
            ]
        );
        assert_eq!(ctl.relay_status(), RelayState::Off);
    }

    #[tokio::test]
    async fn hold_suppresses_transitions_until_expiry() {
        let relay = Arc::new(RecordingRelay::new());
        let params = StrategyParams::Threshold(ThresholdParams {
            min: None,
            max: Some(ThresholdSideParams {
                threshold: 60.0,
                channel: 4,
                device: "dehumidifier".into(),
            }),
            hold_secs: Some(60),
        });
        let mut ctl = VariableController::new(Variable::Humidity, true, params, relay.clone());

        let t0 = at_hour(12);
        ctl.evaluate(&reading(&[(Variable::Humidity, 70.0)]), t0)
            .await
            .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);

        // Back in band inside the hold window: no release yet.
        ctl.evaluate(
            &reading(&[(Variable::Humidity, 50.0)]),
            t0 + ChronoDuration::seconds(30),
        )
        .await
        .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);
        assert_eq!(relay.commands().len(), 1);

        // First cycle past the hold releases it.
        ctl.evaluate(
            &reading(&[(Variable::Humidity, 50.0)]),
            t0 + ChronoDuration::seconds(61),
        )
        .await
        .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::Off);
        assert_eq!(relay.deenergize_count(4), 1);
    }

    #[tokio::test]
    async fn armed_side_flip_releases_the_stale_side() {
        let relay = Arc::new(RecordingRelay::new());
        let params = StrategyParams::Threshold(ThresholdParams {
            min: Some(ThresholdSideParams {
                threshold: 45.0,
                channel: 4,
                device: "humidifier".into(),
            }),
            max: Some(ThresholdSideParams {
                threshold: 60.0,
                channel: 5,
                device: "dehumidifier".into(),
            }),
            hold_secs: Some(300),
        });
        let mut ctl = VariableController::new(Variable::Humidity, true, params, relay.clone());

        // Floor breach energizes the humidifier under a hold.
        let t0 = at_hour(9);
        ctl.evaluate(&reading(&[(Variable::Humidity, 30.0)]), t0)
            .await
            .unwrap();
        assert_eq!(relay.energize_count(4), 1);

        // Overshoot past the ceiling inside the hold: still suppressed.
        ctl.evaluate(
            &reading(&[(Variable::Humidity, 75.0)]),
            t0 + ChronoDuration::seconds(100),
        )
        .await
        .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);
        assert_eq!(relay.commands().len(), 1);

        // Hold expired, ceiling still breached: the humidifier is released
        // first, then the dehumidifier starts on the following cycle.
        ctl.evaluate(
            &reading(&[(Variable::Humidity, 80.0)]),
            t0 + ChronoDuration::seconds(301),
        )
        .await
        .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::Off);
        assert_eq!(relay.deenergize_count(4), 1);

        ctl.evaluate(
            &reading(&[(Variable::Humidity, 80.0)]),
            t0 + ChronoDuration::seconds(302),
        )
        .await
        .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);
        assert_eq!(
            relay.commands(),
            vec![
                RelayCommand::Energize {
                    channel: 4,
                    device: "humidifier".into(),
                    hold: Some(Duration::from_secs(300)),
                },
                RelayCommand::Deenergize {
                    channel: 4,
                    device: "humidifier".into(),
                },
                RelayCommand::Energize {
                    channel: 5,
                    device: "dehumidifier".into(),
                    hold: Some(Duration::from_secs(300)),
                },
            ]
        );
    }

    #[tokio::test]
    async fn threshold_requires_a_value() {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl = controller(co2_threshold_params(), relay.clone());

        let err = ctl
            .evaluate(&reading(&[(Variable::Humidity, 50.0)]), at_hour(12))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::MissingVariable(Variable::Co2)));
        assert!(relay.commands().is_empty());
    }

    #[tokio::test]
    async fn disabled_controller_tracks_value_without_hardware() {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl =
            VariableController::new(Variable::Co2, false, co2_threshold_params(), relay.clone());

        let outcome = ctl
            .evaluate(&reading(&[(Variable::Co2, 1500.0)]), at_hour(12))
            .await
            .unwrap();

        assert!(matches!(outcome, ControlOutcome::Skipped { .. }));
        assert_eq!(ctl.last_value(), Some(1500.0));
        assert!(relay.commands().is_empty());
    }

    #[tokio::test]
    async fn relay_failure_leaves_status_unchanged() {
        let mut relay = MockRelayPort::new();
        relay.expect_energize().returning(|channel, _, _| {
            Err(RelayError::Write {
                channel,
                reason: "bus fault".into(),
            })
        });
        let mut ctl = VariableController::new(
            Variable::Co2,
            true,
            co2_threshold_params(),
            Arc::new(relay),
        );

        let err = ctl
            .evaluate(&reading(&[(Variable::Co2, 1500.0)]), at_hour(12))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControlError::Relay {
                variable: Variable::Co2,
                ..
            }
        ));
        assert_eq!(ctl.relay_status(), RelayState::Off);
    }

    #[tokio::test]
    async fn frequency_duty_cycle() {
        let relay = Arc::new(RecordingRelay::new());
        let params = StrategyParams::Frequency(FrequencyParams {
            period_secs: 3600,
            on_secs: 300,
            start_offset_secs: None,
            channel: 5,
            device: "mister".into(),
        });
        let mut ctl = VariableController::new(Variable::Humidity, true, params, relay.clone());
        let r = reading(&[(Variable::Humidity, 50.0)]);
        let t0 = at_hour(10);

        ctl.evaluate(&r, t0).await.unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);

        ctl.evaluate(&r, t0 + ChronoDuration::seconds(299))
            .await
            .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);

        ctl.evaluate(&r, t0 + ChronoDuration::seconds(300))
            .await
            .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::Off);

        // Stays off until a full period has passed since activation.
        ctl.evaluate(&r, t0 + ChronoDuration::seconds(3599))
            .await
            .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::Off);

        ctl.evaluate(&r, t0 + ChronoDuration::seconds(3600))
            .await
            .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);

        assert_eq!(relay.energize_count(5), 2);
        assert_eq!(relay.deenergize_count(5), 1);
    }

    #[tokio::test]
    async fn frequency_respects_start_offset() {
        let relay = Arc::new(RecordingRelay::new());
        let params = StrategyParams::Frequency(FrequencyParams {
            period_secs: 3600,
            on_secs: 300,
            start_offset_secs: Some(600),
            channel: 5,
            device: "mister".into(),
        });
        let mut ctl = VariableController::new(Variable::Humidity, true, params, relay.clone());
        let r = reading(&[]);
        let t0 = at_hour(10);

        ctl.evaluate(&r, t0).await.unwrap();
        ctl.evaluate(&r, t0 + ChronoDuration::seconds(599))
            .await
            .unwrap();
        assert!(relay.commands().is_empty());

        ctl.evaluate(&r, t0 + ChronoDuration::seconds(600))
            .await
            .unwrap();
        assert_eq!(ctl.relay_status(), RelayState::On);
    }

    #[rstest]
    #[case(7, RelayState::Off)]
    #[case(8, RelayState::On)]
    #[case(13, RelayState::On)]
    #[case(19, RelayState::On)]
    #[case(20, RelayState::Off)]
    #[case(23, RelayState::Off)]
    #[tokio::test]
    async fn schedule_follows_the_hour_window(#[case] hour: u32, #[case] expected: RelayState) {
        let relay = Arc::new(RecordingRelay::new());
        let params = StrategyParams::Schedule(ScheduleParams {
            on_hour: 8,
            off_hour: 20,
            channel: 3,
            device: "grow light".into(),
        });
        let mut ctl = VariableController::new(Variable::Light, true, params, relay.clone());

        ctl.evaluate(&reading(&[]), at_hour(hour)).await.unwrap();
        assert_eq!(ctl.relay_status(), expected);
    }

    #[tokio::test]
    async fn schedule_transitions_on_the_window_edges() {
        let relay = Arc::new(RecordingRelay::new());
        let params = StrategyParams::Schedule(ScheduleParams {
            on_hour: 8,
            off_hour: 20,
            channel: 3,
            device: "grow light".into(),
        });
        let mut ctl = VariableController::new(Variable::Light, true, params, relay.clone());
        let r = reading(&[]);

        ctl.evaluate(&r, at_hour(7)).await.unwrap();
        assert!(relay.commands().is_empty());

        ctl.evaluate(&r, at_hour(8)).await.unwrap();
        assert_eq!(relay.energize_count(3), 1);

        // Mid-window cycles issue nothing new.
        ctl.evaluate(&r, at_hour(12)).await.unwrap();
        assert_eq!(relay.commands().len(), 1);

        ctl.evaluate(&r, at_hour(20)).await.unwrap();
        assert_eq!(relay.deenergize_count(3), 1);
    }

    #[tokio::test]
    async fn shutdown_releases_only_when_on() {
        let relay = Arc::new(RecordingRelay::new());
        let mut ctl = controller(co2_threshold_params(), relay.clone());

        ctl.shutdown().await.unwrap();
        assert!(relay.commands().is_empty());

        ctl.evaluate(&reading(&[(Variable::Co2, 1500.0)]), at_hour(12))
            .await
            .unwrap();
        ctl.shutdown().await.unwrap();
        assert_eq!(relay.deenergize_count(2), 1);
        assert_eq!(ctl.relay_status(), RelayState::Off);
    }

    #[test]
    fn debug_output_names_variable_and_strategy() {
        let ctl = controller(co2_threshold_params(), Arc::new(RecordingRelay::new()));
        let rendered = format!("{ctl:?}");
        assert!(rendered.contains("Co2"));
        assert!(rendered.contains("Threshold"));
    }

    proptest! {
        #[test]
        fn min_side_wins_whenever_the_floor_is_breached(
            min in 0.0f64..2000.0,
            max in 0.0f64..2000.0,
            value in 0.0f64..2000.0,
        ) {
            let params = ThresholdParams {
                min: Some(ThresholdSideParams {
                    threshold: min,
                    channel: 1,
                    device: "a".into(),
                }),
                max: Some(ThresholdSideParams {
                    threshold: max,
                    channel: 2,
                    device: "b".into(),
                }),
                hold_secs: None,
            };
            let armed = armed_side(&params, value).map(|(side, _)| side);
            if value <= min {
                prop_assert_eq!(armed, Some(ThresholdSide::Min));
            } else if value >= max {
                prop_assert_eq!(armed, Some(ThresholdSide::Max));
            } else {
                prop_assert_eq!(armed, None);
            }
        }
    }
}
