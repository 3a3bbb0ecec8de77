//! The poll-evaluate-report cadence. One logical control task drives every
//! variable controller sequentially; devices may share the relay bus, so
//! evaluation is never parallel.

use chrono::{Local, Timelike};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::variable::VariableController;
use crate::hardware::{DisplaySink, Sensor, SensorError};

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("sensor failed beyond its retry budget")]
    Sensor(#[source] SensorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

/// Idempotent, thread-safe stop signal for a running loop.
#[derive(Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel();
    }
}

pub struct ControlLoop {
    sensor: Arc<dyn Sensor>,
    display: Arc<dyn DisplaySink>,
    controllers: Vec<VariableController>,
    poll_interval: Duration,
    cancel: CancellationToken,
    state: LoopState,
}

impl ControlLoop {
    pub fn new(
        sensor: Arc<dyn Sensor>,
        display: Arc<dyn DisplaySink>,
        controllers: Vec<VariableController>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            sensor,
            display,
            controllers,
            poll_interval,
            cancel: CancellationToken::new(),
            state: LoopState::Initializing,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.cancel.clone())
    }

    /// Request shutdown. Observed at the top of the next cycle so the current
    /// cycle's relay commands complete in order.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Drive the loop until stopped. Returns `Err` only for the fatal sensor
    /// path; a requested stop drains and returns `Ok`.
    pub async fn run(&mut self) -> Result<(), LoopError> {
        self.state = LoopState::Initializing;
        info!(
            controllers = self.controllers.len(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "initializing control loop"
        );
        self.display.report("Initializing climate control");

        // Warm-up reading: primes comparative state before any control.
        let warmup = match self.sensor.read().await {
            Ok(reading) => reading,
            Err(e) => {
                error!(error = %e, "sensor failed during warm-up");
                self.drain().await;
                return Err(LoopError::Sensor(e));
            }
        };
        for controller in &mut self.controllers {
            controller.prime(&warmup);
        }

        self.state = LoopState::Running;
        self.display.report("Climate control running");
        let mut last_summary = warmup.summary_line();
        let mut last_hour = Local::now().hour();

        loop {
            // Stop is observed here and only here, never mid-cycle.
            if self.cancel.is_cancelled() {
                info!("stop requested, draining");
                self.drain().await;
                return Ok(());
            }

            let reading = match self.sensor.read().await {
                Ok(reading) => reading,
                Err(e) => {
                    error!(error = %e, "sensor retry budget exhausted, draining");
                    self.drain().await;
                    return Err(LoopError::Sensor(e));
                }
            };

            let now = Local::now();
            for controller in &mut self.controllers {
                match controller.evaluate(&reading, now).await {
                    Ok(outcome) => {
                        if outcome.changed() {
                            debug!(
                                variable = %controller.variable(),
                                status = %controller.relay_status(),
                                "relay state changed"
                            );
                        }
                    }
                    // One variable's fault never stops the others.
                    Err(e) => {
                        error!(
                            variable = %controller.variable(),
                            error = %e,
                            "failed to process environment variable"
                        );
                    }
                }
            }

            let summary = reading.summary_line();
            let hour = now.hour();
            if summary != last_summary || hour != last_hour {
                info!(summary = %summary, "environment");
                self.display.report(&summary);
            }
            last_summary = summary;
            last_hour = hour;

            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One-way transition: release every relay, close the sensor, report the
    /// final state. Never re-enters `Running`.
    async fn drain(&mut self) {
        self.state = LoopState::Draining;
        warn!("draining control loop");
        self.display.report("De-initializing climate control");

        for controller in &mut self.controllers {
            if let Err(e) = controller.shutdown().await {
                error!(
                    variable = %controller.variable(),
                    error = %e,
                    "failed to release relay during drain"
                );
            }
        }

        if let Err(e) = self.sensor.close().await {
            warn!(error = %e, "sensor close failed");
        }

        self.display.report("Climate control offline");
        self.state = LoopState::Stopped;
        info!("control loop stopped");
    }
}
