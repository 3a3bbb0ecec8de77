//! Consumed hardware interfaces: the environment sensor, the relay board and
//! the display sink. The control core only ever talks to these traits; bus
//! access and driver details live behind them.

pub mod display;
pub mod mock;
pub mod sim;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::SensorReading;

/// Sensor-side errors. A `read` retries internally until fresh data is
/// available; running out of attempts is fatal to the control loop.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor bus I/O failed: {0}")]
    Bus(String),

    #[error("no fresh measurement after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("sensor is closed")]
    Closed,
}

/// Relay-side errors. These are contained per variable; a failed write leaves
/// the owning controller's status untouched.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay bus write failed on channel {channel}: {reason}")]
    Write { channel: u8, reason: String },

    #[error("relay channel {0} out of range (1-{max})", max = RELAY_CHANNELS)]
    BadChannel(u8),
}

/// Number of addressable channels on the relay board.
pub const RELAY_CHANNELS: u8 = 8;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Blocks until a fresh reading is available, bounded by the backend's
    /// retry budget.
    async fn read(&self) -> Result<SensorReading, SensorError>;

    async fn close(&self) -> Result<(), SensorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayPort: Send + Sync {
    /// Energize one channel. When `hold` is given the backend keeps the
    /// channel powered for at least that long; callers track the deadline
    /// themselves and must not issue conflicting commands while it runs.
    async fn energize(
        &self,
        channel: u8,
        device: &str,
        hold: Option<Duration>,
    ) -> Result<(), RelayError>;

    async fn deenergize(&self, channel: u8, device: &str) -> Result<(), RelayError>;
}

/// Best-effort text output. Failures must never reach control logic, so the
/// interface is infallible by construction.
pub trait DisplaySink: Send + Sync {
    fn report(&self, text: &str);
}
