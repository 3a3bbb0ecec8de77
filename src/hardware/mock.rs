//! Scripted hardware doubles for tests (and for the non-sim binary build).
//! Kept out of `#[cfg(test)]` so integration tests can drive the loop with
//! them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use super::{DisplaySink, RelayError, RelayPort, Sensor, SensorError};
use crate::domain::SensorReading;

/// Sensor fed from a queue of pre-built readings. When the queue runs dry it
/// either repeats the last reading or fails, which is how tests exercise the
/// fatal sensor path.
pub struct QueueSensor {
    queue: Mutex<VecDeque<SensorReading>>,
    last: Mutex<Option<SensorReading>>,
    fail_when_empty: bool,
}

impl QueueSensor {
    pub fn new(readings: impl IntoIterator<Item = SensorReading>, fail_when_empty: bool) -> Self {
        Self {
            queue: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(None),
            fail_when_empty,
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl Sensor for QueueSensor {
    async fn read(&self) -> Result<SensorReading, SensorError> {
        if let Some(reading) = self.queue.lock().pop_front() {
            *self.last.lock() = Some(reading.clone());
            return Ok(reading);
        }
        if self.fail_when_empty {
            return Err(SensorError::Exhausted { attempts: 0 });
        }
        self.last
            .lock()
            .clone()
            .ok_or(SensorError::Exhausted { attempts: 0 })
    }

    async fn close(&self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// One relay command as seen by the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Energize {
        channel: u8,
        device: String,
        hold: Option<Duration>,
    },
    Deenergize {
        channel: u8,
        device: String,
    },
}

/// Records every command; selected channels can be made to fail their writes.
#[derive(Default)]
pub struct RecordingRelay {
    commands: Mutex<Vec<RelayCommand>>,
    failing: Mutex<HashSet<u8>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_channel(&self, channel: u8) {
        self.failing.lock().insert(channel);
    }

    pub fn commands(&self) -> Vec<RelayCommand> {
        self.commands.lock().clone()
    }

    pub fn energize_count(&self, channel: u8) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, RelayCommand::Energize { channel: ch, .. } if *ch == channel))
            .count()
    }

    pub fn deenergize_count(&self, channel: u8) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, RelayCommand::Deenergize { channel: ch, .. } if *ch == channel))
            .count()
    }

    fn check(&self, channel: u8) -> Result<(), RelayError> {
        if self.failing.lock().contains(&channel) {
            return Err(RelayError::Write {
                channel,
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RelayPort for RecordingRelay {
    async fn energize(
        &self,
        channel: u8,
        device: &str,
        hold: Option<Duration>,
    ) -> Result<(), RelayError> {
        self.check(channel)?;
        self.commands.lock().push(RelayCommand::Energize {
            channel,
            device: device.to_string(),
            hold,
        });
        Ok(())
    }

    async fn deenergize(&self, channel: u8, device: &str) -> Result<(), RelayError> {
        self.check(channel)?;
        self.commands.lock().push(RelayCommand::Deenergize {
            channel,
            device: device.to_string(),
        });
        Ok(())
    }
}

/// Display sink that keeps every reported line.
#[derive(Default)]
pub struct MemoryDisplay {
    lines: Mutex<Vec<String>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl DisplaySink for MemoryDisplay {
    fn report(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }
}
