//! Simulated hardware backends. These stand in for the SCD4x monitor and the
//! relay board so the whole loop can run on a development machine.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{RelayError, RelayPort, Sensor, SensorError, RELAY_CHANNELS};
use crate::domain::{celsius_to_fahrenheit, SensorReading, Variable};

struct SimSensorState {
    rng: StdRng,
    co2_ppm: f64,
    temp_c: f64,
    humidity_rh: f64,
}

/// Random-walk environment sensor. Values drift within plausible grow-room
/// ranges; Fahrenheit is derived from Celsius like the real monitor does.
pub struct SimulatedSensor {
    state: Mutex<SimSensorState>,
    max_attempts: u32,
    closed: AtomicBool,
}

impl SimulatedSensor {
    pub fn new(max_attempts: u32) -> Self {
        Self::with_seed(max_attempts, rand::random())
    }

    pub fn with_seed(max_attempts: u32, seed: u64) -> Self {
        Self {
            state: Mutex::new(SimSensorState {
                rng: StdRng::seed_from_u64(seed),
                co2_ppm: 800.0,
                temp_c: 22.0,
                humidity_rh: 55.0,
            }),
            max_attempts: max_attempts.max(1),
            closed: AtomicBool::new(false),
        }
    }

    fn sample(&self) -> SensorReading {
        let mut st = self.state.lock();
        let co2_step = st.rng.gen_range(-25.0..25.0);
        let temp_step = st.rng.gen_range(-0.2..0.2);
        let humidity_step = st.rng.gen_range(-0.5..0.5);

        st.co2_ppm = (st.co2_ppm + co2_step).clamp(350.0, 4000.0);
        st.temp_c = (st.temp_c + temp_step).clamp(5.0, 45.0);
        st.humidity_rh = (st.humidity_rh + humidity_step).clamp(20.0, 99.0);

        let mut values = BTreeMap::new();
        values.insert(Variable::Co2, st.co2_ppm);
        values.insert(Variable::TempC, st.temp_c);
        values.insert(Variable::TempF, celsius_to_fahrenheit(st.temp_c));
        values.insert(Variable::Humidity, st.humidity_rh);
        SensorReading::new(Utc::now(), values)
    }

    /// The real monitor reports data-ready roughly once per measurement
    /// period; model that as an occasional not-ready poll.
    fn data_ready(&self) -> bool {
        self.state.lock().rng.gen_bool(0.95)
    }
}

#[async_trait]
impl Sensor for SimulatedSensor {
    async fn read(&self) -> Result<SensorReading, SensorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SensorError::Closed);
        }

        for _ in 0..self.max_attempts {
            if self.data_ready() {
                return Ok(self.sample());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Err(SensorError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    async fn close(&self) -> Result<(), SensorError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Relay board modelled as a single 8-bit register, one bit per channel.
/// The register is owned here; controllers only ever address channels.
pub struct SimulatedRelay {
    register: Mutex<u8>,
}

impl SimulatedRelay {
    pub fn new() -> Self {
        Self {
            register: Mutex::new(0),
        }
    }

    /// Current bus register value, for inspection in tests.
    pub fn register(&self) -> u8 {
        *self.register.lock()
    }

    fn check_channel(channel: u8) -> Result<(), RelayError> {
        if channel == 0 || channel > RELAY_CHANNELS {
            return Err(RelayError::BadChannel(channel));
        }
        Ok(())
    }
}

impl Default for SimulatedRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayPort for SimulatedRelay {
    async fn energize(
        &self,
        channel: u8,
        device: &str,
        hold: Option<Duration>,
    ) -> Result<(), RelayError> {
        Self::check_channel(channel)?;
        let register = {
            let mut reg = self.register.lock();
            *reg |= 1 << (channel - 1);
            *reg
        };
        info!(channel, device, register, "enabling relay channel");

        if let Some(hold) = hold {
            // Detached minimum-hold pulse. The owning controller tracks the
            // deadline and will not touch this channel while it runs.
            let device = device.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(hold).await;
                debug!(channel, device, "relay hold elapsed");
            });
        }
        Ok(())
    }

    async fn deenergize(&self, channel: u8, device: &str) -> Result<(), RelayError> {
        Self::check_channel(channel)?;
        let register = {
            let mut reg = self.register.lock();
            *reg &= !(1 << (channel - 1));
            *reg
        };
        info!(channel, device, register, "disabling relay channel");
        Ok(())
    }
}
