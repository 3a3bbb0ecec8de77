//! Enclosure climate controller.
//!
//! Polls a combined environment sensor at a fixed interval and drives
//! relay-switched devices (fans, heaters, humidifiers, lights) to keep CO2,
//! temperature, humidity and light within configured bounds. Each variable is
//! governed by one of three strategies: threshold, frequency (duty cycle) or
//! schedule (hour-of-day window).

pub mod config;
pub mod controller;
pub mod domain;
pub mod hardware;
pub mod telemetry;
