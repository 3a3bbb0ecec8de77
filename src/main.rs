use anyhow::Result;
use climate_controller::{config::Config, controller, hardware, telemetry};
use controller::{ControlLoop, ControllerRegistry};
use hardware::{DisplaySink, RelayPort, Sensor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_tracing();

    let cfg = Config::load()?;

    #[cfg(feature = "sim")]
    let (sensor, relay, display): (Arc<dyn Sensor>, Arc<dyn RelayPort>, Arc<dyn DisplaySink>) = (
        Arc::new(hardware::sim::SimulatedSensor::new(
            cfg.general.sensor_max_attempts,
        )),
        Arc::new(hardware::sim::SimulatedRelay::new()),
        Arc::new(hardware::display::LcdDisplay::new()),
    );
    #[cfg(not(feature = "sim"))]
    let (sensor, relay, display): (Arc<dyn Sensor>, Arc<dyn RelayPort>, Arc<dyn DisplaySink>) = (
        Arc::new(hardware::mock::QueueSensor::new([], true)),
        Arc::new(hardware::mock::RecordingRelay::new()),
        Arc::new(hardware::display::LcdDisplay::new()),
    );

    let controllers = ControllerRegistry::build(&cfg, relay)?;
    info!(
        controllers = controllers.len(),
        poll_interval_secs = cfg.general.poll_interval_secs,
        "starting climate controller"
    );

    let mut control_loop = ControlLoop::new(
        sensor,
        display,
        controllers,
        Duration::from_secs(cfg.general.poll_interval_secs),
    );

    let stop = control_loop.stop_handle();
    tokio::spawn(async move {
        telemetry::shutdown_signal().await;
        stop.stop();
    });

    control_loop.run().await?;
    warn!("shutdown complete");
    Ok(())
}
