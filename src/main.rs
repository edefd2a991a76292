//! edgecam: camera classifier appliance with a live MJPEG stream

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use edgecam::capture::{CameraSensor, FrameSource, SyntheticSensor};
use edgecam::display::{DisplaySink, TerminalDisplay};
use edgecam::pipeline::affinity::pin_current_thread;
use edgecam::pipeline::{create_router, InferenceWorker, MeanColorClassifier, ServerState};
use edgecam::{CaptureConfig, Config, InitError, SensorKind};

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edgecam=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(std::io::stderr)
        .init();

    info!("edgecam launching...");

    // Load configuration
    let config_path = std::env::var_os("EDGECAM_CONFIG").map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Configuration failed: {}", e);
        eyre!(e)
    })?;

    pin_current_thread(config.pipeline.serving_core, "serving");

    // The status surface comes up first so later failures have somewhere to show.
    let mut display = TerminalDisplay::open(std::io::stdout(), &config.display).map_err(|e| {
        error!("{}", e);
        eyre!(e)
    })?;

    let sensor = build_sensor(&config.capture).map_err(|e| halt(&mut display, e))?;
    let source = FrameSource::initialize(&config.capture, sensor)
        .map(Arc::new)
        .map_err(|e| halt(&mut display, e))?;
    let server_state = ServerState::new(source.clone(), config.server.max_stream_clients)
        .map_err(|e| halt(&mut display, e))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(config.server.bind.as_str())
            .await
            .map_err(|e| halt(&mut display, InitError::Network(e)))?;
        let address = listener.local_addr()?.to_string();
        info!("Serving on http://{}", address);

        let worker = InferenceWorker::new(
            source,
            MeanColorClassifier::new(),
            display,
            &config.inference,
            address,
        );
        let inference_core = config.pipeline.inference_core;
        std::thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                pin_current_thread(inference_core, "inference");
                worker.run()
            })?;

        let app = create_router(server_state);
        axum::serve(listener, app).await?;
        Ok::<_, color_eyre::Report>(())
    })
}

fn build_sensor(config: &CaptureConfig) -> Result<Box<dyn CameraSensor>, InitError> {
    match config.sensor {
        SensorKind::Synthetic => Ok(Box::new(SyntheticSensor::new())),
        #[cfg(feature = "v4l2")]
        SensorKind::V4l2 => Ok(Box::new(edgecam::capture::V4l2Sensor::new(
            config.device.clone(),
        ))),
        #[cfg(not(feature = "v4l2"))]
        SensorKind::V4l2 => Err(InitError::Camera(
            "built without the `v4l2` feature".into(),
        )),
    }
}

/// Startup failures stop the boot: log, leave the message on the display
/// and hand back a report for `main` to return.
fn halt(display: &mut impl DisplaySink, err: impl Display) -> color_eyre::Report {
    let message = err.to_string();
    error!("Startup halted: {}", message);
    if let Err(e) = display.show_diagnostic(&message) {
        error!("Could not show diagnostic: {}", e);
    }
    eyre!(message)
}
