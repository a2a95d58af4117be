//! Headless radar nowcast viewer.
//!
//! Fetches the tile-set capability, wires the nowcast controller to a
//! logging display stand-in and runs one playback cycle, printing frame
//! times as the animation advances.

mod display;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use nowcast::{CapabilityClient, MapDisplay, NowcastConfig, NowcastEvent, RadarController};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use display::LoggingDisplay;

#[derive(Parser, Debug)]
#[command(name = "viewer")]
#[command(about = "Headless radar nowcast playback")]
struct Args {
    /// URL of the tile-set capability document
    #[arg(long, env = "CAPABILITY_URL")]
    capability_url: String,

    /// Base URL of the radar tile pyramids
    #[arg(long, env = "TILE_BASE_URL", default_value = "https://tiles.example.org/radar")]
    tile_base_url: String,

    /// Base URL of the forecast horizon descriptions
    #[arg(
        long,
        env = "FORECAST_BASE_URL",
        default_value = "https://tiles.example.org/forecast"
    )]
    forecast_base_url: String,

    /// Forecast horizons to fetch when the capability does not say
    #[arg(long, default_value = "6")]
    horizons: u32,

    /// Delay between frames in milliseconds
    #[arg(long, default_value = "600")]
    frame_interval_ms: u64,

    /// Color map to activate before playback (viridis, classic)
    #[arg(long)]
    colormap: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting radar nowcast viewer");

    let config = NowcastConfig {
        tile_base_url: args.tile_base_url,
        forecast_base_url: args.forecast_base_url,
        horizons: args.horizons,
        frame_interval: Duration::from_millis(args.frame_interval_ms),
        ..NowcastConfig::default()
    };

    let display = Arc::new(LoggingDisplay::with_default_view());
    let fetcher = Arc::new(CapabilityClient::new(config.request_timeout)?);
    let controller = RadarController::new(
        display.clone() as Arc<dyn MapDisplay>,
        fetcher,
        config,
    );
    display.set_tracker(controller.tracker());
    display.set_registry(controller.registry());

    let mut events = controller.subscribe();

    if let Some(name) = &args.colormap {
        controller.set_colormap(name)?;
    }

    if let Err(e) = controller.load_capability(&args.capability_url).await {
        // Fetch and parse failures leave no tile-set to show; bail.
        warn!(error = %e, "No usable capability; exiting");
        controller.shutdown().await;
        return Err(e.into());
    }

    if let Some(observed) = controller.observation_time() {
        info!(observed = %observed.format("%H:%M"), "Radar composite time");
    }

    controller.toggle_play();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(NowcastEvent::PlaybackStarted) => info!("Playback started"),
                Ok(NowcastEvent::FrameAdvanced { timestamp }) => {
                    info!(frame_time = %timestamp.format("%H:%M"), "Forecast frame");
                }
                Ok(NowcastEvent::ForecastReady { ready }) => {
                    info!(ready, "Forecast readiness changed");
                }
                Ok(NowcastEvent::ForecastInvalidated) => info!("Forecast invalidated"),
                Ok(NowcastEvent::FetchFailed { url, message }) => {
                    warn!(url, message, "Fetch failed");
                }
                Ok(NowcastEvent::PlaybackFinished) => {
                    info!("Playback finished");
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    let remaining = display.attached_layers();
    info!(layers = ?remaining, "Final layer stack");

    controller.shutdown().await;
    Ok(())
}
