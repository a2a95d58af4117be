//! Configuration for the nowcast controller.

use std::time::Duration;

use crate::playback::DEFAULT_FRAME_INTERVAL;

/// Configuration for the nowcast controller.
#[derive(Debug, Clone)]
pub struct NowcastConfig {
    /// Base URL the primary tile pyramid is served from.
    pub tile_base_url: String,

    /// Base URL forecast horizon descriptions are served from.
    pub forecast_base_url: String,

    /// Forecast horizons to fetch when the capability does not say.
    pub horizons: u32,

    /// Forecast step in seconds when the capability does not say.
    pub step_seconds: u32,

    /// Delay between frames during playback.
    pub frame_interval: Duration,

    /// Display opacity of the primary reflectivity layer.
    pub primary_opacity: f64,

    /// Display opacity of forecast frames during playback.
    pub playback_opacity: f64,

    /// Zoom range of the tile pyramids.
    pub min_zoom: u32,
    pub max_zoom: u32,

    /// Attribution for the imagery provider.
    pub attribution: Option<String>,

    /// Timeout for capability and forecast description fetches.
    pub request_timeout: Duration,
}

impl Default for NowcastConfig {
    fn default() -> Self {
        Self {
            tile_base_url: "https://tiles.example.org/radar".to_string(),
            forecast_base_url: "https://tiles.example.org/forecast".to_string(),
            horizons: 6,
            step_seconds: 300,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            primary_opacity: 0.85,
            playback_opacity: 0.5,
            min_zoom: 6,
            max_zoom: 9,
            attribution: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl NowcastConfig {
    /// Lead time in minutes for a 0-based horizon index.
    pub fn lead_minutes(&self, index: u32, step_seconds: u32) -> u32 {
        ((index + 1) * step_seconds) / 60
    }
}
