//! Tile-set capability and forecast descriptions.
//!
//! Two JSON documents arrive from the tile server: the capability naming
//! the current reflectivity tile-set (plus coverage extent and times),
//! and one TileJSON-shaped description per forecast horizon. Only the
//! fields the core interprets are modeled; the rest belongs to the
//! display collaborator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radar_common::{time, RadarError, RadarResult, TileSource};
use serde::Deserialize;
use tracing::debug;

/// The primary tile-set description.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityDocument {
    pub radar: RadarEntry,
    #[serde(default)]
    pub nowcast: Option<NowcastEntry>,
}

/// The reflectivity entry of the capability.
#[derive(Debug, Clone, Deserialize)]
pub struct RadarEntry {
    /// Identifier of the published tile pyramid.
    pub tile_id: String,

    /// Coverage extent `[minx, miny, maxx, maxy]` in degrees, for the
    /// outside-coverage mask.
    #[serde(default)]
    pub extent: Option<[f64; 4]>,

    /// Observation time of the composite, unix seconds.
    pub upstream_time: i64,

    /// When the composite was tiled, unix seconds.
    #[serde(default)]
    pub processed_time: Option<i64>,
}

impl RadarEntry {
    /// Observation time as a timestamp.
    pub fn base_time(&self) -> RadarResult<DateTime<Utc>> {
        time::from_unix_version(self.upstream_time).ok_or_else(|| {
            RadarError::InvalidCapability(format!(
                "upstream_time {} out of range",
                self.upstream_time
            ))
        })
    }
}

/// Forecast availability advertised by the capability.
#[derive(Debug, Clone, Deserialize)]
pub struct NowcastEntry {
    /// Number of forecast horizons published.
    #[serde(default)]
    pub horizons: Option<u32>,

    /// Forecast step between horizons, seconds.
    #[serde(default)]
    pub interval_seconds: Option<u32>,
}

/// One forecast horizon's description (TileJSON-shaped).
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDescription {
    /// Base (observation) time the forecast was computed from, unix
    /// seconds.
    pub version: i64,

    /// Tile URL templates; the first is used.
    pub tiles: Vec<String>,

    #[serde(default)]
    pub minzoom: Option<u32>,

    #[serde(default)]
    pub maxzoom: Option<u32>,
}

impl ForecastDescription {
    /// Base time as a timestamp.
    pub fn base_time(&self) -> RadarResult<DateTime<Utc>> {
        time::from_unix_version(self.version).ok_or_else(|| {
            RadarError::InvalidForecast(format!("version {} out of range", self.version))
        })
    }

    /// The tile source for the display, with zoom range fallbacks.
    pub fn tile_source(&self, default_min: u32, default_max: u32) -> RadarResult<TileSource> {
        let url_template = self
            .tiles
            .first()
            .cloned()
            .ok_or_else(|| RadarError::InvalidForecast("empty tiles array".to_string()))?;
        Ok(TileSource {
            url_template,
            min_zoom: self.minzoom.unwrap_or(default_min),
            max_zoom: self.maxzoom.unwrap_or(default_max),
            attribution: None,
        })
    }
}

/// URL of the latest description for a forecast horizon, by lead time in
/// minutes (e.g. `FX_005-latest.json` for the 5-minute horizon).
pub fn forecast_url(base_url: &str, lead_minutes: u32) -> String {
    format!(
        "{}/FX_{:03}-latest.json",
        base_url.trim_end_matches('/'),
        lead_minutes
    )
}

/// Fetch seam for capability and forecast descriptions.
#[async_trait]
pub trait ForecastFetcher: Send + Sync {
    async fn fetch_capability(&self, url: &str) -> RadarResult<CapabilityDocument>;
    async fn fetch_forecast(&self, url: &str) -> RadarResult<ForecastDescription>;
}

/// HTTP fetcher backed by reqwest.
pub struct CapabilityClient {
    client: reqwest::Client,
}

impl CapabilityClient {
    pub fn new(request_timeout: Duration) -> RadarResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RadarError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> RadarResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RadarError::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RadarError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| RadarError::FetchFailed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ForecastFetcher for CapabilityClient {
    async fn fetch_capability(&self, url: &str) -> RadarResult<CapabilityDocument> {
        let body = self.get_text(url).await?;
        let doc: CapabilityDocument = serde_json::from_str(&body)
            .map_err(|e| RadarError::InvalidCapability(e.to_string()))?;
        debug!(url, tile_id = %doc.radar.tile_id, "Fetched capability");
        Ok(doc)
    }

    async fn fetch_forecast(&self, url: &str) -> RadarResult<ForecastDescription> {
        let body = self.get_text(url).await?;
        let desc: ForecastDescription =
            serde_json::from_str(&body).map_err(|e| RadarError::InvalidForecast(e.to_string()))?;
        debug!(url, version = desc.version, "Fetched forecast description");
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capability() {
        let json = r#"{
            "radar": {
                "tile_id": "a1b2c3",
                "extent": [2.8125, 45.0, 19.6875, 56.25],
                "upstream_time": 1709294400,
                "processed_time": 1709294520
            },
            "nowcast": {"horizons": 6, "interval_seconds": 300}
        }"#;
        let doc: CapabilityDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.radar.tile_id, "a1b2c3");
        assert!(doc.radar.base_time().is_ok());
        assert_eq!(doc.nowcast.unwrap().horizons, Some(6));
    }

    #[test]
    fn test_parse_capability_without_nowcast() {
        let json = r#"{"radar": {"tile_id": "x", "upstream_time": 0}}"#;
        let doc: CapabilityDocument = serde_json::from_str(json).unwrap();
        assert!(doc.nowcast.is_none());
        assert!(doc.radar.extent.is_none());
    }

    #[test]
    fn test_forecast_tile_source() {
        let json = r#"{
            "version": 1709294400,
            "tiles": ["https://tiles.example.org/fx5/{z}/{x}/{-y}.png"],
            "minzoom": 6
        }"#;
        let desc: ForecastDescription = serde_json::from_str(json).unwrap();
        let source = desc.tile_source(5, 9).unwrap();
        assert_eq!(source.min_zoom, 6);
        assert_eq!(source.max_zoom, 9);

        let empty: ForecastDescription =
            serde_json::from_str(r#"{"version": 0, "tiles": []}"#).unwrap();
        assert!(empty.tile_source(5, 9).is_err());
    }

    #[test]
    fn test_forecast_url() {
        assert_eq!(
            forecast_url("https://fx.example.org/data/", 5),
            "https://fx.example.org/data/FX_005-latest.json"
        );
        assert_eq!(
            forecast_url("https://fx.example.org/data", 30),
            "https://fx.example.org/data/FX_030-latest.json"
        );
    }
}
