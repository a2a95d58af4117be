//! Shared fixtures for nowcast integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use nowcast::capability::{CapabilityDocument, ForecastDescription, NowcastEntry, RadarEntry};
use nowcast::{ForecastFetcher, GroupId, LayerId, LayerSpec, MapDisplay, TileReadinessTracker};
use radar_common::{RadarError, RadarResult};

/// Unix seconds for 2024-03-01T12:00:00Z.
pub const BASE_TIME: i64 = 1_709_294_400;

/// Capability document naming a tile-set with a nowcast of `horizons`
/// frames at a 300 second step.
pub fn capability(tile_id: &str, horizons: u32) -> CapabilityDocument {
    CapabilityDocument {
        radar: RadarEntry {
            tile_id: tile_id.to_string(),
            extent: Some([2.8125, 45.0, 19.6875, 56.25]),
            upstream_time: BASE_TIME,
            processed_time: None,
        },
        nowcast: Some(NowcastEntry {
            horizons: Some(horizons),
            interval_seconds: Some(300),
        }),
    }
}

pub fn forecast_description(version: i64) -> ForecastDescription {
    ForecastDescription {
        version,
        tiles: vec!["https://t.test/fx/{z}/{x}/{-y}.png".to_string()],
        minzoom: None,
        maxzoom: None,
    }
}

/// Canned fetch responses keyed by URL; URLs with no entry fail the way a
/// network error would.
#[derive(Default)]
pub struct StubFetcher {
    capabilities: Mutex<HashMap<String, CapabilityDocument>>,
    forecasts: Mutex<HashMap<String, ForecastDescription>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_capability(&self, url: &str, doc: CapabilityDocument) {
        self.capabilities.lock().unwrap().insert(url.to_string(), doc);
    }

    pub fn put_forecast(&self, url: &str, desc: ForecastDescription) {
        self.forecasts.lock().unwrap().insert(url.to_string(), desc);
    }
}

#[async_trait]
impl ForecastFetcher for StubFetcher {
    async fn fetch_capability(&self, url: &str) -> RadarResult<CapabilityDocument> {
        self.capabilities
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RadarError::FetchFailed {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }

    async fn fetch_forecast(&self, url: &str) -> RadarResult<ForecastDescription> {
        self.forecasts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RadarError::FetchFailed {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }
}

/// Operations recorded by the mock display, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOp {
    Add(String),
    Remove(String),
    Opacity(String, f64),
    Repaint,
}

/// Scripted map display: keeps the layer stack, simulates a fixed number
/// of tile loads per tracked layer and records every call.
pub struct MockDisplay {
    tracker: OnceLock<Arc<TileReadinessTracker>>,
    tiles_per_layer: usize,
    /// Complete tile loads inside `add_layer` (true), or hold them until
    /// `complete_pending` (false).
    auto_complete: bool,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    attached: Vec<(LayerId, LayerSpec)>,
    ops: Vec<DisplayOp>,
    pending: Vec<GroupId>,
    tile_loads: usize,
    /// Count of visible raster layers after every operation.
    visible_after: Vec<usize>,
}

impl MockDisplay {
    pub fn new(tiles_per_layer: usize, auto_complete: bool) -> Self {
        Self {
            tracker: OnceLock::new(),
            tiles_per_layer,
            auto_complete,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn set_tracker(&self, tracker: Arc<TileReadinessTracker>) {
        let _ = self.tracker.set(tracker);
    }

    /// Finish all held tile loads.
    pub fn complete_pending(&self) {
        let pending: Vec<GroupId> = self.inner.lock().unwrap().pending.drain(..).collect();
        let tracker = self.tracker.get().expect("tracker not wired");
        for group in pending {
            tracker.on_tile_end(group);
        }
    }

    pub fn ops(&self) -> Vec<DisplayOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn attached_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .attached
            .iter()
            .map(|(id, _)| id.0.clone())
            .collect()
    }

    /// Attached tiled-raster layers with opacity above zero.
    pub fn visible_rasters(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .attached
            .iter()
            .filter(|(_, spec)| matches!(spec, LayerSpec::TiledRaster { .. }) && spec.opacity() > 0.0)
            .map(|(id, _)| id.0.clone())
            .collect()
    }

    pub fn tile_loads(&self) -> usize {
        self.inner.lock().unwrap().tile_loads
    }

    /// Visible raster count recorded after each operation, skipping the
    /// ones before the first layer ever attached.
    pub fn visible_history(&self) -> Vec<usize> {
        self.inner.lock().unwrap().visible_after.clone()
    }
}

fn visible_count(attached: &[(LayerId, LayerSpec)]) -> usize {
    attached
        .iter()
        .filter(|(_, spec)| matches!(spec, LayerSpec::TiledRaster { .. }) && spec.opacity() > 0.0)
        .count()
}

impl MapDisplay for MockDisplay {
    fn add_layer(&self, id: &LayerId, spec: &LayerSpec) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(DisplayOp::Add(id.0.clone()));

        if let LayerSpec::TiledRaster {
            tile_group: Some(group),
            ..
        } = spec
        {
            let tracker = self.tracker.get().expect("tracker not wired").clone();
            for _ in 0..self.tiles_per_layer {
                tracker.on_tile_start(*group);
                inner.tile_loads += 1;
                if self.auto_complete {
                    tracker.on_tile_end(*group);
                } else {
                    inner.pending.push(*group);
                }
            }
        }

        inner.attached.retain(|(existing, _)| existing != id);
        inner.attached.push((id.clone(), spec.clone()));
        let visible = visible_count(&inner.attached);
        inner.visible_after.push(visible);
    }

    fn remove_layer(&self, id: &LayerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(DisplayOp::Remove(id.0.clone()));
        inner.attached.retain(|(existing, _)| existing != id);
        let visible = visible_count(&inner.attached);
        inner.visible_after.push(visible);
    }

    fn set_opacity(&self, id: &LayerId, opacity: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(DisplayOp::Opacity(id.0.clone(), opacity));
        for (existing, spec) in &mut inner.attached {
            if existing == id {
                spec.set_opacity(opacity);
            }
        }
    }

    fn request_repaint(&self) {
        self.inner.lock().unwrap().ops.push(DisplayOp::Repaint);
    }
}
