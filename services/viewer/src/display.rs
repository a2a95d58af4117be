//! A headless stand-in for the map widget.
//!
//! Keeps a layer stack and a tile cache, "downloads" tiles by
//! synthesizing deterministic rasters for a fixed visible area, reports
//! tile load start/end to the readiness tracker, and runs the recolor
//! pass over cached tiles on every repaint. Useful for driving the
//! controller end to end without a GUI.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use nowcast::{LayerId, LayerSpec, MapDisplay, TileReadinessTracker};
use radar_common::{expand_template, TileCoord};
use recolor::{recolor_tile, ColorMapRegistry};
use tracing::{debug, info};

/// Simulated tile size (pixels per side).
const TILE_SIZE: u32 = 8;

pub struct LoggingDisplay {
    tracker: OnceLock<Arc<TileReadinessTracker>>,
    registry: OnceLock<Arc<ColorMapRegistry>>,
    /// Tiles covering the visible area, known up front.
    view: Vec<TileCoord>,
    state: Mutex<DisplayState>,
}

#[derive(Default)]
struct DisplayState {
    attached: Vec<(LayerId, LayerSpec)>,
    tile_cache: HashMap<String, Vec<u8>>,
}

impl LoggingDisplay {
    /// Display with a 2x2 view at zoom 6.
    pub fn with_default_view() -> Self {
        let mut view = Vec::new();
        for x in 33..35 {
            for y in 21..23 {
                view.push(TileCoord::new(6, x, y));
            }
        }
        Self {
            tracker: OnceLock::new(),
            registry: OnceLock::new(),
            view,
            state: Mutex::new(DisplayState::default()),
        }
    }

    /// Wire the readiness tracker the tile pipeline reports to.
    pub fn set_tracker(&self, tracker: Arc<TileReadinessTracker>) {
        let _ = self.tracker.set(tracker);
    }

    /// Wire the color map registry the recolor pass reads from.
    pub fn set_registry(&self, registry: Arc<ColorMapRegistry>) {
        let _ = self.registry.set(registry);
    }

    /// Layers currently on the stack.
    pub fn attached_layers(&self) -> Vec<LayerId> {
        self.state
            .lock()
            .unwrap()
            .attached
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn load_tiles(&self, state: &mut DisplayState, spec: &LayerSpec) {
        let LayerSpec::TiledRaster {
            source, tile_group, ..
        } = spec
        else {
            return;
        };
        for coord in &self.view {
            if coord.z < source.min_zoom || coord.z > source.max_zoom {
                continue;
            }
            let url = expand_template(&source.url_template, coord);
            if state.tile_cache.contains_key(&url) {
                continue;
            }
            if let (Some(group), Some(tracker)) = (tile_group, self.tracker.get()) {
                tracker.on_tile_start(*group);
            }
            let tile = synth_tile(coord);
            debug!(url, tile = %coord.cache_key(), "Fetched tile");
            state.tile_cache.insert(url, tile);
            if let (Some(group), Some(tracker)) = (tile_group, self.tracker.get()) {
                tracker.on_tile_end(*group);
            }
        }
    }

    fn render(&self, state: &DisplayState) {
        let Some(registry) = self.registry.get() else {
            return;
        };
        let cmap = registry.active();
        for (id, spec) in &state.attached {
            let LayerSpec::TiledRaster { source, opacity, .. } = spec else {
                continue;
            };
            if *opacity <= 0.0 {
                continue;
            }
            let mut tiles = 0usize;
            for coord in &self.view {
                let url = expand_template(&source.url_template, coord);
                if let Some(raw) = state.tile_cache.get(&url) {
                    let _recolored = recolor_tile(raw, &cmap);
                    tiles += 1;
                }
            }
            info!(layer = %id, colormap = cmap.name(), opacity, tiles, "Rendered layer");
        }
    }
}

impl MapDisplay for LoggingDisplay {
    fn add_layer(&self, id: &LayerId, spec: &LayerSpec) {
        let mut state = self.state.lock().unwrap();
        match spec {
            LayerSpec::TiledRaster { .. } => self.load_tiles(&mut state, spec),
            LayerSpec::CoverageMask { extent } => {
                info!(
                    layer = %id,
                    width_deg = extent.width(),
                    height_deg = extent.height(),
                    "Coverage mask attached"
                );
            }
        }
        state.attached.retain(|(existing, _)| existing != id);
        state.attached.push((id.clone(), spec.clone()));
        info!(layer = %id, "Layer attached");
        self.render(&state);
    }

    fn remove_layer(&self, id: &LayerId) {
        let mut state = self.state.lock().unwrap();
        let before = state.attached.len();
        state.attached.retain(|(existing, _)| existing != id);
        if state.attached.len() < before {
            info!(layer = %id, "Layer detached");
        }
    }

    fn set_opacity(&self, id: &LayerId, opacity: f64) {
        let mut state = self.state.lock().unwrap();
        for (existing, spec) in &mut state.attached {
            if existing == id {
                spec.set_opacity(opacity);
            }
        }
    }

    fn request_repaint(&self) {
        let state = self.state.lock().unwrap();
        self.render(&state);
    }
}

/// Deterministic stand-in raster: intensity varies with tile position.
fn synth_tile(coord: &TileCoord) -> Vec<u8> {
    let pixels = (TILE_SIZE * TILE_SIZE) as usize;
    let mut data = Vec::with_capacity(pixels * 4);
    for i in 0..pixels as u32 {
        let intensity = ((coord.x + coord.y + i) % 16) as u8;
        data.extend_from_slice(&[intensity, 0, 0, 255]);
    }
    data
}
