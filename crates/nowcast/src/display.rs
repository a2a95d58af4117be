//! The map display collaborator, as an interface.
//!
//! Pan/zoom, tile fetching and projection live in the map widget. The
//! nowcast core only needs to attach and detach layers, adjust opacity
//! and request repaints; everything else stays on the widget's side of
//! this trait.

use radar_common::{BoundingBox, TileSource};

use crate::readiness::GroupId;

/// Unique identifier for a display layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Description of a layer handed to the display.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpec {
    /// Tiled raster layer, rendered through the per-pixel recolor pass.
    TiledRaster {
        source: TileSource,
        /// Display opacity in [0, 1]. Forecast frames prefetch at 0.
        opacity: f64,
        /// Readiness group the layer's tile loads report to, if tracked.
        tile_group: Option<GroupId>,
    },

    /// Overlay darkening the area outside radar coverage.
    CoverageMask { extent: BoundingBox },
}

impl LayerSpec {
    /// The layer's display opacity.
    pub fn opacity(&self) -> f64 {
        match self {
            LayerSpec::TiledRaster { opacity, .. } => *opacity,
            LayerSpec::CoverageMask { .. } => 1.0,
        }
    }

    /// Replace the display opacity (tiled raster layers only).
    pub fn set_opacity(&mut self, value: f64) {
        if let LayerSpec::TiledRaster { opacity, .. } = self {
            *opacity = value;
        }
    }
}

/// Interface to the map widget.
///
/// Implementations are expected to start tile loading when a tiled layer
/// is added, keep fetched tiles cached across detach/attach, and report
/// tile load start/end for layers carrying a `tile_group` to the
/// [`TileReadinessTracker`](crate::readiness::TileReadinessTracker) they
/// were wired with.
pub trait MapDisplay: Send + Sync {
    /// Attach a layer. For tiled layers this starts the tile downloads.
    ///
    /// For layers carrying a `tile_group`, the load-start callbacks for
    /// the visible area must be issued before this returns; otherwise
    /// the readiness barrier could observe a momentary zero and settle
    /// early.
    fn add_layer(&self, id: &LayerId, spec: &LayerSpec);

    /// Detach a layer. Cached tiles are kept. Removing a layer that is
    /// not attached is a no-op.
    fn remove_layer(&self, id: &LayerId);

    /// Change a layer's display opacity (attached or not).
    fn set_opacity(&self, id: &LayerId, opacity: f64);

    /// Request a repaint. The recolor pass re-runs over cached tiles; no
    /// tile is refetched.
    fn request_repaint(&self);
}
