//! Tile coordinates and XYZ URL templates.
//!
//! Radar imagery is served as pre-rendered XYZ tile pyramids. The row axis
//! uses the TMS (inverted-y) scheme, written `{-y}` in URL templates.

use serde::{Deserialize, Serialize};

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y), top-down
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// The TMS row index for this tile (`{-y}` in URL templates).
    pub fn flipped_y(&self) -> u32 {
        (1u32 << self.z) - 1 - self.y
    }
}

/// Description of an XYZ tile source, handed to the map display to build
/// a tiled raster layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSource {
    /// URL template containing `{z}`, `{x}` and `{y}` or `{-y}` placeholders
    pub url_template: String,

    /// Minimum zoom level with data
    pub min_zoom: u32,

    /// Maximum zoom level with data
    pub max_zoom: u32,

    /// Attribution string for the imagery provider
    pub attribution: Option<String>,
}

/// Build the XYZ URL template for a published tile-set.
pub fn url_template(base_url: &str, tile_id: &str) -> String {
    format!(
        "{}/{}/{{z}}/{{x}}/{{-y}}.png",
        base_url.trim_end_matches('/'),
        tile_id
    )
}

/// Expand a URL template for one tile coordinate.
///
/// Supports both `{y}` (top-down) and `{-y}` (TMS) row placeholders.
pub fn expand_template(template: &str, coord: &TileCoord) -> String {
    template
        .replace("{z}", &coord.z.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{-y}", &coord.flipped_y().to_string())
        .replace("{y}", &coord.y.to_string())
}
