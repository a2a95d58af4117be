//! Color lookup tables for quantized reflectivity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use radar_common::{RadarError, RadarResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An RGBA quadruple.
pub type Rgba = [u8; 4];

/// An ordered table mapping a quantized intensity index to a display color.
///
/// The table is immutable once built; re-theming swaps the whole table via
/// [`ColorMapRegistry::activate`], so a recolor pass always observes one
/// consistent table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorMap {
    name: String,
    table: Vec<Rgba>,
}

impl ColorMap {
    /// Build a color map. The table must contain at least one entry.
    pub fn new(name: impl Into<String>, table: Vec<Rgba>) -> RadarResult<Self> {
        let name = name.into();
        if table.is_empty() {
            return Err(RadarError::InvalidColorMap(format!(
                "color map '{}' has an empty table",
                name
            )));
        }
        Ok(Self { name, table })
    }

    /// Parse a color map from its JSON form:
    /// `{"name": "...", "colors": [[r, g, b, a], ...]}`.
    pub fn from_json(json: &str) -> RadarResult<Self> {
        let raw: ColorMapFile = serde_json::from_str(json)
            .map_err(|e| RadarError::InvalidColorMap(e.to_string()))?;
        Self::new(raw.name, raw.colors)
    }

    /// Load a color map from a JSON file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> RadarResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RadarError::InvalidColorMap(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        // The constructor rejects empty tables.
        false
    }

    /// Look up the color for a quantized intensity value.
    ///
    /// Indices past the end of the table clamp to the last entry; they
    /// never wrap and never fail.
    #[inline]
    pub fn lookup(&self, intensity: u8) -> Rgba {
        let idx = (intensity as usize).min(self.table.len() - 1);
        self.table[idx]
    }
}

/// Wire form of a color map file.
#[derive(Debug, Serialize, Deserialize)]
struct ColorMapFile {
    name: String,
    colors: Vec<Rgba>,
}

/// Registry of named color maps plus the currently active selection.
///
/// The active map is replaced wholesale on [`activate`](Self::activate);
/// readers holding an `Arc` from a previous [`active`](Self::active) call
/// keep a consistent table for the duration of their render pass.
pub struct ColorMapRegistry {
    maps: RwLock<HashMap<String, Arc<ColorMap>>>,
    active: RwLock<Arc<ColorMap>>,
}

impl ColorMapRegistry {
    /// Registry seeded with the built-in tables, "viridis" active.
    pub fn with_builtins() -> Self {
        let viridis = Arc::new(viridis());
        let classic = Arc::new(classic());
        let mut maps = HashMap::new();
        maps.insert(viridis.name().to_string(), viridis.clone());
        maps.insert(classic.name().to_string(), classic);
        Self {
            maps: RwLock::new(maps),
            active: RwLock::new(viridis),
        }
    }

    /// Add (or replace) a named map without changing the active selection.
    pub fn insert(&self, map: ColorMap) {
        let map = Arc::new(map);
        self.maps
            .write()
            .unwrap()
            .insert(map.name().to_string(), map);
    }

    /// Make the named map the active one.
    pub fn activate(&self, name: &str) -> RadarResult<()> {
        let map = self
            .maps
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| RadarError::ColorMapNotFound(name.to_string()))?;
        *self.active.write().unwrap() = map;
        debug!(colormap = name, "Activated color map");
        Ok(())
    }

    /// The currently active map.
    pub fn active(&self) -> Arc<ColorMap> {
        self.active
            .read()
            .unwrap()
            .clone()
    }

    /// Names of all registered maps, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .maps
            .read()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for ColorMapRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Built-in perceptually-uniform table. Index 0 (no echo) is transparent;
/// alpha ramps up with intensity.
pub fn viridis() -> ColorMap {
    ColorMap::new(
        "viridis",
        vec![
            [0, 0, 0, 0],
            [68, 1, 84, 64],
            [71, 19, 101, 96],
            [72, 36, 117, 128],
            [70, 52, 128, 160],
            [65, 68, 135, 192],
            [59, 82, 139, 224],
            [52, 96, 141, 255],
            [44, 113, 142, 255],
            [37, 131, 142, 255],
            [33, 145, 140, 255],
            [39, 163, 135, 255],
            [68, 181, 122, 255],
            [110, 197, 100, 255],
            [187, 221, 56, 255],
            [253, 231, 37, 255],
        ],
    )
    .expect("builtin table is non-empty")
}

/// Built-in classic reflectivity table: blue through green, yellow and red
/// to magenta for the strongest echoes. Index 0 (no echo) is transparent.
pub fn classic() -> ColorMap {
    ColorMap::new(
        "classic",
        vec![
            [0, 0, 0, 0],
            [0, 60, 160, 96],
            [0, 100, 210, 144],
            [0, 150, 245, 192],
            [60, 200, 255, 224],
            [0, 180, 80, 255],
            [0, 220, 60, 255],
            [150, 245, 0, 255],
            [255, 255, 0, 255],
            [255, 200, 0, 255],
            [255, 150, 0, 255],
            [255, 80, 0, 255],
            [230, 0, 0, 255],
            [180, 0, 60, 255],
            [210, 0, 160, 255],
            [255, 0, 255, 255],
        ],
    )
    .expect("builtin table is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_rejected() {
        let err = ColorMap::new("empty", vec![]).unwrap_err();
        assert!(matches!(err, RadarError::InvalidColorMap(_)));
    }

    #[test]
    fn test_lookup_clamps() {
        let map = ColorMap::new("tiny", vec![[1, 2, 3, 4], [5, 6, 7, 8]]).unwrap();
        assert_eq!(map.lookup(0), [1, 2, 3, 4]);
        assert_eq!(map.lookup(1), [5, 6, 7, 8]);
        // Past the end: clamp to the last entry, never wrap.
        assert_eq!(map.lookup(2), [5, 6, 7, 8]);
        assert_eq!(map.lookup(255), [5, 6, 7, 8]);
    }

    #[test]
    fn test_from_json() {
        let map =
            ColorMap::from_json(r#"{"name": "custom", "colors": [[0, 0, 0, 0], [255, 0, 0, 255]]}"#)
                .unwrap();
        assert_eq!(map.name(), "custom");
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup(1), [255, 0, 0, 255]);

        assert!(ColorMap::from_json(r#"{"name": "bad", "colors": []}"#).is_err());
        assert!(ColorMap::from_json("not json").is_err());
    }
}
