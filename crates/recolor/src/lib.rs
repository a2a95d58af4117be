//! Reflectivity recoloring.
//!
//! Radar tiles encode quantized reflectivity in their first channel. This
//! crate translates that channel into display colors through a swappable
//! lookup table, applied per pixel on every render pass. Switching the
//! active table and requesting a repaint re-themes already-downloaded
//! imagery without refetching a single tile.

pub mod colormap;
pub mod operator;

pub use colormap::{classic, viridis, ColorMap, ColorMapRegistry, Rgba};
pub use operator::{recolor_pixel, recolor_tile};
