//! Gap-free layer swaps.

use std::sync::Arc;

use tracing::debug;

use crate::display::{LayerId, LayerSpec, MapDisplay};

/// Sole mutator of the display's layer stack.
///
/// The swap contract is add-before-remove, always: the incoming layer is
/// attached before the outgoing one is detached, so the map is never
/// without radar imagery for even one rendered frame.
pub struct LayerSwapCoordinator {
    display: Arc<dyn MapDisplay>,
}

impl LayerSwapCoordinator {
    pub fn new(display: Arc<dyn MapDisplay>) -> Self {
        Self { display }
    }

    /// Replace the visible layer. `add` is attached first, `remove` only
    /// afterwards.
    pub fn swap(&self, add: (&LayerId, &LayerSpec), remove: &LayerId) {
        debug!(add = %add.0, remove = %remove, "Swapping layers");
        self.display.add_layer(add.0, add.1);
        self.display.remove_layer(remove);
    }

    /// Attach a layer without removing anything (hidden prefetch layers,
    /// the first primary layer, the coverage mask).
    pub fn attach(&self, id: &LayerId, spec: &LayerSpec) {
        self.display.add_layer(id, spec);
    }

    /// Detach a layer without adding anything (teardown; cached tiles
    /// are kept by the display).
    pub fn detach(&self, id: &LayerId) {
        self.display.remove_layer(id);
    }

    /// Adjust a layer's display opacity.
    pub fn set_opacity(&self, id: &LayerId, opacity: f64) {
        self.display.set_opacity(id, opacity);
    }

    /// Ask the display to repaint (recolor pass re-runs, no refetch).
    pub fn request_repaint(&self) {
        self.display.request_repaint();
    }
}
