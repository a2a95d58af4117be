//! Forecast download, readiness gating and timed playback for radar
//! nowcast imagery.
//!
//! The map widget itself (pan/zoom, tile fetch, projection) is an external
//! collaborator behind the [`MapDisplay`] trait. This crate owns the
//! forecast frame lifecycle: fetch the per-horizon descriptions, attach
//! hidden layers so tiles prefetch, wait on the readiness barrier, then
//! animate the frames with gap-free layer swaps until the sequence ends
//! and the live radar layer is restored.

pub mod capability;
pub mod config;
pub mod controller;
pub mod display;
pub mod events;
pub mod frames;
pub mod playback;
pub mod readiness;
pub mod swap;

pub use capability::{CapabilityClient, CapabilityDocument, ForecastDescription, ForecastFetcher};
pub use config::NowcastConfig;
pub use controller::RadarController;
pub use display::{LayerId, LayerSpec, MapDisplay};
pub use events::NowcastEvent;
pub use frames::{ForecastFrame, ForecastFrameSet};
pub use playback::{PlaybackInput, PlaybackPhase, PlaybackScheduler};
pub use readiness::{GroupId, TileReadinessTracker};
pub use swap::LayerSwapCoordinator;
