//! Forecast frame bookkeeping.

use chrono::{DateTime, Utc};
use radar_common::FrameTime;

use crate::display::{LayerId, LayerSpec};
use crate::readiness::GroupId;

/// One time-stepped forecast layer in the animation sequence.
#[derive(Debug, Clone)]
pub struct ForecastFrame {
    /// 0-based horizon index the frame was fetched for.
    pub index: u32,
    /// Nominal frame time (base + (index + 1) * step).
    pub time: FrameTime,
    /// The layer on the display.
    pub layer: LayerId,
    /// Spec used to (re-)attach the layer.
    pub spec: LayerSpec,
    /// Flips true exactly once, when the group readiness barrier settles.
    pub loaded: bool,
}

impl ForecastFrame {
    pub fn display_time(&self) -> DateTime<Utc> {
        self.time.display_time()
    }
}

/// The ordered collection of forecast frames for one download generation.
///
/// Frames arrive in fetch-completion order and are kept sorted by horizon
/// index; a failed horizon is simply absent, and playback traverses the
/// frames that made it.
#[derive(Debug)]
pub struct ForecastFrameSet {
    group: GroupId,
    frames: Vec<ForecastFrame>,
    downloaded: bool,
    playback_opacity: f64,
}

impl ForecastFrameSet {
    pub fn new(group: GroupId, playback_opacity: f64) -> Self {
        Self {
            group,
            frames: Vec::new(),
            downloaded: false,
            playback_opacity,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Number of frames that actually arrived.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether the whole set has passed the readiness barrier.
    pub fn downloaded(&self) -> bool {
        self.downloaded
    }

    pub fn playback_opacity(&self) -> f64 {
        self.playback_opacity
    }

    /// Insert a frame, keeping the sequence ordered by horizon index.
    pub fn push(&mut self, frame: ForecastFrame) {
        let at = self
            .frames
            .partition_point(|existing| existing.index < frame.index);
        self.frames.insert(at, frame);
    }

    /// Frame at a sequence position (0-based over surviving frames).
    pub fn frame(&self, position: usize) -> Option<&ForecastFrame> {
        self.frames.get(position)
    }

    pub fn frames(&self) -> &[ForecastFrame] {
        &self.frames
    }

    /// Mark the set downloaded: every frame's `loaded` flag flips, and
    /// the specs switch from the prefetch opacity to the playback one.
    pub fn mark_downloaded(&mut self) {
        self.downloaded = true;
        let opacity = self.playback_opacity;
        for frame in &mut self.frames {
            frame.loaded = true;
            frame.spec.set_opacity(opacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use radar_common::TileSource;

    fn frame(index: u32) -> ForecastFrame {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        ForecastFrame {
            index,
            time: FrameTime::new(base, index, 300),
            layer: LayerId::new(format!("nowcast-1-{}", index)),
            spec: LayerSpec::TiledRaster {
                source: TileSource {
                    url_template: "t/{z}/{x}/{-y}.png".to_string(),
                    min_zoom: 6,
                    max_zoom: 9,
                    attribution: None,
                },
                opacity: 0.0,
                tile_group: Some(GroupId(1)),
            },
            loaded: false,
        }
    }

    #[test]
    fn test_push_keeps_order_on_out_of_order_fetches() {
        let mut set = ForecastFrameSet::new(GroupId(1), 0.5);
        set.push(frame(2));
        set.push(frame(0));
        set.push(frame(3));
        set.push(frame(1));

        let indices: Vec<u32> = set.frames().iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_mark_downloaded_flips_loaded_and_opacity() {
        let mut set = ForecastFrameSet::new(GroupId(1), 0.5);
        set.push(frame(0));
        set.push(frame(1));
        assert!(!set.downloaded());

        set.mark_downloaded();
        assert!(set.downloaded());
        for f in set.frames() {
            assert!(f.loaded);
            assert_eq!(f.spec.opacity(), 0.5);
        }
    }

    #[test]
    fn test_positions_skip_missing_horizons() {
        let mut set = ForecastFrameSet::new(GroupId(1), 0.5);
        // Horizon 1 failed to fetch.
        set.push(frame(0));
        set.push(frame(2));

        assert_eq!(set.len(), 2);
        assert_eq!(set.frame(0).unwrap().index, 0);
        assert_eq!(set.frame(1).unwrap().index, 2);
        assert!(set.frame(2).is_none());
    }
}
