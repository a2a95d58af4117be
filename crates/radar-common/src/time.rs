//! Time handling for forecast frames.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Nominal time of one forecast frame.
///
/// Combines the base (observation) time published with the tile-set and
/// the frame's position in the animation sequence. Frame 0 is already one
/// step ahead of the base time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameTime {
    /// Observation time the forecast was computed from
    pub base_time: DateTime<Utc>,
    /// 0-based position in the animation sequence
    pub horizon_index: u32,
    /// Forecast step between frames, in seconds
    pub step_seconds: u32,
}

impl FrameTime {
    pub fn new(base_time: DateTime<Utc>, horizon_index: u32, step_seconds: u32) -> Self {
        Self {
            base_time,
            horizon_index,
            step_seconds,
        }
    }

    /// The displayed timestamp: base + (index + 1) * step.
    pub fn display_time(&self) -> DateTime<Utc> {
        self.base_time
            + Duration::seconds(((self.horizon_index + 1) as i64) * self.step_seconds as i64)
    }
}

/// Parse the `version` field of a forecast description (unix seconds).
pub fn from_unix_version(version: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(version, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_time() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let t = FrameTime::new(base, 0, 300);
        assert_eq!(t.display_time(), Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap());

        let t = FrameTime::new(base, 2, 300);
        assert_eq!(t.display_time(), Utc.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).unwrap());
    }

    #[test]
    fn test_from_unix_version() {
        let dt = from_unix_version(1_709_294_400).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }
}
