//! Counter-based readiness barrier for grouped tile loads.
//!
//! Every forecast download registers one group covering all of its
//! frames. The display's tile pipeline reports load starts and ends; the
//! barrier settles the instant the in-flight counter returns to zero with
//! every expected frame attached. Ends are counted for failed loads too,
//! so one bad tile can never wedge the barrier.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, trace};

/// Identifier of one tracked download group. Each forecast download gets
/// a fresh group id from the controller's generation counter; callbacks
/// carrying a stale id are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct GroupState {
    /// Frames that will attach and issue tile requests. Shrinks when a
    /// frame's description fetch fails outright.
    expected_frames: usize,
    attached_frames: usize,
    in_flight: usize,
    tx: watch::Sender<bool>,
}

impl GroupState {
    fn is_settled(&self) -> bool {
        self.attached_frames >= self.expected_frames && self.in_flight == 0
    }
}

/// Tracks outstanding tile loads per group and exposes a one-shot
/// "all tiles settled" signal.
///
/// Safe to call from the display's tile pipeline on any thread; all
/// mutation is behind one mutex with short critical sections.
#[derive(Debug, Default)]
pub struct TileReadinessTracker {
    groups: Mutex<HashMap<GroupId, GroupState>>,
}

impl TileReadinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a counter for `expected_frames` frames.
    ///
    /// Must be called before any of the group's frames is attached to the
    /// display, so tile-start callbacks can never race ahead of arming
    /// and a pre-arm counter of zero is never mistaken for settlement.
    pub fn begin_tracking(&self, group: GroupId, expected_frames: usize) {
        let (tx, _) = watch::channel(false);
        let state = GroupState {
            expected_frames,
            attached_frames: 0,
            in_flight: 0,
            tx,
        };
        let previous = self.groups.lock().unwrap().insert(group, state);
        debug_assert!(previous.is_none(), "group {} tracked twice", group);
        debug!(group = %group, expected_frames, "Armed readiness barrier");
    }

    /// A tile load started for the group. Unknown groups are stale and
    /// ignored.
    pub fn on_tile_start(&self, group: GroupId) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(state) = groups.get_mut(&group) {
            state.in_flight += 1;
            trace!(group = %group, in_flight = state.in_flight, "Tile load started");
        }
    }

    /// A tile load finished, successfully or not. An end without a
    /// matching prior start is a no-op.
    pub fn on_tile_end(&self, group: GroupId) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(state) = groups.get_mut(&group) {
            if state.in_flight == 0 {
                return;
            }
            state.in_flight -= 1;
            trace!(group = %group, in_flight = state.in_flight, "Tile load ended");
            Self::maybe_settle(group, state);
        }
    }

    /// A frame of the group was attached to the display (its tile
    /// requests are now issued).
    pub fn frame_attached(&self, group: GroupId) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(state) = groups.get_mut(&group) {
            state.attached_frames += 1;
            Self::maybe_settle(group, state);
        }
    }

    /// A frame that was counted in the readiness target will never attach
    /// (its description fetch failed). The barrier settles over the
    /// frames that actually arrived.
    pub fn reduce_expected(&self, group: GroupId) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(state) = groups.get_mut(&group) {
            state.expected_frames = state.expected_frames.saturating_sub(1);
            Self::maybe_settle(group, state);
        }
    }

    /// Whether the group has settled. Unknown groups report false.
    pub fn is_settled(&self, group: GroupId) -> bool {
        let groups = self.groups.lock().unwrap();
        groups.get(&group).map(|s| *s.tx.borrow()).unwrap_or(false)
    }

    /// Wait until the group settles.
    ///
    /// Resolves `true` exactly when the counter is zero and every
    /// expected frame has attached, even if some tile loads failed.
    /// Resolves `false` if the group is unknown or torn down first.
    pub async fn settled(&self, group: GroupId) -> bool {
        let mut rx = {
            let groups = self.groups.lock().unwrap();
            match groups.get(&group) {
                Some(state) => state.tx.subscribe(),
                None => return false,
            }
        };
        let settled = rx.wait_for(|settled| *settled).await.is_ok();
        settled
    }

    /// Drop a group. Pending waiters resolve `false`; late callbacks
    /// against the id become no-ops.
    pub fn abort(&self, group: GroupId) {
        if self.groups.lock().unwrap().remove(&group).is_some() {
            debug!(group = %group, "Dropped readiness group");
        }
    }

    fn maybe_settle(group: GroupId, state: &mut GroupState) {
        if state.is_settled() && !*state.tx.borrow() {
            debug!(group = %group, frames = state.attached_frames, "Readiness barrier settled");
            let _ = state.tx.send(true);
        }
    }
}
