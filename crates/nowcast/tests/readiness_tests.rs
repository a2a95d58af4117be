//! Tests for the tile readiness barrier across call interleavings.

use std::sync::Arc;
use std::time::Duration;

use nowcast::{GroupId, TileReadinessTracker};

const GROUP: GroupId = GroupId(1);

/// One barrier-relevant call.
#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    End,
    Attach,
}

fn run_ops(tracker: &TileReadinessTracker, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Start => tracker.on_tile_start(GROUP),
            Op::End => tracker.on_tile_end(GROUP),
            Op::Attach => tracker.frame_attached(GROUP),
        }
    }
}

#[test]
fn test_settles_for_varied_interleavings() {
    use Op::*;

    // Two frames, two tiles each, in several orderings of the same
    // multiset of calls. Every one must settle, and only at the end.
    let interleavings: &[&[Op]] = &[
        // Frame-by-frame, loads completing in order.
        &[Attach, Start, End, Start, End, Attach, Start, End, Start, End],
        // All attaches first, loads drain afterwards.
        &[Attach, Attach, Start, Start, Start, Start, End, End, End, End],
        // Loads racing each other across frames.
        &[Attach, Start, Start, Attach, Start, End, Start, End, End, End],
        // Second frame's tiles were all cached (no loads at all).
        &[Attach, Start, End, Start, End, Attach],
        // Late attach: counter hits zero first, attach completes it.
        &[Attach, Start, Start, End, End, Start, End, Attach],
    ];

    for (i, ops) in interleavings.iter().enumerate() {
        let tracker = TileReadinessTracker::new();
        tracker.begin_tracking(GROUP, 2);

        let (head, last) = ops.split_at(ops.len() - 1);
        run_ops(&tracker, head);
        assert!(!tracker.is_settled(GROUP), "interleaving {} settled early", i);
        run_ops(&tracker, last);
        assert!(tracker.is_settled(GROUP), "interleaving {} never settled", i);
    }
}

#[test]
fn test_failed_tiles_still_settle() {
    // A failed tile load ends the same way a successful one does; the
    // barrier cannot tell and must not care.
    let tracker = TileReadinessTracker::new();
    tracker.begin_tracking(GROUP, 1);
    tracker.frame_attached(GROUP);
    tracker.on_tile_start(GROUP);
    tracker.on_tile_start(GROUP);
    tracker.on_tile_end(GROUP); // success
    assert!(!tracker.is_settled(GROUP));
    tracker.on_tile_end(GROUP); // failure, counted identically
    assert!(tracker.is_settled(GROUP));
}

#[test]
fn test_reduced_target_settles_over_survivors() {
    let tracker = TileReadinessTracker::new();
    tracker.begin_tracking(GROUP, 3);

    tracker.frame_attached(GROUP);
    tracker.frame_attached(GROUP);
    assert!(!tracker.is_settled(GROUP));

    // The third frame's fetch failed outright; it will never attach.
    tracker.reduce_expected(GROUP);
    assert!(tracker.is_settled(GROUP));
}

#[test]
fn test_every_horizon_failing_settles_empty() {
    let tracker = TileReadinessTracker::new();
    tracker.begin_tracking(GROUP, 2);
    tracker.reduce_expected(GROUP);
    assert!(!tracker.is_settled(GROUP));
    tracker.reduce_expected(GROUP);
    assert!(tracker.is_settled(GROUP));
}

#[test]
fn test_calls_after_settlement_are_harmless() {
    let tracker = TileReadinessTracker::new();
    tracker.begin_tracking(GROUP, 1);
    tracker.frame_attached(GROUP);
    assert!(tracker.is_settled(GROUP));

    tracker.on_tile_end(GROUP);
    tracker.on_tile_end(GROUP);
    tracker.frame_attached(GROUP);
    assert!(tracker.is_settled(GROUP));
}

#[tokio::test]
async fn test_settled_future_resolves_once_barrier_completes() {
    let tracker = Arc::new(TileReadinessTracker::new());
    tracker.begin_tracking(GROUP, 1);
    tracker.frame_attached(GROUP);
    tracker.on_tile_start(GROUP);

    let waiter = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.settled(GROUP).await })
    };

    // Barrier still open; the waiter must be pending.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    tracker.on_tile_end(GROUP);
    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn test_settled_future_resolves_false_on_abort() {
    let tracker = Arc::new(TileReadinessTracker::new());
    tracker.begin_tracking(GROUP, 1);

    let waiter = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.settled(GROUP).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    tracker.abort(GROUP);
    assert!(!waiter.await.unwrap());

    // The group id is stale now; nothing resurrects it.
    tracker.on_tile_start(GROUP);
    tracker.frame_attached(GROUP);
    assert!(!tracker.is_settled(GROUP));
}

#[tokio::test]
async fn test_settled_for_unknown_group_is_false() {
    let tracker = TileReadinessTracker::new();
    assert!(!tracker.settled(GroupId(99)).await);
}
