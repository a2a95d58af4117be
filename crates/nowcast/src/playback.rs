//! Playback state machine.
//!
//! A pure transition function: inputs go in, effects come out, and the
//! async driver in the controller owns the single timer and executes the
//! effects. Keeping the machine free of clocks and channels makes
//! cancellation unambiguous and lets tests drive every path without
//! wall-clock waits.

use std::time::Duration;

/// Delay between forecast frames during playback.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(600);

/// Where the animation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Primary layer visible, no forecast state.
    Idle,
    /// Waiting for the readiness barrier.
    Downloading,
    /// Frame at this sequence position is visible; timer pending.
    Playing(usize),
    /// Frame at this sequence position is visible; no timer.
    Paused(usize),
}

/// Inputs consumed by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackInput {
    /// The user hit play/pause.
    TogglePlay,
    /// The readiness barrier settled over this many surviving frames.
    FramesReady { frames: usize },
    /// The pending frame timer elapsed.
    TimerFired,
    /// Forecast state is void (new primary tile-set, teardown).
    Invalidate,
}

/// A layer the machine asks the driver to swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapTarget {
    /// The primary (live radar) layer.
    Primary,
    /// Forecast frame at a sequence position.
    Frame(usize),
}

/// Effects for the driver to execute, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Fetch forecast descriptions and arm the readiness barrier.
    BeginDownload,
    /// Attach `add`, then detach `remove` (never the reverse).
    Swap { add: SwapTarget, remove: SwapTarget },
    /// Arm the frame timer. Always preceded by the previous timer being
    /// gone (fired or cancelled); at most one timer is ever pending.
    ArmTimer(Duration),
    /// Drop the pending timer.
    CancelTimer,
    /// Emit `PlaybackStarted`.
    NotifyStarted,
    /// Emit `PlaybackFinished` and tear down the frame set.
    NotifyFinished,
    /// Emit `FrameAdvanced` for this sequence position.
    NotifyFrame(usize),
    /// Emit `ForecastInvalidated` and tear down the frame set.
    NotifyInvalidated,
}

/// The state machine driving frame-by-frame animation.
#[derive(Debug)]
pub struct PlaybackScheduler {
    phase: PlaybackPhase,
    frame_count: usize,
    downloaded: bool,
    frame_interval: Duration,
}

impl PlaybackScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            frame_count: 0,
            downloaded: false,
            frame_interval,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Sequence position of the visible forecast frame, if one is shown.
    pub fn current_frame(&self) -> Option<usize> {
        match self.phase {
            PlaybackPhase::Playing(i) | PlaybackPhase::Paused(i) => Some(i),
            _ => None,
        }
    }

    /// Whether a downloaded frame set is held.
    pub fn downloaded(&self) -> bool {
        self.downloaded
    }

    /// Feed one input; returns the effects to execute, in order.
    pub fn handle(&mut self, input: PlaybackInput) -> Vec<Effect> {
        match input {
            PlaybackInput::TogglePlay => self.on_toggle(),
            PlaybackInput::FramesReady { frames } => self.on_frames_ready(frames),
            PlaybackInput::TimerFired => self.on_timer(),
            PlaybackInput::Invalidate => self.on_invalidate(),
        }
    }

    fn on_toggle(&mut self) -> Vec<Effect> {
        match self.phase {
            PlaybackPhase::Idle => {
                if self.downloaded && self.frame_count > 0 {
                    self.start_playing()
                } else {
                    self.phase = PlaybackPhase::Downloading;
                    vec![Effect::BeginDownload]
                }
            }
            // A toggle while the barrier is pending does nothing; the
            // settle signal will start playback.
            PlaybackPhase::Downloading => vec![],
            PlaybackPhase::Playing(i) => {
                self.phase = PlaybackPhase::Paused(i);
                vec![Effect::CancelTimer]
            }
            PlaybackPhase::Paused(i) => {
                // Resume at the paused frame; it is already visible.
                self.phase = PlaybackPhase::Playing(i);
                vec![Effect::ArmTimer(self.frame_interval)]
            }
        }
    }

    fn on_frames_ready(&mut self, frames: usize) -> Vec<Effect> {
        if self.phase != PlaybackPhase::Downloading {
            // Stale settle signal after an abort.
            return vec![];
        }
        self.downloaded = true;
        self.frame_count = frames;
        if frames == 0 {
            // Every horizon failed; nothing to play.
            self.downloaded = false;
            self.phase = PlaybackPhase::Idle;
            return vec![];
        }
        self.start_playing()
    }

    fn on_timer(&mut self) -> Vec<Effect> {
        let i = match self.phase {
            PlaybackPhase::Playing(i) => i,
            // A fire that raced a cancellation; the timer is gone.
            _ => return vec![],
        };

        if i + 1 < self.frame_count {
            self.phase = PlaybackPhase::Playing(i + 1);
            vec![
                Effect::Swap {
                    add: SwapTarget::Frame(i + 1),
                    remove: SwapTarget::Frame(i),
                },
                Effect::NotifyFrame(i + 1),
                Effect::ArmTimer(self.frame_interval),
            ]
        } else {
            // Past the last frame: restore the primary layer and drop the
            // downloaded set so the next play re-downloads fresh frames.
            self.reset();
            vec![
                Effect::Swap {
                    add: SwapTarget::Primary,
                    remove: SwapTarget::Frame(i),
                },
                Effect::NotifyFinished,
            ]
        }
    }

    fn on_invalidate(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.phase {
            PlaybackPhase::Idle if !self.downloaded => return effects,
            PlaybackPhase::Playing(i) => {
                effects.push(Effect::CancelTimer);
                effects.push(Effect::Swap {
                    add: SwapTarget::Primary,
                    remove: SwapTarget::Frame(i),
                });
            }
            PlaybackPhase::Paused(i) => {
                effects.push(Effect::Swap {
                    add: SwapTarget::Primary,
                    remove: SwapTarget::Frame(i),
                });
            }
            PlaybackPhase::Idle | PlaybackPhase::Downloading => {}
        }
        self.reset();
        effects.push(Effect::NotifyInvalidated);
        effects
    }

    fn start_playing(&mut self) -> Vec<Effect> {
        self.phase = PlaybackPhase::Playing(0);
        vec![
            Effect::NotifyStarted,
            // The primary layer leaves exactly when the first frame
            // arrives, as one gap-free swap.
            Effect::Swap {
                add: SwapTarget::Frame(0),
                remove: SwapTarget::Primary,
            },
            Effect::NotifyFrame(0),
            Effect::ArmTimer(self.frame_interval),
        ]
    }

    fn reset(&mut self) {
        self.phase = PlaybackPhase::Idle;
        self.downloaded = false;
        self.frame_count = 0;
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}
