//! The nowcast controller.
//!
//! One task owns all playback and frame-set state; commands arrive on a
//! channel and the single frame timer is multiplexed into the same
//! `select!` loop, so every mutation happens on one logical event loop.
//! The readiness tracker is the only piece touched from outside it (by
//! the display's tile pipeline).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use radar_common::{tile, BoundingBox, FrameTime, RadarResult, TileSource};
use recolor::ColorMapRegistry;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

use crate::capability::{forecast_url, CapabilityDocument, ForecastDescription, ForecastFetcher};
use crate::config::NowcastConfig;
use crate::display::{LayerId, LayerSpec, MapDisplay};
use crate::events::{EventBus, NowcastEvent};
use crate::frames::{ForecastFrame, ForecastFrameSet};
use crate::playback::{Effect, PlaybackInput, PlaybackScheduler, SwapTarget};
use crate::readiness::{GroupId, TileReadinessTracker};
use crate::swap::LayerSwapCoordinator;

/// Commands consumed by the controller loop.
enum Command {
    TogglePlay,
    Capability(CapabilityDocument),
    ForecastFetched {
        generation: u64,
        index: u32,
        result: RadarResult<ForecastDescription>,
    },
    FramesSettled {
        generation: u64,
    },
    Shutdown,
}

/// Timer manipulation requested by a command handler.
enum TimerOp {
    Arm(Duration),
    Cancel,
}

/// Status readable without a loop round-trip.
struct SharedStatus {
    ready: AtomicBool,
    current_frame_time: Mutex<Option<DateTime<Utc>>>,
    observation_time: Mutex<Option<DateTime<Utc>>>,
}

impl SharedStatus {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            current_frame_time: Mutex::new(None),
            observation_time: Mutex::new(None),
        }
    }
}

/// The live radar layer and its coverage mask.
struct PrimaryLayer {
    tile_id: String,
    layer: LayerId,
    spec: LayerSpec,
    mask: Option<LayerId>,
}

/// The controller facade handed to the UI collaborator.
///
/// Holds an explicit reference to everything it drives; there is no
/// ambient global instance.
pub struct RadarController {
    cmd_tx: mpsc::UnboundedSender<Command>,
    events: Arc<EventBus>,
    status: Arc<SharedStatus>,
    registry: Arc<ColorMapRegistry>,
    tracker: Arc<TileReadinessTracker>,
    display: Arc<dyn MapDisplay>,
    fetcher: Arc<dyn ForecastFetcher>,
    task: JoinHandle<()>,
}

impl RadarController {
    /// Spawn the controller loop. Must be called inside a Tokio runtime.
    pub fn new(
        display: Arc<dyn MapDisplay>,
        fetcher: Arc<dyn ForecastFetcher>,
        config: NowcastConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let events = Arc::new(EventBus::default());
        let status = Arc::new(SharedStatus::new());
        let tracker = Arc::new(TileReadinessTracker::new());
        let registry = Arc::new(ColorMapRegistry::with_builtins());

        let controller_loop = ControllerLoop {
            scheduler: PlaybackScheduler::new(config.frame_interval),
            horizons: config.horizons,
            step_seconds: config.step_seconds,
            forecast_available: false,
            ready: false,
            swap: LayerSwapCoordinator::new(display.clone()),
            tracker: tracker.clone(),
            fetcher: fetcher.clone(),
            events: events.clone(),
            status: status.clone(),
            cmd_tx: cmd_tx.clone(),
            frames: None,
            primary: None,
            generation: 0,
            config,
        };
        let task = tokio::spawn(controller_loop.run(cmd_rx));

        Self {
            cmd_tx,
            events,
            status,
            registry,
            tracker,
            display,
            fetcher,
            task,
        }
    }

    /// Fetch a tile-set capability and apply it.
    ///
    /// A transport or parse failure is reported on the event stream and
    /// returned; the client stays in its last good state and nothing is
    /// retried.
    pub async fn load_capability(&self, url: &str) -> RadarResult<()> {
        match self.fetcher.fetch_capability(url).await {
            Ok(doc) => self.process_capability(doc),
            Err(e) => {
                warn!(url, error = %e, "Capability fetch failed");
                self.events.emit(NowcastEvent::FetchFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Apply an already-fetched tile-set capability.
    pub fn process_capability(&self, doc: CapabilityDocument) -> RadarResult<()> {
        // Reject up front so the loop only ever sees valid documents.
        doc.radar.base_time()?;
        let _ = self.cmd_tx.send(Command::Capability(doc));
        Ok(())
    }

    /// Play/pause toggle.
    pub fn toggle_play(&self) {
        let _ = self.cmd_tx.send(Command::TogglePlay);
    }

    /// Switch the active color map and repaint. Cached tiles are
    /// recolored in place; nothing is refetched.
    pub fn set_colormap(&self, name: &str) -> RadarResult<()> {
        self.registry.activate(name)?;
        self.display.request_repaint();
        Ok(())
    }

    /// Names of the selectable color maps.
    pub fn colormaps(&self) -> Vec<String> {
        self.registry.names()
    }

    /// The registry the display's recolor pass reads from.
    pub fn registry(&self) -> Arc<ColorMapRegistry> {
        self.registry.clone()
    }

    /// The readiness tracker the display's tile pipeline reports to.
    pub fn tracker(&self) -> Arc<TileReadinessTracker> {
        self.tracker.clone()
    }

    /// Coarse ready/loading flag for UI feedback.
    pub fn is_ready(&self) -> bool {
        self.status.ready.load(Ordering::Relaxed)
    }

    /// Timestamp of the visible forecast frame, if one is shown.
    pub fn current_frame_time(&self) -> Option<DateTime<Utc>> {
        *self.status.current_frame_time.lock().unwrap()
    }

    /// Observation time of the live radar composite.
    pub fn observation_time(&self) -> Option<DateTime<Utc>> {
        *self.status.observation_time.lock().unwrap()
    }

    /// Subscribe to the typed event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<NowcastEvent> {
        self.events.subscribe()
    }

    /// Stop the controller loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

/// State owned by the controller task.
struct ControllerLoop {
    config: NowcastConfig,
    scheduler: PlaybackScheduler,
    swap: LayerSwapCoordinator,
    tracker: Arc<TileReadinessTracker>,
    fetcher: Arc<dyn ForecastFetcher>,
    events: Arc<EventBus>,
    status: Arc<SharedStatus>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    frames: Option<ForecastFrameSet>,
    primary: Option<PrimaryLayer>,
    /// Bumped whenever forecast state is (re)built or torn down; stale
    /// callbacks compare against it and drop out.
    generation: u64,
    /// Horizon parameters from the latest capability.
    horizons: u32,
    step_seconds: u32,
    forecast_available: bool,
    ready: bool,
}

impl ControllerLoop {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        // The one timer. `armed` gates polling so the expired sleep is
        // never polled again until it is reset.
        let timer = tokio::time::sleep(Duration::from_secs(0));
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    if matches!(cmd, Command::Shutdown) {
                        break;
                    }
                    let ops = self.on_command(cmd);
                    apply_timer_ops(ops, timer.as_mut(), &mut armed);
                }
                () = timer.as_mut(), if armed => {
                    armed = false;
                    let ops = self.step(PlaybackInput::TimerFired);
                    apply_timer_ops(ops, timer.as_mut(), &mut armed);
                }
            }
        }
        debug!("Controller loop stopped");
    }

    fn on_command(&mut self, cmd: Command) -> Vec<TimerOp> {
        match cmd {
            Command::TogglePlay => self.on_toggle_play(),
            Command::Capability(doc) => self.on_capability(doc),
            Command::ForecastFetched {
                generation,
                index,
                result,
            } => self.on_forecast_fetched(generation, index, result),
            Command::FramesSettled { generation } => self.on_frames_settled(generation),
            // Handled in run().
            Command::Shutdown => vec![],
        }
    }

    fn on_toggle_play(&mut self) -> Vec<TimerOp> {
        if self.primary.is_none() {
            warn!("Play requested before a tile-set capability arrived");
            return vec![];
        }
        if !self.forecast_available && !self.scheduler.downloaded() {
            warn!("Play requested but the tile-set publishes no forecast");
            return vec![];
        }
        self.step(PlaybackInput::TogglePlay)
    }

    fn on_capability(&mut self, doc: CapabilityDocument) -> Vec<TimerOp> {
        if let Some(primary) = &self.primary {
            if primary.tile_id == doc.radar.tile_id {
                debug!(tile_id = %doc.radar.tile_id, "Capability names the live tile-set; ignoring");
                return vec![];
            }
        }

        let base_time = match doc.radar.base_time() {
            Ok(t) => t,
            // process_capability validated this; never build a layer from
            // a document that slipped through anyway.
            Err(e) => {
                warn!(error = %e, "Rejecting capability");
                return vec![];
            }
        };

        // A new base image invalidates in-flight or completed forecast.
        let timer_ops = self.step(PlaybackInput::Invalidate);
        self.generation += 1;

        let layer = LayerId::new(format!("radar-{}", doc.radar.tile_id));
        let source = TileSource {
            url_template: tile::url_template(&self.config.tile_base_url, &doc.radar.tile_id),
            min_zoom: self.config.min_zoom,
            max_zoom: self.config.max_zoom,
            attribution: self.config.attribution.clone(),
        };
        let spec = LayerSpec::TiledRaster {
            source,
            opacity: self.config.primary_opacity,
            tile_group: None,
        };
        let mask = doc.radar.extent.map(|extent| {
            (
                LayerId::new(format!("coverage-{}", doc.radar.tile_id)),
                LayerSpec::CoverageMask {
                    extent: BoundingBox::from_array(extent),
                },
            )
        });

        // First add and fetch the new layer, then remove the old one, so
        // the map is never without radar imagery.
        match self.primary.take() {
            Some(old) => {
                self.swap.swap((&layer, &spec), &old.layer);
                if let Some(old_mask) = old.mask {
                    self.swap.detach(&old_mask);
                }
            }
            None => self.swap.attach(&layer, &spec),
        }
        if let Some((mask_id, mask_spec)) = &mask {
            self.swap.attach(mask_id, mask_spec);
        }

        if let Some(nowcast) = &doc.nowcast {
            self.forecast_available = true;
            self.horizons = nowcast.horizons.unwrap_or(self.config.horizons);
            self.step_seconds = nowcast.interval_seconds.unwrap_or(self.config.step_seconds);
        } else {
            self.forecast_available = false;
        }

        *self.status.observation_time.lock().unwrap() = Some(base_time);
        self.set_ready(self.forecast_available);
        info!(
            tile_id = %doc.radar.tile_id,
            forecast = self.forecast_available,
            "Switched primary tile-set"
        );

        self.primary = Some(PrimaryLayer {
            tile_id: doc.radar.tile_id,
            layer,
            spec,
            mask: mask.map(|(id, _)| id),
        });

        timer_ops
    }

    fn on_forecast_fetched(
        &mut self,
        generation: u64,
        index: u32,
        result: RadarResult<ForecastDescription>,
    ) -> Vec<TimerOp> {
        if generation != self.generation {
            debug!(generation, index, "Dropping forecast result from stale generation");
            return vec![];
        }
        let Some(group) = self.frames.as_ref().map(|s| s.group()) else {
            return vec![];
        };

        let outcome = result.and_then(|desc| {
            let source = desc.tile_source(self.config.min_zoom, self.config.max_zoom)?;
            let base_time = desc.base_time()?;
            Ok((source, base_time))
        });

        match outcome {
            Ok((source, base_time)) => {
                let layer = LayerId::new(format!("nowcast-{}-{}", generation, index));
                let spec = LayerSpec::TiledRaster {
                    source,
                    // Invisible, but attached: tile prefetch starts now.
                    opacity: 0.0,
                    tile_group: Some(group),
                };
                self.swap.attach(&layer, &spec);
                self.tracker.frame_attached(group);

                let time = FrameTime::new(base_time, index, self.step_seconds);
                if let Some(set) = self.frames.as_mut() {
                    set.push(ForecastFrame {
                        index,
                        time,
                        layer,
                        spec,
                        loaded: false,
                    });
                }
            }
            Err(e) => {
                let url = forecast_url(
                    &self.config.forecast_base_url,
                    self.config.lead_minutes(index, self.step_seconds),
                );
                warn!(index, error = %e, "Forecast horizon failed; playing without it");
                self.events.emit(NowcastEvent::FetchFailed {
                    url,
                    message: e.to_string(),
                });
                // The barrier settles over the frames that actually
                // arrived instead of waiting forever.
                self.tracker.reduce_expected(group);
            }
        }
        vec![]
    }

    fn on_frames_settled(&mut self, generation: u64) -> Vec<TimerOp> {
        if generation != self.generation {
            debug!(generation, "Dropping settle signal from stale generation");
            return vec![];
        }

        let (layers, opacity, survivors) = {
            let Some(set) = self.frames.as_mut() else {
                return vec![];
            };
            set.mark_downloaded();
            let layers: Vec<LayerId> = set.frames().iter().map(|f| f.layer.clone()).collect();
            (layers, set.playback_opacity(), set.len())
        };

        // Detach every frame. Tiles stay cached; the specs now carry the
        // playback opacity for re-attach during the animation.
        for layer in &layers {
            self.swap.detach(layer);
            self.swap.set_opacity(layer, opacity);
        }

        info!(generation, survivors, "Forecast frames ready");
        self.set_ready(true);
        let timer_ops = self.step(PlaybackInput::FramesReady { frames: survivors });
        if survivors == 0 {
            // Every horizon failed; nothing will ever play this set.
            self.teardown_frames();
        }
        timer_ops
    }

    /// Feed the state machine and execute the resulting effects.
    fn step(&mut self, input: PlaybackInput) -> Vec<TimerOp> {
        let effects = self.scheduler.handle(input);
        self.apply_effects(effects)
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) -> Vec<TimerOp> {
        let mut timer_ops = Vec::new();
        for effect in effects {
            match effect {
                Effect::BeginDownload => self.begin_download(),
                Effect::Swap { add, remove } => self.execute_swap(add, remove),
                Effect::ArmTimer(interval) => timer_ops.push(TimerOp::Arm(interval)),
                Effect::CancelTimer => timer_ops.push(TimerOp::Cancel),
                Effect::NotifyStarted => self.events.emit(NowcastEvent::PlaybackStarted),
                Effect::NotifyFrame(position) => {
                    let timestamp = self
                        .frames
                        .as_ref()
                        .and_then(|set| set.frame(position))
                        .map(|frame| frame.display_time());
                    if let Some(timestamp) = timestamp {
                        *self.status.current_frame_time.lock().unwrap() = Some(timestamp);
                        self.events.emit(NowcastEvent::FrameAdvanced { timestamp });
                    }
                }
                Effect::NotifyFinished => {
                    *self.status.current_frame_time.lock().unwrap() = None;
                    self.events.emit(NowcastEvent::PlaybackFinished);
                    self.teardown_frames();
                }
                Effect::NotifyInvalidated => {
                    *self.status.current_frame_time.lock().unwrap() = None;
                    self.events.emit(NowcastEvent::ForecastInvalidated);
                    self.teardown_frames();
                    self.set_ready(self.forecast_available);
                }
            }
        }
        timer_ops
    }

    fn begin_download(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let group = GroupId(generation);
        let horizons = self.horizons;
        let step_seconds = self.step_seconds;

        self.set_ready(false);
        // Arm before any frame can attach, so tile-start callbacks can
        // never race ahead of the barrier.
        self.tracker.begin_tracking(group, horizons as usize);
        self.frames = Some(ForecastFrameSet::new(group, self.config.playback_opacity));

        info!(generation, horizons, step_seconds, "Starting forecast download");

        for index in 0..horizons {
            let url = forecast_url(
                &self.config.forecast_base_url,
                self.config.lead_minutes(index, step_seconds),
            );
            let fetcher = self.fetcher.clone();
            let tx = self.cmd_tx.clone();
            tokio::spawn(async move {
                let result = fetcher.fetch_forecast(&url).await;
                let _ = tx.send(Command::ForecastFetched {
                    generation,
                    index,
                    result,
                });
            });
        }

        let tracker = self.tracker.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            if tracker.settled(group).await {
                let _ = tx.send(Command::FramesSettled { generation });
            }
        });
    }

    fn execute_swap(&mut self, add: SwapTarget, remove: SwapTarget) {
        let added = self.layer_for(add);
        let removed = self.layer_for(remove);
        match (added, removed) {
            (Some((add_id, add_spec)), Some((remove_id, _))) => {
                self.swap.swap((&add_id, &add_spec), &remove_id);
            }
            _ => warn!(?add, ?remove, "Swap against missing layer skipped"),
        }
    }

    fn layer_for(&self, target: SwapTarget) -> Option<(LayerId, LayerSpec)> {
        match target {
            SwapTarget::Primary => self
                .primary
                .as_ref()
                .map(|p| (p.layer.clone(), p.spec.clone())),
            SwapTarget::Frame(position) => self
                .frames
                .as_ref()
                .and_then(|set| set.frame(position))
                .map(|f| (f.layer.clone(), f.spec.clone())),
        }
    }

    /// Drop the frame set: detach every frame layer and retire the
    /// readiness group so late callbacks become no-ops.
    fn teardown_frames(&mut self) {
        if let Some(set) = self.frames.take() {
            self.tracker.abort(set.group());
            for frame in set.frames() {
                self.swap.detach(&frame.layer);
            }
        }
    }

    fn set_ready(&mut self, ready: bool) {
        if self.ready != ready {
            self.ready = ready;
            self.status.ready.store(ready, Ordering::Relaxed);
            self.events.emit(NowcastEvent::ForecastReady { ready });
        }
    }
}

fn apply_timer_ops(ops: Vec<TimerOp>, mut timer: std::pin::Pin<&mut Sleep>, armed: &mut bool) {
    for op in ops {
        match op {
            TimerOp::Arm(interval) => {
                timer.as_mut().reset(Instant::now() + interval);
                *armed = true;
            }
            TimerOp::Cancel => *armed = false,
        }
    }
}
