//! Effect lifecycle engine
//!
//! One state machine per effect instance:
//!
//! ```text
//! Created ──initialize()──▶ Initializing ──▶ Rendering ──stop()──▶ Stopped
//!                               │
//!                               └──acquisition failure──▶ Failed
//! ```
//!
//! `Failed` is terminal and behaves like `Stopped`. Frames are requested from
//! the injected [`FrameScheduler`] one at a time; a callback whose handle is
//! not the pending one (because `stop()` ran in between) is ignored.

use std::time::{Duration, Instant};

use crate::controls::bridge::{write_defaults, ControlBridge};
use crate::controls::{ClassKey, ControlDefinition, ControlStore, ControlValues};

use super::scheduler::{FrameHandle, FrameScheduler};
use super::surface::{rgba, Surface, SurfaceSet, SURFACE_ID};
use super::traits::{FrameTime, RenderBackend, RendererAcquisitionError, RendererFamily};

/// Default control sampling interval
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Identity of one effect instance, used as the host's update target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initializing,
    Rendering,
    Stopped,
    /// Acquisition failed; terminal, treated as stopped
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Rendering => "rendering",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }
}

/// Surface and sampling settings for a lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub surface_id: String,
    pub width: u32,
    pub height: u32,
    /// Minimum time between store re-reads during rendering
    pub sample_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            surface_id: SURFACE_ID.to_string(),
            width: 320,
            height: 200,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Host resources a lifecycle step needs
pub struct RenderEnv<'a> {
    pub store: &'a mut dyn ControlStore,
    pub scheduler: &'a mut dyn FrameScheduler,
    pub surfaces: &'a mut SurfaceSet,
    pub update_target: &'a mut Option<InstanceId>,
}

#[derive(Debug, Default)]
struct FrameClock {
    started: Option<Instant>,
    last: Option<Instant>,
    frames: u64,
}

impl FrameClock {
    fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.last = Some(now);
        self.frames = 0;
    }

    fn tick(&mut self, now: Instant) -> FrameTime {
        let started = *self.started.get_or_insert(now);
        let last = self.last.replace(now).unwrap_or(now);
        let time = FrameTime::new(
            now.saturating_duration_since(started),
            now.saturating_duration_since(last),
            self.frames,
        );
        self.frames += 1;
        time
    }
}

/// Rate limit for re-reading the store during rendering
#[derive(Debug)]
struct SamplingGate {
    interval: Duration,
    last_sample: Option<Instant>,
    /// A non-forced update arrived inside the window
    dirty: bool,
}

impl SamplingGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sample: None,
            dirty: false,
        }
    }

    /// The interval since the last sample has elapsed
    fn window_open(&self, now: Instant) -> bool {
        self.last_sample
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Frames also pick up updates deferred inside the window
    fn frame_due(&self, now: Instant) -> bool {
        self.dirty || self.window_open(now)
    }

    fn mark(&mut self, now: Instant) {
        self.last_sample = Some(now);
        self.dirty = false;
    }
}

/// Lifecycle of one effect instance
pub struct EffectLifecycle {
    instance: InstanceId,
    backend: Box<dyn RenderBackend>,
    controls: Vec<ControlDefinition>,
    config: LifecycleConfig,
    state: LifecycleState,
    pending_frame: Option<FrameHandle>,
    clock: FrameClock,
    gate: SamplingGate,
    failure: Option<RendererAcquisitionError>,
    applied_updates: u64,
    /// Values as last read through the bridge
    applied_values: ControlValues,
}

impl EffectLifecycle {
    pub fn new(
        instance: InstanceId,
        backend: Box<dyn RenderBackend>,
        controls: Vec<ControlDefinition>,
        config: LifecycleConfig,
    ) -> Self {
        let gate = SamplingGate::new(config.sample_interval);
        Self {
            instance,
            backend,
            controls,
            config,
            state: LifecycleState::Created,
            pending_frame: None,
            clock: FrameClock::default(),
            gate,
            failure: None,
            applied_updates: 0,
            applied_values: ControlValues::new(),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn family(&self) -> RendererFamily {
        self.backend.family()
    }

    pub fn effect_class(&self) -> ClassKey {
        self.backend.effect_class()
    }

    pub fn controls(&self) -> &[ControlDefinition] {
        &self.controls
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending_frame
    }

    /// Acquisition error that moved the lifecycle to `Failed`
    pub fn failure(&self) -> Option<&RendererAcquisitionError> {
        self.failure.as_ref()
    }

    /// Number of times controls were applied to the renderer
    pub fn applied_updates(&self) -> u64 {
        self.applied_updates
    }

    /// Coerced values from the most recent store read
    pub fn applied_values(&self) -> &ControlValues {
        &self.applied_values
    }

    pub fn frames_drawn(&self) -> u64 {
        self.clock.frames
    }

    /// Acquire the surface and renderer, seed defaults and start rendering
    ///
    /// Only valid from `Created`. Acquisition failures end in `Failed` with
    /// an error painted on the surface; they are not returned.
    pub async fn initialize(&mut self, env: RenderEnv<'_>, now: Instant) {
        if self.state != LifecycleState::Created {
            tracing::debug!(instance = %self.instance, state = self.state.as_str(), "initialize ignored");
            return;
        }
        self.state = LifecycleState::Initializing;
        tracing::debug!(
            instance = %self.instance,
            class = self.backend.effect_class().name(),
            family = %self.backend.family(),
            "Effect initializing"
        );

        let surface = match env.surfaces.ensure(&self.config.surface_id, self.config.width, self.config.height) {
            Ok(surface) => surface,
            Err(e) => {
                self.fail(e, None, env.update_target);
                return;
            }
        };

        let acquired = self.backend.acquire(surface).await;
        if let Err(e) = acquired {
            self.fail(e, env.surfaces.get_mut(&self.config.surface_id), env.update_target);
            return;
        }

        write_defaults(env.store, &self.controls);
        self.apply(&*env.store, now);
        *env.update_target = Some(self.instance);

        self.state = LifecycleState::Rendering;
        self.clock.start(now);
        self.pending_frame = Some(env.scheduler.request_frame());
        tracing::info!(
            instance = %self.instance,
            class = self.backend.effect_class().name(),
            controls = self.controls.len(),
            "Effect rendering"
        );
    }

    /// Frame callback; returns false when the handle is stale
    ///
    /// Draws first, then re-reads the store when the sampling gate is open,
    /// then requests the next frame.
    pub fn on_frame(&mut self, handle: FrameHandle, now: Instant, env: RenderEnv<'_>) -> bool {
        if self.state != LifecycleState::Rendering || self.pending_frame != Some(handle) {
            return false;
        }
        self.pending_frame = None;

        let surface = match env.surfaces.ensure(&self.config.surface_id, self.config.width, self.config.height) {
            Ok(surface) => surface,
            Err(e) => {
                self.fail(e, None, env.update_target);
                return false;
            }
        };

        let time = self.clock.tick(now);
        self.backend.draw_frame(surface, time);

        if self.gate.frame_due(now) {
            self.apply(&*env.store, now);
        }

        self.pending_frame = Some(env.scheduler.request_frame());
        true
    }

    /// Re-read the store and apply it
    ///
    /// A no-op unless rendering. `force` bypasses the sampling gate; a
    /// non-forced update inside the window is deferred to the next frame.
    /// Returns whether controls were applied now.
    pub fn update(&mut self, force: bool, store: &dyn ControlStore, now: Instant) -> bool {
        if self.state != LifecycleState::Rendering {
            return false;
        }
        if force || self.gate.window_open(now) {
            self.apply(store, now);
            true
        } else {
            self.gate.dirty = true;
            false
        }
    }

    /// Stop rendering and release resources
    ///
    /// Idempotent and valid from any state, including a partially
    /// initialized one. Cancels at most one pending frame.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler, update_target: &mut Option<InstanceId>) {
        self.release_target(update_target);
        if self.state.is_terminal() {
            return;
        }
        if let Some(handle) = self.pending_frame.take() {
            scheduler.cancel_frame(handle);
        }
        self.backend.release();
        let previous = self.state;
        self.state = LifecycleState::Stopped;
        tracing::debug!(instance = %self.instance, from = previous.as_str(), "Effect stopped");
    }

    fn apply(&mut self, store: &dyn ControlStore, now: Instant) {
        let bridge = ControlBridge::new(store, &self.controls);
        self.backend.apply_controls(&bridge);
        self.applied_values = bridge.snapshot();
        self.gate.mark(now);
        self.applied_updates += 1;
    }

    fn release_target(&self, update_target: &mut Option<InstanceId>) {
        if *update_target == Some(self.instance) {
            *update_target = None;
        }
    }

    fn fail(
        &mut self,
        error: RendererAcquisitionError,
        surface: Option<&mut Surface>,
        update_target: &mut Option<InstanceId>,
    ) {
        tracing::error!(
            instance = %self.instance,
            class = self.backend.effect_class().name(),
            error = %error,
            "Renderer acquisition failed"
        );
        self.backend.release();
        self.release_target(update_target);
        self.pending_frame = None;
        self.state = LifecycleState::Failed;
        if let Some(surface) = surface {
            paint_error(surface, &error);
        }
        self.failure = Some(error);
    }
}

/// Best-effort error message on the surface
fn paint_error(surface: &mut Surface, error: &RendererAcquisitionError) {
    let mut canvas = surface.canvas();
    canvas.clear(rgba(0.12, 0.0, 0.0, 1.0));
    let width = canvas.width();
    canvas.fill_rect(0.0, 0.0, width, 24.0, rgba(0.7, 0.1, 0.1, 1.0));
    canvas.fill_text(8.0, 16.0, format!("Lightscript failed to start: {}", error), rgba(1.0, 1.0, 1.0, 1.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::controls::{ControlSpec, MemoryStore};
    use crate::effects::scheduler::ManualScheduler;
    use crate::effects::traits::AcquireFuture;
    use serde_json::json;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        log: Log,
        fail: bool,
    }

    impl RenderBackend for Recorder {
        fn family(&self) -> RendererFamily {
            RendererFamily::Canvas2d
        }

        fn effect_class(&self) -> ClassKey {
            ClassKey::of::<Recorder>()
        }

        fn acquire<'a>(&'a mut self, _surface: &'a mut Surface) -> AcquireFuture<'a> {
            Box::pin(async move {
                self.log.borrow_mut().push("acquire".into());
                if self.fail {
                    Err(RendererAcquisitionError::NoAdapter)
                } else {
                    Ok(())
                }
            })
        }

        fn draw_frame(&mut self, _surface: &mut Surface, time: FrameTime) {
            self.log.borrow_mut().push(format!("draw {}", time.frame));
        }

        fn apply_controls(&mut self, bridge: &ControlBridge<'_>) {
            self.log.borrow_mut().push(format!("apply speed={}", bridge.number("speed")));
        }

        fn release(&mut self) {
            self.log.borrow_mut().push("release".into());
        }
    }

    struct Harness {
        store: MemoryStore,
        scheduler: ManualScheduler,
        surfaces: SurfaceSet,
        target: Option<InstanceId>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                scheduler: ManualScheduler::new(),
                surfaces: SurfaceSet::new(),
                target: None,
            }
        }

        fn env(&mut self) -> RenderEnv<'_> {
            RenderEnv {
                store: &mut self.store,
                scheduler: &mut self.scheduler,
                surfaces: &mut self.surfaces,
                update_target: &mut self.target,
            }
        }
    }

    fn lifecycle(fail: bool) -> (EffectLifecycle, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let controls = vec![ControlSpec::number("speed", "Speed", 5.0, 1.0, 10.0).build().unwrap()];
        let config = LifecycleConfig {
            width: 16,
            height: 8,
            ..Default::default()
        };
        let backend = Recorder { log: log.clone(), fail };
        (EffectLifecycle::new(InstanceId(1), Box::new(backend), controls, config), log)
    }

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_initialize_order() {
        let mut h = Harness::new();
        let (mut lc, log) = lifecycle(false);
        let t0 = Instant::now();

        // Nothing renders before initialization
        assert!(!lc.on_frame(FrameHandle(1), t0, h.env()));
        assert!(entries(&log).is_empty());

        pollster::block_on(lc.initialize(h.env(), t0));
        assert_eq!(lc.state(), LifecycleState::Rendering);
        assert_eq!(entries(&log), ["acquire", "apply speed=5"]);
        assert_eq!(h.store.get("speed"), Some(json!(5.0)));
        assert_eq!(h.target, Some(InstanceId(1)));
        assert_eq!(h.scheduler.pending().len(), 1);

        let handle = h.scheduler.take_due(t0)[0];
        assert!(lc.on_frame(handle, t0 + Duration::from_millis(16), h.env()));
        assert_eq!(entries(&log)[2], "draw 0");
        assert_eq!(h.scheduler.pending().len(), 1);
    }

    #[test]
    fn test_initialize_only_from_created() {
        let mut h = Harness::new();
        let (mut lc, log) = lifecycle(false);
        let t0 = Instant::now();
        pollster::block_on(lc.initialize(h.env(), t0));
        pollster::block_on(lc.initialize(h.env(), t0));
        assert_eq!(entries(&log).iter().filter(|e| *e == "acquire").count(), 1);
    }

    #[test]
    fn test_acquisition_failure_is_contained() {
        let mut h = Harness::new();
        let (mut lc, log) = lifecycle(true);
        pollster::block_on(lc.initialize(h.env(), Instant::now()));

        assert_eq!(lc.state(), LifecycleState::Failed);
        assert_eq!(lc.failure(), Some(&RendererAcquisitionError::NoAdapter));
        assert_eq!(entries(&log), ["acquire", "release"]);
        assert!(h.scheduler.pending().is_empty());
        assert!(h.target.is_none());
        assert!(h.store.is_empty());

        let surface = h.surfaces.get(SURFACE_ID).unwrap();
        assert!(surface.overlays()[0].text.contains("no compatible GPU adapter"));

        // Terminal: stop is a no-op
        lc.stop(&mut h.scheduler, &mut h.target);
        assert_eq!(lc.state(), LifecycleState::Failed);
        assert_eq!(entries(&log).len(), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut h = Harness::new();
        let (mut lc, log) = lifecycle(false);
        let t0 = Instant::now();
        pollster::block_on(lc.initialize(h.env(), t0));
        let handle = lc.pending_frame().unwrap();

        lc.stop(&mut h.scheduler, &mut h.target);
        lc.stop(&mut h.scheduler, &mut h.target);

        assert_eq!(lc.state(), LifecycleState::Stopped);
        assert_eq!(h.scheduler.cancelled(), 1);
        assert!(h.target.is_none());
        assert_eq!(entries(&log).iter().filter(|e| *e == "release").count(), 1);

        // A callback that was already in flight is ignored
        assert!(!lc.on_frame(handle, t0, h.env()));
        assert!(!entries(&log).iter().any(|e| e.starts_with("draw")));
    }

    #[test]
    fn test_stop_before_initialize() {
        let mut h = Harness::new();
        let (mut lc, _log) = lifecycle(false);
        lc.stop(&mut h.scheduler, &mut h.target);
        assert_eq!(lc.state(), LifecycleState::Stopped);
        assert_eq!(h.scheduler.cancelled(), 0);

        pollster::block_on(lc.initialize(h.env(), Instant::now()));
        assert_eq!(lc.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_stop_keeps_foreign_update_target() {
        let mut h = Harness::new();
        let (mut lc, _log) = lifecycle(false);
        pollster::block_on(lc.initialize(h.env(), Instant::now()));
        h.target = Some(InstanceId(42));
        lc.stop(&mut h.scheduler, &mut h.target);
        assert_eq!(h.target, Some(InstanceId(42)));
    }

    #[test]
    fn test_update_before_initialize_is_noop() {
        let h = Harness::new();
        let (mut lc, log) = lifecycle(false);
        assert!(!lc.update(true, &h.store, Instant::now()));
        assert!(!lc.update(false, &h.store, Instant::now()));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_update_sampling_gate() {
        let mut h = Harness::new();
        let (mut lc, log) = lifecycle(false);
        let t0 = Instant::now();
        pollster::block_on(lc.initialize(h.env(), t0));
        assert_eq!(lc.applied_updates(), 1);

        h.store.set("speed", json!(8));
        // Inside the window: deferred
        assert!(!lc.update(false, &h.store, t0 + Duration::from_millis(10)));
        assert_eq!(lc.applied_updates(), 1);
        // Forced: always applied
        assert!(lc.update(true, &h.store, t0 + Duration::from_millis(11)));
        assert_eq!(entries(&log).last().unwrap(), "apply speed=8");

        // Deferred update lands on the next frame even inside the window
        h.store.set("speed", json!(9));
        assert!(!lc.update(false, &h.store, t0 + Duration::from_millis(12)));
        let handle = h.scheduler.take_due(t0)[0];
        lc.on_frame(handle, t0 + Duration::from_millis(20), h.env());
        let log = entries(&log);
        assert_eq!(&log[log.len() - 2..], ["draw 0", "apply speed=9"]);
        assert_eq!(lc.applied_updates(), 3);

        // Rapid repetition stays deferred for the whole window
        for i in 0..50 {
            assert!(!lc.update(false, &h.store, t0 + Duration::from_millis(21 + i)));
        }
        assert_eq!(lc.applied_updates(), 3);

        // and collapses into a single re-read on the next frame
        let handle = h.scheduler.take_due(t0)[0];
        lc.on_frame(handle, t0 + Duration::from_millis(75), h.env());
        assert_eq!(lc.applied_updates(), 4);
        let handle = h.scheduler.take_due(t0)[0];
        lc.on_frame(handle, t0 + Duration::from_millis(90), h.env());
        assert_eq!(lc.applied_updates(), 4);
    }

    #[test]
    fn test_frame_failure_releases_update_target() {
        let mut h = Harness::new();
        let (mut lc, log) = lifecycle(false);
        let t0 = Instant::now();
        pollster::block_on(lc.initialize(h.env(), t0));
        let handle = lc.pending_frame().unwrap();

        // Surface lost, and it cannot be recreated at zero width
        h.surfaces = SurfaceSet::new();
        lc.config.width = 0;
        assert!(!lc.on_frame(handle, t0 + Duration::from_millis(16), h.env()));

        assert_eq!(lc.state(), LifecycleState::Failed);
        assert!(h.target.is_none());
        assert!(lc.pending_frame().is_none());
        assert!(!entries(&log).iter().any(|e| e.starts_with("draw")));

        // stop from the terminal state still drops a target naming this instance
        h.target = Some(InstanceId(1));
        lc.stop(&mut h.scheduler, &mut h.target);
        assert!(h.target.is_none());
        assert_eq!(entries(&log).iter().filter(|e| *e == "release").count(), 1);
    }

    #[test]
    fn test_frames_resample_after_interval() {
        let mut h = Harness::new();
        let (mut lc, _log) = lifecycle(false);
        let t0 = Instant::now();
        pollster::block_on(lc.initialize(h.env(), t0));

        for i in 1..=10u64 {
            let handle = h.scheduler.take_due(t0)[0];
            assert!(lc.on_frame(handle, t0 + Duration::from_millis(i * 25), h.env()));
        }
        // 250ms of frames at a 100ms interval: samples at 100ms and 200ms
        assert_eq!(lc.applied_updates(), 3);
        assert_eq!(lc.frames_drawn(), 10);
    }
}
