use tracing::{debug, info};

use super::clock::{FrameClock, FrameInfo};
use super::config::{ConfigError, LoopConfig};
use super::events::{DistributionReport, EventBuffer, RawInputEvent};
use super::host::{Host, HostError};
use super::input::{Gamepads, InputDevices, Keyboard, Mouse, PointerLock};
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::timer::{TimerError, TimerHandle, TimerSet};

/// Lifecycle of a scheduler.
///
/// Whether the first frame signal has been seen is tracked by the clock, so a scheduler that
/// was stopped and started again does not re-run the bootstrap frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// A frame is pending and will stop the loop instead of running.
    StopRequested,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No frame was pending.
    Ignored,
    /// First frame: clock baseline recorded, nothing ran.
    Bootstrapped,
    Stopped,
    Ran { update_steps: u32 },
}

/// Last state reported by the host for the display surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceState {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

/// Application callbacks. Every method defaults to doing nothing.
pub trait FrameHandler {
    /// Runs once per fixed step; `ctx.dt()` is the step length.
    fn update(&mut self, ctx: &mut LoopCtx<'_>) {
        let _ = ctx;
    }

    /// Runs once per frame, after all of the frame's updates.
    fn render(&mut self, ctx: &mut LoopCtx<'_>) {
        let _ = ctx;
    }

    fn resize(&mut self, ctx: &mut LoopCtx<'_>, width: u32, height: u32) {
        let _ = (ctx, width, height);
    }

    fn fullscreen_changed(&mut self, ctx: &mut LoopCtx<'_>, active: bool) {
        let _ = (ctx, active);
    }
}

impl FrameHandler for () {}

pub struct LoopCtx<'a> {
    clock: &'a FrameClock,
    input: &'a InputDevices,
    timers: &'a mut TimerSet,
    host: &'a mut dyn Host,
    state: &'a mut LoopState,
    surface: SurfaceState,
}

impl LoopCtx<'_> {
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    pub fn frame_time(&self) -> f64 {
        self.clock.frame_time()
    }

    pub fn dt(&self) -> f64 {
        self.clock.dt()
    }

    pub fn input(&self) -> &InputDevices {
        self.input
    }

    pub fn keyboard(&self) -> &Keyboard {
        self.input.keyboard()
    }

    pub fn mouse(&self) -> &Mouse {
        self.input.mouse()
    }

    pub fn gamepads(&self) -> &Gamepads {
        self.input.gamepads()
    }

    pub fn pointer_lock(&self) -> &PointerLock {
        self.input.pointer_lock()
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface
    }

    pub fn timers(&self) -> &TimerSet {
        &*self.timers
    }

    pub fn add_timer(&mut self, delay: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.timers.add(delay, callback)
    }

    pub fn add_periodic_timer(
        &mut self,
        period: f64,
        callback: impl FnMut() + 'static,
    ) -> Result<TimerHandle, TimerError> {
        self.timers.add_periodic(period, callback)
    }

    pub fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        cancel_timer(self.timers, handle)
    }

    pub fn clear_timers(&mut self) {
        self.timers.clear();
    }

    /// Same as [`FrameScheduler::stop`]; the current frame still finishes.
    pub fn stop(&mut self) {
        request_stop(self.state);
    }

    pub fn set_fullscreen(&mut self, active: bool) -> Result<(), HostError> {
        self.host.set_fullscreen(active)
    }

    pub fn set_pointer_lock(&mut self, locked: bool) -> Result<(), HostError> {
        self.host.set_pointer_lock(locked)
    }
}

impl FrameInfo for LoopCtx<'_> {
    fn frame(&self) -> u64 {
        self.clock.frame()
    }

    fn frame_time(&self) -> f64 {
        self.clock.frame_time()
    }
}

/// Fixed-step frame loop driven by a host's frame signal.
///
/// Each [`tick`](Self::tick) distributes the input queued since the previous tick, runs as many
/// fixed updates as the clamped wall delta allows (timers advance at the start of each step),
/// then renders once.
pub struct FrameScheduler<H, F = ()> {
    config: LoopConfig,
    clock: FrameClock,
    state: LoopState,
    listeners_attached: bool,
    events: EventBuffer,
    input: InputDevices,
    last_distribution: DistributionReport,
    timers: TimerSet,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    surface: SurfaceState,
    host: H,
    handler: F,
}

impl<H: Host, F: FrameHandler> FrameScheduler<H, F> {
    pub fn new(config: LoopConfig, host: H, handler: F) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            simulation_delta = config.simulation_delta,
            max_wall_delta = config.max_wall_delta,
            carry_remainder = config.carry_remainder,
            metrics_log_interval = config.metrics_log_interval,
            "loop_config"
        );

        let clock = FrameClock::new(config.simulation_delta, config.max_wall_delta);
        let metrics = MetricsAccumulator::new(config.metrics_log_interval);
        Ok(Self {
            config,
            clock,
            state: LoopState::Idle,
            listeners_attached: false,
            events: EventBuffer::new(),
            input: InputDevices::default(),
            last_distribution: DistributionReport::default(),
            timers: TimerSet::new(),
            metrics,
            metrics_handle: MetricsHandle::default(),
            surface: SurfaceState::default(),
            host,
            handler,
        })
    }

    /// Publishes metrics snapshots to `handle` instead of a private one.
    pub fn with_metrics_handle(mut self, handle: MetricsHandle) -> Self {
        self.metrics_handle = handle;
        self
    }

    /// Starts (or resumes) the loop. Listeners are attached on the first call only.
    pub fn start(&mut self) {
        match self.state {
            LoopState::Running => {}
            LoopState::StopRequested => {
                self.state = LoopState::Running;
                debug!(frame = self.clock.frame(), "loop_stop_cancelled");
            }
            LoopState::Idle | LoopState::Stopped => {
                if !self.listeners_attached {
                    self.host.attach_listeners();
                    self.listeners_attached = true;
                }
                if self.state == LoopState::Stopped {
                    self.metrics.restart(self.host.now());
                }
                self.state = LoopState::Running;
                self.host.request_next_frame();
                info!(frame = self.clock.frame(), "loop_started");
            }
        }
    }

    /// Asks the pending frame to end the loop instead of running.
    pub fn stop(&mut self) {
        request_stop(&mut self.state);
    }

    /// Handles one frame signal from the host.
    pub fn tick(&mut self) -> TickOutcome {
        if matches!(self.state, LoopState::Idle | LoopState::Stopped) {
            debug!(state = ?self.state, "tick_ignored");
            return TickOutcome::Ignored;
        }

        if !self.clock.is_initialized() {
            self.clock.bootstrap(self.host.now());
            self.metrics.restart(self.clock.frame_time());
            self.distribute_input();
            self.host.request_next_frame();
            debug!(frame_time = self.clock.frame_time(), "loop_bootstrapped");
            return TickOutcome::Bootstrapped;
        }

        if self.state == LoopState::StopRequested {
            self.state = LoopState::Stopped;
            info!(frame = self.clock.frame(), "loop_stopped");
            return TickOutcome::Stopped;
        }

        // Requested before any callback runs so a panicking callback cannot end the loop.
        self.host.request_next_frame();
        let wall_delta = self.clock.advance(self.host.now());
        self.distribute_input();

        let update_steps = self
            .clock
            .plan_steps(wall_delta, self.config.carry_remainder);
        for _ in 0..update_steps {
            self.clock.begin_step();
            self.timers.advance_all(self.clock.dt());
            self.timers.compact();

            let (handler, mut ctx) = self.split();
            handler.update(&mut ctx);
            self.metrics.record_update();
        }

        let (handler, mut ctx) = self.split();
        handler.render(&mut ctx);
        self.metrics
            .record_frame(self.clock.frame_time() - self.clock.previous_frame_time());
        self.publish_metrics();

        TickOutcome::Ran { update_steps }
    }

    /// Queues a raw event for the next tick, stamped with the current frame.
    pub fn push_event(&mut self, event: impl Into<RawInputEvent>) {
        let mut event = event.into();
        event.stamp_frame(self.clock.frame());
        self.events.push(event);
    }

    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.surface.width = width;
        self.surface.height = height;
        debug!(width, height, "surface_resized");

        let (handler, mut ctx) = self.split();
        handler.resize(&mut ctx, width, height);
    }

    pub fn notify_fullscreen_change(&mut self, active: bool) {
        self.surface.fullscreen = active;
        info!(fullscreen = active, "fullscreen_changed");

        let (handler, mut ctx) = self.split();
        handler.fullscreen_changed(&mut ctx, active);
    }

    pub fn set_fullscreen(&mut self, active: bool) -> Result<(), HostError> {
        self.host.set_fullscreen(active)
    }

    pub fn set_pointer_lock(&mut self, locked: bool) -> Result<(), HostError> {
        self.host.set_pointer_lock(locked)
    }

    pub fn add_timer(&mut self, delay: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.timers.add(delay, callback)
    }

    pub fn add_periodic_timer(
        &mut self,
        period: f64,
        callback: impl FnMut() + 'static,
    ) -> Result<TimerHandle, TimerError> {
        self.timers.add_periodic(period, callback)
    }

    pub fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        cancel_timer(&mut self.timers, handle)
    }

    pub fn clear_timers(&mut self) {
        self.timers.clear();
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    pub fn frame_time(&self) -> f64 {
        self.clock.frame_time()
    }

    pub fn dt(&self) -> f64 {
        self.clock.dt()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn input(&self) -> &InputDevices {
        &self.input
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn last_distribution(&self) -> DistributionReport {
        self.last_distribution
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn handler(&self) -> &F {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut F {
        &mut self.handler
    }

    fn split(&mut self) -> (&mut F, LoopCtx<'_>) {
        let ctx = LoopCtx {
            clock: &self.clock,
            input: &self.input,
            timers: &mut self.timers,
            host: &mut self.host,
            state: &mut self.state,
            surface: self.surface,
        };
        (&mut self.handler, ctx)
    }

    fn distribute_input(&mut self) {
        let report = self
            .events
            .drain_and_distribute(&mut self.input, &self.clock);
        if report.dropped > 0 {
            self.metrics.record_dropped_events(report.dropped);
        }
        self.last_distribution = report;
    }

    fn publish_metrics(&mut self) {
        if let Some(snapshot) = self.metrics.maybe_snapshot(self.clock.frame_time()) {
            self.metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                ups = snapshot.ups,
                frame_time_ms = snapshot.frame_time_ms,
                dropped_events = snapshot.dropped_events,
                timers = self.timers.len(),
                "loop_metrics"
            );
        }
    }
}

fn request_stop(state: &mut LoopState) {
    if *state == LoopState::Running {
        *state = LoopState::StopRequested;
        info!("loop_stop_requested");
    }
}

fn cancel_timer(timers: &mut TimerSet, handle: TimerHandle) -> bool {
    let cancelled = timers.cancel(handle);
    if cancelled {
        debug!(timer = ?handle, "timer_cancelled");
    }
    cancelled
}
