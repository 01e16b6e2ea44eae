use std::cell::Cell;
use std::rc::Rc;

use frameloop::{
    run_windowed, FrameHandler, GamepadAxis, Gamepads, KeyCode, Keyboard, LoopConfig, LoopCtx,
    MouseButton, TimerHandle, CONFIG_ENV_VAR,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const MOVE_SPEED_UNITS_PER_SECOND: f64 = 4.0;
const BEACON_DELAY_SECONDS: f64 = 1.5;
const HEARTBEAT_PERIOD_SECONDS: f64 = 5.0;
const STATUS_LOG_INTERVAL_FRAMES: u64 = 120;

/// Moves a marker with WASD or the left stick and reacts to a handful of command keys.
///
/// Movement runs in `update`. Edge-triggered commands run in `render`, which sees every frame
/// exactly once even when a frame runs no updates.
#[derive(Debug, Default)]
struct DemoHandler {
    position: (f64, f64),
    beacons_fired: Rc<Cell<u32>>,
    pending_beacon: Option<TimerHandle>,
    heartbeat: Option<TimerHandle>,
}

impl FrameHandler for DemoHandler {
    fn update(&mut self, ctx: &mut LoopCtx<'_>) {
        if self.heartbeat.is_none() {
            self.start_heartbeat(ctx);
        }

        let (x, y) = movement_axis(ctx.keyboard(), ctx.gamepads());
        let distance = MOVE_SPEED_UNITS_PER_SECOND * ctx.dt();
        self.position.0 += x * distance;
        self.position.1 += y * distance;
    }

    fn render(&mut self, ctx: &mut LoopCtx<'_>) {
        self.handle_commands(ctx);

        if ctx.frame() % STATUS_LOG_INTERVAL_FRAMES == 0 {
            let (wheel_x, wheel_y) = ctx.mouse().wheel();
            debug!(
                frame = ctx.frame(),
                x = self.position.0,
                y = self.position.1,
                wheel_x,
                wheel_y,
                timers = ctx.timers().len(),
                "demo_status"
            );
        }
    }

    fn resize(&mut self, _ctx: &mut LoopCtx<'_>, width: u32, height: u32) {
        info!(width, height, "demo_resized");
    }

    fn fullscreen_changed(&mut self, _ctx: &mut LoopCtx<'_>, active: bool) {
        info!(fullscreen = active, "demo_fullscreen_changed");
    }
}

impl DemoHandler {
    fn handle_commands(&mut self, ctx: &mut LoopCtx<'_>) {
        for key in ctx.keyboard().pressed_this_tick() {
            info!(key = ?key, frame = ctx.frame(), "key_pressed");
        }

        if ctx.keyboard().was_pressed(KeyCode::Space) {
            self.schedule_beacon(ctx);
        }

        if ctx.keyboard().was_pressed(KeyCode::F11) {
            let next = !ctx.surface().fullscreen;
            if let Err(error) = ctx.set_fullscreen(next) {
                warn!(error = %error, "fullscreen_toggle_failed");
            }
        }

        if ctx.pointer_lock().was_locked() {
            info!("pointer_locked");
        }
        if ctx.pointer_lock().was_unlocked() {
            info!("pointer_unlocked");
        }

        if ctx.mouse().was_pressed(MouseButton::Left) && !ctx.pointer_lock().is_locked() {
            if let Err(error) = ctx.set_pointer_lock(true) {
                warn!(error = %error, "pointer_lock_failed");
            }
        }

        if ctx.keyboard().was_pressed(KeyCode::Escape) {
            if ctx.pointer_lock().is_locked() {
                if let Err(error) = ctx.set_pointer_lock(false) {
                    warn!(error = %error, "pointer_unlock_failed");
                }
            } else {
                info!(reason = "escape_key", "shutdown_requested");
                ctx.stop();
            }
        }
    }

    /// Pressing again restarts the countdown.
    fn schedule_beacon(&mut self, ctx: &mut LoopCtx<'_>) {
        if let Some(handle) = self.pending_beacon.take() {
            ctx.cancel_timer(handle);
        }

        let fired = Rc::clone(&self.beacons_fired);
        let handle = ctx.add_timer(BEACON_DELAY_SECONDS, move || {
            fired.set(fired.get() + 1);
            info!(count = fired.get(), "beacon_fired");
        });
        self.pending_beacon = Some(handle);
    }

    fn start_heartbeat(&mut self, ctx: &mut LoopCtx<'_>) {
        let mut beats = 0u64;
        match ctx.add_periodic_timer(HEARTBEAT_PERIOD_SECONDS, move || {
            beats += 1;
            info!(beats, "heartbeat");
        }) {
            Ok(handle) => self.heartbeat = Some(handle),
            Err(error) => warn!(error = %error, "heartbeat_not_started"),
        }
    }
}

fn movement_axis(keyboard: &Keyboard, gamepads: &Gamepads) -> (f64, f64) {
    let key_value = |key: KeyCode| f64::from(u8::from(keyboard.is_down(key)));
    let key_axis = |negative: KeyCode, positive: KeyCode| key_value(positive) - key_value(negative);
    let mut x = key_axis(KeyCode::KeyA, KeyCode::KeyD);
    let mut y = key_axis(KeyCode::KeyW, KeyCode::KeyS);

    if let Some((_, pad)) = gamepads.connected().next() {
        x += f64::from(pad.axis(GamepadAxis::LeftStickX));
        y += f64::from(pad.axis(GamepadAxis::LeftStickY));
    }

    (x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0))
}

fn main() {
    init_tracing();
    info!("=== frameloop demo ===");

    let config = match LoopConfig::load_from_env(CONFIG_ENV_VAR) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "config_load_failed");
            LoopConfig::default()
        }
    };

    if let Err(err) = run_windowed(config, DemoHandler::default()) {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use frameloop::{
        FrameScheduler, GamepadEvent, GamepadEventKind, Host, HostError, KeyEvent, LoopState,
        MouseEvent, PointerLockEvent, TickOutcome, TimeSource,
    };

    use super::*;

    #[derive(Debug, Default)]
    struct TestHost {
        now: f64,
        fullscreen: Option<bool>,
        pointer_lock: Option<bool>,
    }

    impl TimeSource for TestHost {
        fn now(&self) -> f64 {
            self.now
        }
    }

    impl Host for TestHost {
        fn request_next_frame(&mut self) {}

        fn set_fullscreen(&mut self, active: bool) -> Result<(), HostError> {
            self.fullscreen = Some(active);
            Ok(())
        }

        fn set_pointer_lock(&mut self, locked: bool) -> Result<(), HostError> {
            self.pointer_lock = Some(locked);
            Ok(())
        }
    }

    fn running_demo() -> FrameScheduler<TestHost, DemoHandler> {
        let mut scheduler = FrameScheduler::new(
            LoopConfig::default(),
            TestHost::default(),
            DemoHandler::default(),
        )
        .expect("default config is valid");
        scheduler.start();
        assert_eq!(scheduler.tick(), TickOutcome::Bootstrapped);
        scheduler
    }

    fn step(scheduler: &mut FrameScheduler<TestHost, DemoHandler>) -> TickOutcome {
        scheduler.host_mut().now += 0.02;
        scheduler.tick()
    }

    fn press(scheduler: &mut FrameScheduler<TestHost, DemoHandler>, key: KeyCode) {
        let now = scheduler.host().now;
        scheduler.push_event(KeyEvent::down(key, now));
    }

    #[test]
    fn held_key_moves_marker_at_fixed_speed() {
        let mut scheduler = running_demo();
        press(&mut scheduler, KeyCode::KeyW);

        for _ in 0..3 {
            step(&mut scheduler);
        }

        let (x, y) = scheduler.handler().position;
        assert_eq!(x, 0.0);
        assert!((y + 3.0 * MOVE_SPEED_UNITS_PER_SECOND / 60.0).abs() < 1e-9);
    }

    #[test]
    fn left_stick_moves_marker() {
        let mut scheduler = running_demo();
        scheduler.push_event(GamepadEvent::new(0, GamepadEventKind::Connected, 0.0));
        scheduler.push_event(GamepadEvent::new(
            0,
            GamepadEventKind::Axis {
                axis: GamepadAxis::LeftStickX,
                value: 0.5,
            },
            0.0,
        ));

        step(&mut scheduler);

        assert!(scheduler.handler().position.0 > 0.0);
    }

    #[test]
    fn space_fires_beacon_after_delay() {
        let mut scheduler = running_demo();
        press(&mut scheduler, KeyCode::Space);
        step(&mut scheduler);
        let fired = Rc::clone(&scheduler.handler().beacons_fired);

        for _ in 0..60 {
            step(&mut scheduler);
        }
        assert_eq!(fired.get(), 0);

        for _ in 0..40 {
            step(&mut scheduler);
        }
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn escape_stops_loop_when_pointer_is_free() {
        let mut scheduler = running_demo();
        press(&mut scheduler, KeyCode::Escape);

        assert!(matches!(step(&mut scheduler), TickOutcome::Ran { .. }));
        assert_eq!(scheduler.state(), LoopState::StopRequested);
        assert_eq!(step(&mut scheduler), TickOutcome::Stopped);
    }

    #[test]
    fn escape_releases_pointer_lock_first() {
        let mut scheduler = running_demo();
        scheduler.push_event(PointerLockEvent::new(true, 0.0));
        step(&mut scheduler);

        press(&mut scheduler, KeyCode::Escape);
        step(&mut scheduler);

        assert_eq!(scheduler.host().pointer_lock, Some(false));
        assert_eq!(scheduler.state(), LoopState::Running);
    }

    #[test]
    fn click_requests_pointer_lock() {
        let mut scheduler = running_demo();
        scheduler.push_event(MouseEvent::down(MouseButton::Left, 10.0, 10.0, 0.0));

        step(&mut scheduler);

        assert_eq!(scheduler.host().pointer_lock, Some(true));
    }

    #[test]
    fn f11_toggles_fullscreen() {
        let mut scheduler = running_demo();
        press(&mut scheduler, KeyCode::F11);

        step(&mut scheduler);

        assert_eq!(scheduler.host().fullscreen, Some(true));
    }
}
