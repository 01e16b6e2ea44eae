use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{DeviceEvent, ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Fullscreen, Window, WindowBuilder};

use super::clock::{MonotonicClock, TimeSource};
use super::config::{ConfigError, LoopConfig};
use super::events::{KeyEvent, MouseEvent, PointerLockEvent};
use super::host::{Host, HostError};
use super::metrics::MetricsHandle;
use super::scheduler::{FrameHandler, FrameScheduler, TickOutcome};

const PIXELS_PER_SCROLL_LINE: f64 = 40.0;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

#[derive(Debug)]
pub struct WinitHost {
    window: &'static Window,
    clock: MonotonicClock,
    frame_requested: bool,
    listeners_attached: bool,
    pointer_locked: bool,
    pending_pointer_lock: Option<bool>,
}

impl WinitHost {
    pub fn new(window: &'static Window) -> Self {
        Self {
            window,
            clock: MonotonicClock::new(),
            frame_requested: false,
            listeners_attached: false,
            pointer_locked: false,
            pending_pointer_lock: None,
        }
    }

    pub fn window(&self) -> &'static Window {
        self.window
    }

    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn listeners_attached(&self) -> bool {
        self.listeners_attached
    }

    pub fn pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    fn take_frame_request(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    fn take_pointer_lock_change(&mut self) -> Option<bool> {
        self.pending_pointer_lock.take()
    }
}

impl TimeSource for WinitHost {
    fn now(&self) -> f64 {
        self.clock.now()
    }
}

impl Host for WinitHost {
    fn request_next_frame(&mut self) {
        self.frame_requested = true;
    }

    fn attach_listeners(&mut self) {
        self.listeners_attached = true;
        debug!("input_listeners_attached");
    }

    fn set_fullscreen(&mut self, active: bool) -> Result<(), HostError> {
        self.window.set_fullscreen(fullscreen_mode(active));
        Ok(())
    }

    fn set_pointer_lock(&mut self, locked: bool) -> Result<(), HostError> {
        let result = if locked {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        result.map_err(|error| HostError::Platform {
            operation: "pointer lock",
            message: error.to_string(),
        })?;

        self.window.set_cursor_visible(!locked);
        if self.pointer_locked != locked {
            self.pointer_locked = locked;
            self.pending_pointer_lock = Some(locked);
        }
        Ok(())
    }
}

pub fn run_windowed<F: FrameHandler + 'static>(
    config: LoopConfig,
    handler: F,
) -> Result<(), AppError> {
    run_windowed_with_metrics(config, handler, MetricsHandle::default())
}

pub fn run_windowed_with_metrics<F: FrameHandler + 'static>(
    config: LoopConfig,
    handler: F,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let config = config.normalized();
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window: &'static Window = Box::leak(Box::new(
        WindowBuilder::new()
            .with_title(config.window.title.clone())
            .with_inner_size(LogicalSize::new(
                config.window.width as f64,
                config.window.height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    ));

    event_loop.set_control_flow(ControlFlow::Wait);

    let mut scheduler = FrameScheduler::new(config, WinitHost::new(window), handler)?
        .with_metrics_handle(metrics_handle);
    let size = window.inner_size();
    scheduler.notify_resize(size.width, size.height);
    scheduler.start();

    let mut cursor = CursorTracker::default();

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                handle_window_event(&mut scheduler, &mut cursor, event, window_target);
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta: (dx, dy) },
                ..
            } => {
                let host = scheduler.host();
                if host.listeners_attached() && host.pointer_locked() {
                    let now = host.now();
                    scheduler.push_event(cursor.locked_motion(dx, dy, now));
                }
            }
            Event::AboutToWait => {
                if scheduler.host().frame_requested() {
                    window.request_redraw();
                }
            }
            Event::LoopExiting => {
                info!(frame = scheduler.frame(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn handle_window_event<F: FrameHandler>(
    scheduler: &mut FrameScheduler<WinitHost, F>,
    cursor: &mut CursorTracker,
    event: WindowEvent,
    window_target: &EventLoopWindowTarget<()>,
) {
    let now = scheduler.host().now();
    let listening = scheduler.host().listeners_attached();

    match event {
        WindowEvent::CloseRequested => {
            scheduler.stop();
            info!(reason = "window_close", "shutdown_requested");
            window_target.exit();
        }
        WindowEvent::Resized(size) => {
            scheduler.notify_resize(size.width, size.height);
            let fullscreen = scheduler.host().window().fullscreen().is_some();
            if fullscreen != scheduler.surface().fullscreen {
                scheduler.notify_fullscreen_change(fullscreen);
            }
        }
        WindowEvent::Focused(false) if scheduler.host().pointer_locked() => {
            if let Err(error) = scheduler.set_pointer_lock(false) {
                warn!(error = %error, "pointer_unlock_failed");
            }
        }
        WindowEvent::RedrawRequested => {
            if !scheduler.host_mut().take_frame_request() {
                return;
            }
            if let Some(locked) = scheduler.host_mut().take_pointer_lock_change() {
                scheduler.push_event(PointerLockEvent::new(locked, now));
            }
            if scheduler.tick() == TickOutcome::Stopped {
                info!(reason = "loop_stopped", "shutdown_requested");
                window_target.exit();
            }
        }
        WindowEvent::KeyboardInput { event, .. } if listening => {
            if let Some(key) = translate_key(event.physical_key, event.state, now) {
                scheduler.push_event(key);
            }
        }
        WindowEvent::MouseInput { state, button, .. } if listening => {
            let (x, y) = cursor.position();
            let mouse = match state {
                ElementState::Pressed => MouseEvent::down(button, x, y, now),
                ElementState::Released => MouseEvent::up(button, x, y, now),
            };
            scheduler.push_event(mouse);
        }
        WindowEvent::CursorMoved { position, .. } if listening => {
            // Relative motion comes from raw device events while locked.
            if !scheduler.host().pointer_locked() {
                scheduler.push_event(cursor.moved(position.x, position.y, now));
            }
        }
        WindowEvent::CursorLeft { .. } => cursor.left(),
        WindowEvent::MouseWheel { delta, .. } if listening => {
            let (dx, dy) = scroll_lines(delta);
            scheduler.push_event(MouseEvent::wheel(dx, dy, now));
        }
        _ => {}
    }
}

fn translate_key(
    physical_key: PhysicalKey,
    state: ElementState,
    timestamp: f64,
) -> Option<KeyEvent> {
    let PhysicalKey::Code(code) = physical_key else {
        return None;
    };
    Some(match state {
        ElementState::Pressed => KeyEvent::down(code, timestamp),
        ElementState::Released => KeyEvent::up(code, timestamp),
    })
}

fn scroll_lines(delta: MouseScrollDelta) -> (f64, f64) {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => (x as f64, y as f64),
        MouseScrollDelta::PixelDelta(position) => (
            position.x / PIXELS_PER_SCROLL_LINE,
            position.y / PIXELS_PER_SCROLL_LINE,
        ),
    }
}

fn fullscreen_mode(active: bool) -> Option<Fullscreen> {
    active.then_some(Fullscreen::Borderless(None))
}

#[derive(Debug, Default)]
struct CursorTracker {
    last: Option<(f64, f64)>,
}

impl CursorTracker {
    fn moved(&mut self, x: f64, y: f64, timestamp: f64) -> MouseEvent {
        let (dx, dy) = match self.last {
            Some((last_x, last_y)) => (x - last_x, y - last_y),
            None => (0.0, 0.0),
        };
        self.last = Some((x, y));
        MouseEvent::moved(x, y, dx, dy, timestamp)
    }

    fn locked_motion(&self, dx: f64, dy: f64, timestamp: f64) -> MouseEvent {
        let (x, y) = self.position();
        MouseEvent::moved(x, y, dx, dy, timestamp)
    }

    fn left(&mut self) {
        self.last = None;
    }

    fn position(&self) -> (f64, f64) {
        self.last.unwrap_or((0.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use winit::dpi::PhysicalPosition;
    use winit::keyboard::{KeyCode, NativeKeyCode};

    use super::super::events::{KeyEventKind, MouseEventKind};
    use super::*;

    #[test]
    fn pressed_key_becomes_down_event() {
        let event = translate_key(
            PhysicalKey::Code(KeyCode::KeyW),
            ElementState::Pressed,
            2.5,
        )
        .expect("known key");

        assert_eq!(event.kind, KeyEventKind::Down);
        assert_eq!(event.code, KeyCode::KeyW);
        assert_eq!(event.timestamp, 2.5);
    }

    #[test]
    fn released_key_becomes_up_event() {
        let event = translate_key(
            PhysicalKey::Code(KeyCode::Escape),
            ElementState::Released,
            0.0,
        )
        .expect("known key");

        assert_eq!(event.kind, KeyEventKind::Up);
    }

    #[test]
    fn unidentified_keys_are_ignored() {
        let event = translate_key(
            PhysicalKey::Unidentified(NativeKeyCode::Unidentified),
            ElementState::Pressed,
            0.0,
        );
        assert!(event.is_none());
    }

    #[test]
    fn cursor_tracker_reports_delta_from_previous_position() {
        let mut cursor = CursorTracker::default();

        let first = cursor.moved(10.0, 20.0, 0.0);
        let second = cursor.moved(13.0, 18.0, 0.1);

        assert_eq!(first.kind, MouseEventKind::Move);
        assert_eq!((first.dx, first.dy), (0.0, 0.0));
        assert_eq!((second.dx, second.dy), (3.0, -2.0));
        assert_eq!(cursor.position(), (13.0, 18.0));
    }

    #[test]
    fn cursor_leaving_resets_delta_origin() {
        let mut cursor = CursorTracker::default();
        cursor.moved(10.0, 10.0, 0.0);
        cursor.left();

        let event = cursor.moved(50.0, 50.0, 0.1);

        assert_eq!((event.dx, event.dy), (0.0, 0.0));
    }

    #[test]
    fn locked_motion_keeps_last_position() {
        let mut cursor = CursorTracker::default();
        cursor.moved(7.0, 8.0, 0.0);

        let event = cursor.locked_motion(-4.0, 2.0, 0.1);

        assert_eq!((event.x, event.y), (7.0, 8.0));
        assert_eq!((event.dx, event.dy), (-4.0, 2.0));
    }

    #[test]
    fn pixel_scroll_is_converted_to_lines() {
        assert_eq!(
            scroll_lines(MouseScrollDelta::LineDelta(0.0, -2.0)),
            (0.0, -2.0)
        );
        assert_eq!(
            scroll_lines(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 80.0))),
            (0.0, 2.0)
        );
    }

    #[test]
    fn fullscreen_mode_is_borderless_when_active() {
        assert_eq!(fullscreen_mode(true), Some(Fullscreen::Borderless(None)));
        assert_eq!(fullscreen_mode(false), None);
    }
}
