use std::mem;

use thiserror::Error;
use tracing::warn;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use super::clock::FrameInfo;
use super::input::{
    DigitalButtonEvent, GamepadAxis, GamepadButton, InputDevices, PointerMotionEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub code: KeyCode,
    pub timestamp: f64,
    /// Scheduler frame when the event was queued.
    pub frame: u64,
}

impl KeyEvent {
    pub fn down(code: KeyCode, timestamp: f64) -> Self {
        Self {
            kind: KeyEventKind::Down,
            code,
            timestamp,
            frame: 0,
        }
    }

    pub fn up(code: KeyCode, timestamp: f64) -> Self {
        Self {
            kind: KeyEventKind::Up,
            code,
            timestamp,
            frame: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Down,
    Up,
    Move,
    Wheel,
}

/// Raw mouse record. `button` is only meaningful for `Down`/`Up`; `dx`/`dy` carry motion for
/// `Move` and scroll lines for `Wheel`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub button: MouseButton,
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub timestamp: f64,
    pub frame: u64,
}

impl MouseEvent {
    pub fn down(button: MouseButton, x: f64, y: f64, timestamp: f64) -> Self {
        Self::button(MouseEventKind::Down, button, x, y, timestamp)
    }

    pub fn up(button: MouseButton, x: f64, y: f64, timestamp: f64) -> Self {
        Self::button(MouseEventKind::Up, button, x, y, timestamp)
    }

    pub fn moved(x: f64, y: f64, dx: f64, dy: f64, timestamp: f64) -> Self {
        Self {
            kind: MouseEventKind::Move,
            button: MouseButton::Left,
            x,
            y,
            dx,
            dy,
            timestamp,
            frame: 0,
        }
    }

    pub fn wheel(dx: f64, dy: f64, timestamp: f64) -> Self {
        Self {
            kind: MouseEventKind::Wheel,
            button: MouseButton::Left,
            x: 0.0,
            y: 0.0,
            dx,
            dy,
            timestamp,
            frame: 0,
        }
    }

    fn button(kind: MouseEventKind, button: MouseButton, x: f64, y: f64, timestamp: f64) -> Self {
        Self {
            kind,
            button,
            x,
            y,
            dx: 0.0,
            dy: 0.0,
            timestamp,
            frame: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GamepadEventKind {
    Connected,
    Disconnected,
    ButtonDown(GamepadButton),
    ButtonUp(GamepadButton),
    Axis { axis: GamepadAxis, value: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamepadEvent {
    pub pad: u32,
    pub kind: GamepadEventKind,
    pub timestamp: f64,
    pub frame: u64,
}

impl GamepadEvent {
    pub fn new(pad: u32, kind: GamepadEventKind, timestamp: f64) -> Self {
        Self {
            pad,
            kind,
            timestamp,
            frame: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerLockEvent {
    pub locked: bool,
    pub timestamp: f64,
    pub frame: u64,
}

impl PointerLockEvent {
    pub fn new(locked: bool, timestamp: f64) -> Self {
        Self {
            locked,
            timestamp,
            frame: 0,
        }
    }
}

/// Input record as delivered by the host, before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Gamepad(GamepadEvent),
    PointerLock(PointerLockEvent),
}

impl RawInputEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            RawInputEvent::Key(event) => event.timestamp,
            RawInputEvent::Mouse(event) => event.timestamp,
            RawInputEvent::Gamepad(event) => event.timestamp,
            RawInputEvent::PointerLock(event) => event.timestamp,
        }
    }

    pub fn frame(&self) -> u64 {
        match self {
            RawInputEvent::Key(event) => event.frame,
            RawInputEvent::Mouse(event) => event.frame,
            RawInputEvent::Gamepad(event) => event.frame,
            RawInputEvent::PointerLock(event) => event.frame,
        }
    }

    pub(crate) fn stamp_frame(&mut self, frame: u64) {
        match self {
            RawInputEvent::Key(event) => event.frame = frame,
            RawInputEvent::Mouse(event) => event.frame = frame,
            RawInputEvent::Gamepad(event) => event.frame = frame,
            RawInputEvent::PointerLock(event) => event.frame = frame,
        }
    }
}

impl From<KeyEvent> for RawInputEvent {
    fn from(event: KeyEvent) -> Self {
        RawInputEvent::Key(event)
    }
}

impl From<MouseEvent> for RawInputEvent {
    fn from(event: MouseEvent) -> Self {
        RawInputEvent::Mouse(event)
    }
}

impl From<GamepadEvent> for RawInputEvent {
    fn from(event: GamepadEvent) -> Self {
        RawInputEvent::Gamepad(event)
    }
}

impl From<PointerLockEvent> for RawInputEvent {
    fn from(event: PointerLockEvent) -> Self {
        RawInputEvent::PointerLock(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EventError {
    #[error("{device} event has non-finite timestamp {timestamp}")]
    NonFiniteTimestamp {
        device: &'static str,
        timestamp: f64,
    },
    #[error("mouse {kind:?} event has non-finite coordinates ({x}, {y}, {dx}, {dy})")]
    NonFiniteCoordinates {
        kind: MouseEventKind,
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
    },
    #[error("gamepad {pad} axis {axis:?} has non-finite value {value}")]
    NonFiniteAxis {
        pad: u32,
        axis: GamepadAxis,
        value: f32,
    },
}

/// Outcome of one distribution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributionReport {
    pub applied: usize,
    pub dropped: usize,
}

impl DistributionReport {
    fn record(&mut self, outcome: Result<(), EventError>) {
        match outcome {
            Ok(()) => self.applied += 1,
            Err(error) => {
                self.dropped += 1;
                warn!(error = %error, "input_event_dropped");
            }
        }
    }
}

/// Raw events queued between ticks, one queue per device class.
#[derive(Debug, Default)]
pub struct EventBuffer {
    keys: Vec<KeyEvent>,
    mouse: Vec<MouseEvent>,
    gamepads: Vec<GamepadEvent>,
    pointer_lock: Vec<PointerLockEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: RawInputEvent) {
        match event {
            RawInputEvent::Key(event) => self.keys.push(event),
            RawInputEvent::Mouse(event) => self.mouse.push(event),
            RawInputEvent::Gamepad(event) => self.gamepads.push(event),
            RawInputEvent::PointerLock(event) => self.pointer_lock.push(event),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len() + self.mouse.len() + self.gamepads.len() + self.pointer_lock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves every queued event into `devices` for the frame described by `info`.
    ///
    /// The queues are emptied before anything is applied. Events are normalized one at a time;
    /// a malformed event is logged and skipped.
    pub(crate) fn drain_and_distribute(
        &mut self,
        devices: &mut InputDevices,
        info: &impl FrameInfo,
    ) -> DistributionReport {
        let keys = mem::take(&mut self.keys);
        let mouse = mem::take(&mut self.mouse);
        let gamepads = mem::take(&mut self.gamepads);
        let pointer_lock = mem::take(&mut self.pointer_lock);

        devices.begin_frame(info);
        let mut report = DistributionReport::default();

        for event in &keys {
            let outcome = normalize_key(event).map(|key| devices.keyboard.apply(key));
            report.record(outcome);
        }

        for event in &mouse {
            let outcome = normalize_mouse(event).map(|normalized| match normalized {
                MouseInput::Button(button) => devices.mouse.apply_button(button, event.x, event.y),
                MouseInput::Motion(motion) => devices.mouse.apply_motion(motion),
                MouseInput::Wheel { dx, dy } => devices.mouse.apply_wheel(dx, dy),
            });
            report.record(outcome);
        }

        for event in &gamepads {
            report.record(apply_gamepad(devices, event));
        }

        for event in &pointer_lock {
            report.record(
                check_timestamp("pointer_lock", event.timestamp)
                    .map(|()| devices.pointer_lock.apply(event.locked)),
            );
        }

        report
    }
}

enum MouseInput {
    Button(DigitalButtonEvent<MouseButton>),
    Motion(PointerMotionEvent),
    Wheel { dx: f64, dy: f64 },
}

fn normalize_key(event: &KeyEvent) -> Result<DigitalButtonEvent<KeyCode>, EventError> {
    check_timestamp("key", event.timestamp)?;
    Ok(DigitalButtonEvent {
        button: event.code,
        is_down: event.kind == KeyEventKind::Down,
        frame: event.frame,
        time: event.timestamp,
    })
}

fn normalize_mouse(event: &MouseEvent) -> Result<MouseInput, EventError> {
    check_timestamp("mouse", event.timestamp)?;
    if ![event.x, event.y, event.dx, event.dy]
        .iter()
        .all(|value| value.is_finite())
    {
        return Err(EventError::NonFiniteCoordinates {
            kind: event.kind,
            x: event.x,
            y: event.y,
            dx: event.dx,
            dy: event.dy,
        });
    }

    Ok(match event.kind {
        MouseEventKind::Move => MouseInput::Motion(PointerMotionEvent {
            x: event.x,
            y: event.y,
            dx: event.dx,
            dy: event.dy,
            time: event.timestamp,
            frame: event.frame,
        }),
        MouseEventKind::Wheel => MouseInput::Wheel {
            dx: event.dx,
            dy: event.dy,
        },
        MouseEventKind::Down | MouseEventKind::Up => MouseInput::Button(DigitalButtonEvent {
            button: event.button,
            is_down: event.kind == MouseEventKind::Down,
            frame: event.frame,
            time: event.timestamp,
        }),
    })
}

fn apply_gamepad(devices: &mut InputDevices, event: &GamepadEvent) -> Result<(), EventError> {
    check_timestamp("gamepad", event.timestamp)?;
    let pads = &mut devices.gamepads;
    let button_event = |button, is_down| DigitalButtonEvent {
        button,
        is_down,
        frame: event.frame,
        time: event.timestamp,
    };

    match event.kind {
        GamepadEventKind::Connected => pads.set_connected(event.pad, true, event.timestamp),
        GamepadEventKind::Disconnected => pads.set_connected(event.pad, false, event.timestamp),
        GamepadEventKind::ButtonDown(button) => {
            pads.apply_button(event.pad, button_event(button, true))
        }
        GamepadEventKind::ButtonUp(button) => {
            pads.apply_button(event.pad, button_event(button, false))
        }
        GamepadEventKind::Axis { axis, value } => {
            if !value.is_finite() {
                return Err(EventError::NonFiniteAxis {
                    pad: event.pad,
                    axis,
                    value,
                });
            }
            pads.apply_axis(event.pad, axis, value);
        }
    }
    Ok(())
}

fn check_timestamp(device: &'static str, timestamp: f64) -> Result<(), EventError> {
    if timestamp.is_finite() {
        Ok(())
    } else {
        Err(EventError::NonFiniteTimestamp { device, timestamp })
    }
}

#[cfg(test)]
mod tests {
    use super::super::input::tests::TestFrame;
    use super::*;

    fn distribute(
        buffer: &mut EventBuffer,
        devices: &mut InputDevices,
        frame: u64,
    ) -> DistributionReport {
        buffer.drain_and_distribute(devices, &TestFrame(frame))
    }

    #[test]
    fn push_routes_events_to_device_queues() {
        let mut buffer = EventBuffer::new();
        buffer.push(KeyEvent::down(KeyCode::KeyW, 0.0).into());
        buffer.push(MouseEvent::moved(1.0, 1.0, 1.0, 1.0, 0.0).into());
        buffer.push(PointerLockEvent::new(true, 0.0).into());

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.keys.len(), 1);
        assert_eq!(buffer.mouse.len(), 1);
        assert_eq!(buffer.pointer_lock.len(), 1);
    }

    #[test]
    fn distribution_empties_queues() {
        let mut buffer = EventBuffer::new();
        let mut devices = InputDevices::default();
        buffer.push(KeyEvent::down(KeyCode::KeyW, 0.0).into());
        buffer.push(MouseEvent::down(MouseButton::Left, 5.0, 6.0, 0.0).into());

        let report = distribute(&mut buffer, &mut devices, 1);

        assert_eq!(report, DistributionReport { applied: 2, dropped: 0 });
        assert!(buffer.is_empty());
        assert!(devices.keyboard().is_down(KeyCode::KeyW));
        assert!(devices.mouse().was_pressed(MouseButton::Left));
        assert_eq!(devices.mouse().position(), (5.0, 6.0));
    }

    #[test]
    fn malformed_event_is_dropped_without_blocking_batch() {
        let mut buffer = EventBuffer::new();
        let mut devices = InputDevices::default();
        buffer.push(KeyEvent::down(KeyCode::KeyA, f64::NAN).into());
        buffer.push(KeyEvent::down(KeyCode::KeyB, 0.1).into());
        buffer.push(MouseEvent::moved(f64::INFINITY, 0.0, 1.0, 0.0, 0.1).into());
        buffer.push(MouseEvent::moved(4.0, 0.0, 1.0, 0.0, 0.1).into());

        let report = distribute(&mut buffer, &mut devices, 1);

        assert_eq!(report, DistributionReport { applied: 2, dropped: 2 });
        assert!(!devices.keyboard().is_down(KeyCode::KeyA));
        assert!(devices.keyboard().is_down(KeyCode::KeyB));
        assert_eq!(devices.mouse().delta(), (1.0, 0.0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn arrival_order_is_preserved_within_device() {
        let mut buffer = EventBuffer::new();
        let mut devices = InputDevices::default();
        buffer.push(KeyEvent::down(KeyCode::KeyS, 0.1).into());
        buffer.push(KeyEvent::up(KeyCode::KeyS, 0.2).into());

        distribute(&mut buffer, &mut devices, 1);

        assert!(devices.keyboard().was_pressed(KeyCode::KeyS));
        assert!(!devices.keyboard().is_down(KeyCode::KeyS));

        buffer.push(KeyEvent::up(KeyCode::KeyS, 0.3).into());
        buffer.push(KeyEvent::down(KeyCode::KeyS, 0.4).into());
        distribute(&mut buffer, &mut devices, 2);

        assert!(devices.keyboard().is_down(KeyCode::KeyS));
    }

    #[test]
    fn mouse_accumulators_reset_before_batch_applies() {
        let mut buffer = EventBuffer::new();
        let mut devices = InputDevices::default();
        buffer.push(MouseEvent::moved(10.0, 10.0, 4.0, 2.0, 0.0).into());
        buffer.push(MouseEvent::wheel(0.0, -1.0, 0.0).into());
        distribute(&mut buffer, &mut devices, 1);
        assert_eq!(devices.mouse().delta(), (4.0, 2.0));
        assert_eq!(devices.mouse().wheel(), (0.0, -1.0));

        buffer.push(MouseEvent::moved(11.0, 10.0, 1.0, 0.0, 0.0).into());
        distribute(&mut buffer, &mut devices, 2);
        assert_eq!(devices.mouse().delta(), (1.0, 0.0));
        assert_eq!(devices.mouse().wheel(), (0.0, 0.0));

        distribute(&mut buffer, &mut devices, 3);
        assert_eq!(devices.mouse().delta(), (0.0, 0.0));
        assert_eq!(devices.mouse().position(), (11.0, 10.0));
    }

    #[test]
    fn gamepad_events_reach_the_right_pad() {
        let mut buffer = EventBuffer::new();
        let mut devices = InputDevices::default();
        buffer.push(GamepadEvent::new(1, GamepadEventKind::Connected, 0.0).into());
        buffer.push(
            GamepadEvent::new(1, GamepadEventKind::ButtonDown(GamepadButton::North), 0.0).into(),
        );
        buffer.push(
            GamepadEvent::new(
                1,
                GamepadEventKind::Axis {
                    axis: GamepadAxis::RightTrigger,
                    value: 0.5,
                },
                0.0,
            )
            .into(),
        );
        buffer.push(
            GamepadEvent::new(
                1,
                GamepadEventKind::Axis {
                    axis: GamepadAxis::LeftStickY,
                    value: f32::NAN,
                },
                0.0,
            )
            .into(),
        );

        let report = distribute(&mut buffer, &mut devices, 1);

        assert_eq!(report.dropped, 1);
        let pad = devices.gamepads().get(1).expect("pad 1");
        assert!(pad.is_connected());
        assert!(pad.was_pressed(GamepadButton::North));
        assert_eq!(pad.axis(GamepadAxis::RightTrigger), 0.5);
        assert_eq!(pad.axis(GamepadAxis::LeftStickY), 0.0);
        assert!(devices.gamepads().get(0).is_none());
    }

    #[test]
    fn pointer_lock_events_update_lock_device() {
        let mut buffer = EventBuffer::new();
        let mut devices = InputDevices::default();
        buffer.push(PointerLockEvent::new(true, 0.0).into());

        distribute(&mut buffer, &mut devices, 1);

        assert!(devices.pointer_lock().is_locked());
        assert!(devices.pointer_lock().was_locked());
    }

    #[test]
    fn stamp_frame_sets_capture_frame() {
        let mut event: RawInputEvent = KeyEvent::down(KeyCode::KeyW, 0.0).into();
        event.stamp_frame(9);
        assert_eq!(event.frame(), 9);
        assert_eq!(event.timestamp(), 0.0);
    }
}
