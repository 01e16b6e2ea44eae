use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use super::clock::FrameInfo;

/// Normalized press/release, the unit every digital device consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigitalButtonEvent<B> {
    pub button: B,
    pub is_down: bool,
    pub frame: u64,
    pub time: f64,
}

/// Normalized pointer motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMotionEvent {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub time: f64,
    pub frame: u64,
}

/// Where a button stands relative to the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    Up,
    /// Went down this tick.
    Pressed,
    Down,
    /// Went up this tick. Also reported for a press and release inside one tick.
    Released,
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonRecord {
    down: bool,
    pressed_frame: Option<u64>,
    released_frame: Option<u64>,
    changed_at: f64,
}

/// Per-button state for one digital device.
///
/// Edges are stored as the frame they happened on, so "this tick" answers expire on their own
/// once the device is moved to a later frame.
#[derive(Debug, Clone)]
pub struct ButtonDevice<B> {
    buttons: HashMap<B, ButtonRecord>,
    frame: u64,
}

impl<B> Default for ButtonDevice<B> {
    fn default() -> Self {
        Self {
            buttons: HashMap::new(),
            frame: 0,
        }
    }
}

impl<B: Copy + Eq + Hash> ButtonDevice<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_down(&self, button: B) -> bool {
        self.buttons.get(&button).is_some_and(|record| record.down)
    }

    pub fn was_pressed(&self, button: B) -> bool {
        self.buttons
            .get(&button)
            .is_some_and(|record| record.pressed_frame == Some(self.frame))
    }

    pub fn was_released(&self, button: B) -> bool {
        self.buttons
            .get(&button)
            .is_some_and(|record| record.released_frame == Some(self.frame))
    }

    pub fn phase(&self, button: B) -> ButtonPhase {
        match (
            self.is_down(button),
            self.was_pressed(button),
            self.was_released(button),
        ) {
            (true, true, _) => ButtonPhase::Pressed,
            (true, false, _) => ButtonPhase::Down,
            (false, _, true) => ButtonPhase::Released,
            (false, _, false) => ButtonPhase::Up,
        }
    }

    /// Timestamp of the press for a button that is currently held.
    pub fn down_since(&self, button: B) -> Option<f64> {
        self.buttons
            .get(&button)
            .filter(|record| record.down)
            .map(|record| record.changed_at)
    }

    pub fn pressed_this_tick(&self) -> impl Iterator<Item = B> + '_ {
        self.buttons
            .iter()
            .filter(|(_, record)| record.pressed_frame == Some(self.frame))
            .map(|(button, _)| *button)
    }

    pub fn held(&self) -> impl Iterator<Item = B> + '_ {
        self.buttons
            .iter()
            .filter(|(_, record)| record.down)
            .map(|(button, _)| *button)
    }

    pub(crate) fn begin_frame(&mut self, info: &impl FrameInfo) {
        self.set_frame(info.frame());
    }

    pub(crate) fn apply(&mut self, event: DigitalButtonEvent<B>) {
        let frame = self.frame;
        let record = self.buttons.entry(event.button).or_default();

        if event.is_down {
            // Repeats while held are not new presses.
            if !record.down {
                record.down = true;
                record.pressed_frame = Some(frame);
                record.changed_at = event.time;
            }
        } else if record.down {
            record.down = false;
            record.released_frame = Some(frame);
            record.changed_at = event.time;
        }
    }

    pub(crate) fn release_all(&mut self, time: f64) {
        let frame = self.frame;
        for record in self.buttons.values_mut().filter(|record| record.down) {
            record.down = false;
            record.released_frame = Some(frame);
            record.changed_at = time;
        }
    }

    fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }
}

pub type Keyboard = ButtonDevice<KeyCode>;

#[derive(Debug, Clone, Default)]
pub struct Mouse {
    buttons: ButtonDevice<MouseButton>,
    position: (f64, f64),
    delta: (f64, f64),
    wheel: (f64, f64),
}

impl Mouse {
    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons.is_down(button)
    }

    pub fn was_pressed(&self, button: MouseButton) -> bool {
        self.buttons.was_pressed(button)
    }

    pub fn was_released(&self, button: MouseButton) -> bool {
        self.buttons.was_released(button)
    }

    pub fn phase(&self, button: MouseButton) -> ButtonPhase {
        self.buttons.phase(button)
    }

    pub fn buttons(&self) -> &ButtonDevice<MouseButton> {
        &self.buttons
    }

    /// Last known pointer position in window pixels.
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Motion accumulated during the current tick.
    pub fn delta(&self) -> (f64, f64) {
        self.delta
    }

    /// Scroll accumulated during the current tick, in lines.
    pub fn wheel(&self) -> (f64, f64) {
        self.wheel
    }

    pub(crate) fn begin_frame(&mut self, info: &impl FrameInfo) {
        self.buttons.begin_frame(info);
        self.delta = (0.0, 0.0);
        self.wheel = (0.0, 0.0);
    }

    pub(crate) fn apply_button(
        &mut self,
        event: DigitalButtonEvent<MouseButton>,
        x: f64,
        y: f64,
    ) {
        self.position = (x, y);
        self.buttons.apply(event);
    }

    pub(crate) fn apply_motion(&mut self, event: PointerMotionEvent) {
        self.position = (event.x, event.y);
        self.delta.0 += event.dx;
        self.delta.1 += event.dy;
    }

    pub(crate) fn apply_wheel(&mut self, dx: f64, dy: f64) {
        self.wheel.0 += dx;
        self.wheel.1 += dy;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    South,
    East,
    West,
    North,
    LeftBumper,
    RightBumper,
    LeftTrigger,
    RightTrigger,
    Select,
    Start,
    Guide,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
    Other(u16),
}

#[derive(Debug, Clone, Default)]
pub struct Gamepad {
    connected: bool,
    buttons: ButtonDevice<GamepadButton>,
    axes: HashMap<GamepadAxis, f32>,
}

impl Gamepad {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn buttons(&self) -> &ButtonDevice<GamepadButton> {
        &self.buttons
    }

    pub fn is_down(&self, button: GamepadButton) -> bool {
        self.buttons.is_down(button)
    }

    pub fn was_pressed(&self, button: GamepadButton) -> bool {
        self.buttons.was_pressed(button)
    }

    pub fn was_released(&self, button: GamepadButton) -> bool {
        self.buttons.was_released(button)
    }

    /// Axis value in `[-1, 1]`; axes never reported read as zero.
    pub fn axis(&self, axis: GamepadAxis) -> f32 {
        self.axes.get(&axis).copied().unwrap_or(0.0)
    }
}

/// All gamepads seen so far, keyed by host pad index.
#[derive(Debug, Clone, Default)]
pub struct Gamepads {
    pads: BTreeMap<u32, Gamepad>,
    frame: u64,
}

impl Gamepads {
    pub fn get(&self, pad: u32) -> Option<&Gamepad> {
        self.pads.get(&pad)
    }

    pub fn connected(&self) -> impl Iterator<Item = (u32, &Gamepad)> + '_ {
        self.pads
            .iter()
            .filter(|(_, gamepad)| gamepad.connected)
            .map(|(pad, gamepad)| (*pad, gamepad))
    }

    pub(crate) fn begin_frame(&mut self, info: &impl FrameInfo) {
        self.frame = info.frame();
        for gamepad in self.pads.values_mut() {
            gamepad.buttons.begin_frame(info);
        }
    }

    pub(crate) fn set_connected(&mut self, pad: u32, connected: bool, time: f64) {
        let gamepad = self.pad_mut(pad);
        gamepad.connected = connected;
        if !connected {
            gamepad.buttons.release_all(time);
            gamepad.axes.clear();
        }
    }

    pub(crate) fn apply_button(&mut self, pad: u32, event: DigitalButtonEvent<GamepadButton>) {
        let gamepad = self.pad_mut(pad);
        gamepad.connected = true;
        gamepad.buttons.apply(event);
    }

    pub(crate) fn apply_axis(&mut self, pad: u32, axis: GamepadAxis, value: f32) {
        let gamepad = self.pad_mut(pad);
        gamepad.connected = true;
        gamepad.axes.insert(axis, value.clamp(-1.0, 1.0));
    }

    fn pad_mut(&mut self, pad: u32) -> &mut Gamepad {
        let frame = self.frame;
        self.pads.entry(pad).or_insert_with(|| {
            let mut gamepad = Gamepad::default();
            gamepad.buttons.set_frame(frame);
            gamepad
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PointerLock {
    locked: bool,
    changed_frame: Option<u64>,
    frame: u64,
}

impl PointerLock {
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock was acquired this tick.
    pub fn was_locked(&self) -> bool {
        self.locked && self.changed_frame == Some(self.frame)
    }

    /// Lock was lost this tick.
    pub fn was_unlocked(&self) -> bool {
        !self.locked && self.changed_frame == Some(self.frame)
    }

    pub(crate) fn begin_frame(&mut self, info: &impl FrameInfo) {
        self.frame = info.frame();
    }

    pub(crate) fn apply(&mut self, locked: bool) {
        if locked != self.locked {
            self.locked = locked;
            self.changed_frame = Some(self.frame);
        }
    }
}

/// Every device the scheduler feeds.
#[derive(Debug, Clone, Default)]
pub struct InputDevices {
    pub(crate) keyboard: Keyboard,
    pub(crate) mouse: Mouse,
    pub(crate) gamepads: Gamepads,
    pub(crate) pointer_lock: PointerLock,
}

impl InputDevices {
    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn gamepads(&self) -> &Gamepads {
        &self.gamepads
    }

    pub fn pointer_lock(&self) -> &PointerLock {
        &self.pointer_lock
    }

    pub(crate) fn begin_frame(&mut self, info: &impl FrameInfo) {
        self.keyboard.begin_frame(info);
        self.mouse.begin_frame(info);
        self.gamepads.begin_frame(info);
        self.pointer_lock.begin_frame(info);
    }
}
