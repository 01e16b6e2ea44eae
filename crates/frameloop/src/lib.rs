//! Fixed-timestep frame scheduling with per-frame input distribution and simulation timers.
//!
//! [`FrameScheduler`] is platform independent: it is driven through the [`Host`] trait, which
//! supplies the clock and the frame signal. [`run_windowed`] drives one from a winit window.

pub mod app;

pub use app::{
    run_windowed, run_windowed_with_metrics, AppError, ButtonDevice, ButtonPhase, ConfigError,
    DigitalButtonEvent, DistributionReport, EventBuffer, EventError, FrameClock, FrameHandler,
    FrameInfo, FrameScheduler, Gamepad, GamepadAxis, GamepadButton, GamepadEvent,
    GamepadEventKind, Gamepads, Host, HostError, InputDevices, KeyEvent, KeyEventKind, Keyboard,
    LoopConfig, LoopCtx, LoopMetricsSnapshot, LoopState, MetricsHandle, MonotonicClock, Mouse,
    MouseEvent, MouseEventKind, PointerLock, PointerLockEvent, PointerMotionEvent, RawInputEvent,
    SurfaceState, TickOutcome, TimeSource, TimerCallback, TimerError, TimerHandle, TimerSet,
    WindowConfig, WinitHost, DEFAULT_MAX_WALL_DELTA, DEFAULT_METRICS_LOG_INTERVAL,
    DEFAULT_SIMULATION_DELTA,
};
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

/// Environment variable naming a JSON loop config file.
pub const CONFIG_ENV_VAR: &str = "FRAMELOOP_CONFIG";
