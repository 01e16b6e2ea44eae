mod clock;
mod config;
mod events;
mod host;
mod input;
mod loop_runner;
mod metrics;
mod scheduler;
mod timer;

pub use clock::{FrameClock, FrameInfo, MonotonicClock, TimeSource};
pub use config::{
    ConfigError, LoopConfig, WindowConfig, DEFAULT_MAX_WALL_DELTA, DEFAULT_METRICS_LOG_INTERVAL,
    DEFAULT_SIMULATION_DELTA,
};
pub use events::{
    DistributionReport, EventBuffer, EventError, GamepadEvent, GamepadEventKind, KeyEvent,
    KeyEventKind, MouseEvent, MouseEventKind, PointerLockEvent, RawInputEvent,
};
pub use host::{Host, HostError};
pub use input::{
    ButtonDevice, ButtonPhase, DigitalButtonEvent, Gamepad, GamepadAxis, GamepadButton, Gamepads,
    InputDevices, Keyboard, Mouse, PointerLock, PointerMotionEvent,
};
pub use loop_runner::{run_windowed, run_windowed_with_metrics, AppError, WinitHost};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scheduler::{FrameHandler, FrameScheduler, LoopCtx, LoopState, SurfaceState, TickOutcome};
pub use timer::{TimerCallback, TimerError, TimerHandle, TimerSet};
