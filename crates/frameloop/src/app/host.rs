use thiserror::Error;

use super::clock::TimeSource;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0} is not supported by this host")]
    Unsupported(&'static str),
    #[error("platform rejected {operation}: {message}")]
    Platform {
        operation: &'static str,
        message: String,
    },
}

/// Platform side of the loop: clock, frame signal, listeners and window toggles.
///
/// After `request_next_frame` the host must call `FrameScheduler::tick` exactly once, at its
/// next display refresh. Hosts never call `tick` without a pending request.
pub trait Host: TimeSource {
    fn request_next_frame(&mut self);

    /// Starts forwarding platform input to the scheduler. Called at most once.
    fn attach_listeners(&mut self) {}

    fn set_fullscreen(&mut self, active: bool) -> Result<(), HostError> {
        let _ = active;
        Err(HostError::Unsupported("fullscreen"))
    }

    fn set_pointer_lock(&mut self, locked: bool) -> Result<(), HostError> {
        let _ = locked;
        Err(HostError::Unsupported("pointer lock"))
    }
}
