use std::time::Instant;

use tracing::warn;

/// Monotonic wall-clock source, in seconds.
pub trait TimeSource {
    fn now(&self) -> f64;
}

/// Read-only view of the current frame, handed to devices instead of the scheduler itself.
pub trait FrameInfo {
    fn frame(&self) -> u64;
    fn frame_time(&self) -> f64;
}

/// `TimeSource` backed by `Instant`, counting seconds from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Frame counter and wall/simulation timing for one scheduler.
///
/// The clock stays uninitialized until the first frame signal; `bootstrap` records the
/// baseline and every later `advance` produces a clamped wall delta for the step planner.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame: u64,
    current_frame_time: f64,
    previous_frame_time: f64,
    simulation_delta: f64,
    max_wall_delta: f64,
    dt: f64,
    carried: f64,
    initialized: bool,
}

impl FrameClock {
    pub fn new(simulation_delta: f64, max_wall_delta: f64) -> Self {
        debug_assert!(simulation_delta > 0.0);
        Self {
            frame: 0,
            current_frame_time: 0.0,
            previous_frame_time: 0.0,
            simulation_delta,
            max_wall_delta,
            dt: 0.0,
            carried: 0.0,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn frame_time(&self) -> f64 {
        self.current_frame_time
    }

    pub fn previous_frame_time(&self) -> f64 {
        self.previous_frame_time
    }

    /// Fixed step of the update currently running (or last run).
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn simulation_delta(&self) -> f64 {
        self.simulation_delta
    }

    pub fn max_wall_delta(&self) -> f64 {
        self.max_wall_delta
    }

    pub(crate) fn bootstrap(&mut self, now: f64) {
        let now = if now.is_finite() {
            now
        } else {
            warn!(now, "clock_anomaly");
            0.0
        };
        self.current_frame_time = now;
        self.previous_frame_time = now;
        self.initialized = true;
    }

    /// Moves to the next frame and returns the wall delta since the previous one.
    ///
    /// A reading that is non-finite or earlier than the current frame time leaves the frame
    /// time where it was, so the delta for this frame is zero.
    pub(crate) fn advance(&mut self, now: f64) -> f64 {
        self.frame = self.frame.wrapping_add(1);
        self.previous_frame_time = self.current_frame_time;

        if now.is_finite() && now >= self.current_frame_time {
            self.current_frame_time = now;
        } else {
            warn!(
                now,
                previous = self.current_frame_time,
                frame = self.frame,
                "clock_anomaly"
            );
        }

        clamp_wall_delta(
            self.current_frame_time - self.previous_frame_time,
            self.max_wall_delta,
        )
    }

    /// Number of fixed steps to run for `wall_delta`.
    ///
    /// With `carry_remainder` off the leftover is dropped; with it on the leftover is kept for
    /// the next frame, still bounded by `max_wall_delta`.
    pub(crate) fn plan_steps(&mut self, wall_delta: f64, carry_remainder: bool) -> u32 {
        let budget = if carry_remainder {
            clamp_wall_delta(wall_delta + self.carried, self.max_wall_delta)
        } else {
            wall_delta
        };

        let plan = plan_sim_steps(budget, self.simulation_delta);
        self.carried = if carry_remainder { plan.remainder } else { 0.0 };
        plan.steps
    }

    pub(crate) fn begin_step(&mut self) {
        self.dt = self.simulation_delta;
    }
}

impl FrameInfo for FrameClock {
    fn frame(&self) -> u64 {
        self.frame
    }

    fn frame_time(&self) -> f64 {
        self.current_frame_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StepPlan {
    steps: u32,
    remainder: f64,
}

fn plan_sim_steps(mut wall_delta: f64, simulation_delta: f64) -> StepPlan {
    let mut steps = 0u32;

    // Strict comparison: a delta of exactly one step does not run it.
    while wall_delta > simulation_delta {
        wall_delta -= simulation_delta;
        steps = steps.saturating_add(1);
    }

    StepPlan {
        steps,
        remainder: wall_delta,
    }
}

fn clamp_wall_delta(raw: f64, max_wall_delta: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    raw.min(max_wall_delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_wall_delta_caps_large_delta() {
        assert_eq!(clamp_wall_delta(0.6, 0.25), 0.25);
        assert_eq!(clamp_wall_delta(0.1, 0.25), 0.1);
    }

    #[test]
    fn clamp_wall_delta_zeroes_anomalies() {
        assert_eq!(clamp_wall_delta(-0.5, 0.25), 0.0);
        assert_eq!(clamp_wall_delta(f64::NAN, 0.25), 0.0);
        assert_eq!(clamp_wall_delta(f64::INFINITY, 0.25), 0.0);
    }

    #[test]
    fn plan_sim_steps_uses_strict_comparison() {
        let plan = plan_sim_steps(0.055, 0.01);
        assert_eq!(plan.steps, 5);
        assert!((plan.remainder - 0.005).abs() < 1e-9);

        assert_eq!(plan_sim_steps(0.25, 0.25).steps, 0);
        assert_eq!(plan_sim_steps(0.0, 0.25).steps, 0);
    }

    #[test]
    fn bootstrap_sets_both_frame_times() {
        let mut clock = FrameClock::new(1.0 / 60.0, 1.0 / 30.0);
        assert!(!clock.is_initialized());

        clock.bootstrap(4.0);

        assert!(clock.is_initialized());
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.frame_time(), 4.0);
        assert_eq!(clock.previous_frame_time(), 4.0);
    }

    #[test]
    fn advance_counts_frames_and_clamps() {
        let mut clock = FrameClock::new(1.0 / 60.0, 1.0 / 30.0);
        clock.bootstrap(1.0);

        let delta = clock.advance(1.5);

        assert_eq!(clock.frame(), 1);
        assert_eq!(delta, 1.0 / 30.0);
        assert_eq!(clock.previous_frame_time(), 1.0);
        assert_eq!(clock.frame_time(), 1.5);
    }

    #[test]
    fn advance_ignores_backwards_or_nan_readings() {
        let mut clock = FrameClock::new(0.01, 0.25);
        clock.bootstrap(2.0);

        assert_eq!(clock.advance(1.0), 0.0);
        assert_eq!(clock.frame_time(), 2.0);

        assert_eq!(clock.advance(f64::NAN), 0.0);
        assert_eq!(clock.frame_time(), 2.0);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn plan_steps_drops_remainder_by_default() {
        let mut clock = FrameClock::new(0.01, 0.25);
        assert_eq!(clock.plan_steps(0.006, false), 0);
        assert_eq!(clock.plan_steps(0.006, false), 0);
    }

    #[test]
    fn plan_steps_carries_remainder_when_enabled() {
        let mut clock = FrameClock::new(0.01, 0.25);
        assert_eq!(clock.plan_steps(0.006, true), 0);
        assert_eq!(clock.plan_steps(0.006, true), 1);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
