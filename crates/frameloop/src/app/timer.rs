use std::fmt;

use thiserror::Error;
use tracing::warn;

pub type TimerCallback = Box<dyn FnMut()>;

/// Identifies a timer registered with a [`TimerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimerError {
    #[error("timer period must be a positive finite number of seconds, got {0}")]
    InvalidPeriod(f64),
}

struct Timer {
    id: u64,
    remaining: f64,
    period: Option<f64>,
    callback: TimerCallback,
    dead: bool,
}

impl Timer {
    fn advance(&mut self, dt: f64) {
        if self.dead {
            return;
        }

        self.remaining -= dt;
        if self.remaining > 0.0 {
            return;
        }

        (self.callback)();
        match self.period {
            Some(period) => self.remaining += period,
            None => self.dead = true,
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("remaining", &self.remaining)
            .field("period", &self.period)
            .field("dead", &self.dead)
            .finish_non_exhaustive()
    }
}

/// Countdown timers advanced in simulation time.
///
/// Timers live in a flat `Vec`. Firing or cancelling only marks a timer dead; dead entries are
/// dropped by [`TimerSet::compact`], which swap-removes them in a single pass.
#[derive(Debug, Default)]
pub struct TimerSet {
    timers: Vec<Timer>,
    next_id: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a one-shot timer that fires once `delay` seconds of simulation have passed.
    pub fn add(&mut self, delay: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.insert(sanitize_delay(delay), None, Box::new(callback))
    }

    /// Registers a timer that fires every `period` seconds until cancelled.
    pub fn add_periodic(
        &mut self,
        period: f64,
        callback: impl FnMut() + 'static,
    ) -> Result<TimerHandle, TimerError> {
        if !period.is_finite() || period <= 0.0 {
            return Err(TimerError::InvalidPeriod(period));
        }
        Ok(self.insert(period, Some(period), Box::new(callback)))
    }

    /// Marks the timer dead without firing it. Returns `false` if it already fired or was
    /// removed.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self
            .timers
            .iter_mut()
            .find(|timer| timer.id == handle.0 && !timer.dead)
        {
            Some(timer) => {
                timer.dead = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.timers
            .iter()
            .any(|timer| timer.id == handle.0 && !timer.dead)
    }

    /// Seconds left before the timer fires next.
    pub fn remaining(&self, handle: TimerHandle) -> Option<f64> {
        self.timers
            .iter()
            .find(|timer| timer.id == handle.0 && !timer.dead)
            .map(|timer| timer.remaining)
    }

    /// Entries held, including dead ones awaiting compaction.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub(crate) fn advance_all(&mut self, dt: f64) {
        for timer in &mut self.timers {
            timer.advance(dt);
        }
    }

    /// Drops dead timers. Survivor order is not preserved.
    pub(crate) fn compact(&mut self) -> usize {
        let mut removed = 0usize;
        let mut index = 0usize;
        while index < self.timers.len() {
            if self.timers[index].dead {
                self.timers.swap_remove(index);
                removed += 1;
            } else {
                index += 1;
            }
        }
        removed
    }

    fn insert(&mut self, delay: f64, period: Option<f64>, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.timers.push(Timer {
            id,
            remaining: delay,
            period,
            callback,
            dead: false,
        });
        TimerHandle(id)
    }
}

fn sanitize_delay(delay: f64) -> f64 {
    if delay.is_finite() && delay >= 0.0 {
        delay
    } else {
        warn!(delay, "invalid timer delay; firing on next step");
        0.0
    }
}
