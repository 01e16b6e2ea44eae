use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub ups: f32,
    pub frame_time_ms: f32,
    pub dropped_events: u32,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: f64,
    interval: f64,
    frames: u32,
    updates: u32,
    frame_time_sum: f64,
    dropped_events: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: f64) -> Self {
        Self {
            interval_start: 0.0,
            interval,
            frames: 0,
            updates: 0,
            frame_time_sum: 0.0,
            dropped_events: 0,
        }
    }

    pub(crate) fn restart(&mut self, now: f64) {
        self.interval_start = now;
        self.frames = 0;
        self.updates = 0;
        self.frame_time_sum = 0.0;
        self.dropped_events = 0;
    }

    pub(crate) fn record_frame(&mut self, frame_time: f64) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum += frame_time;
    }

    pub(crate) fn record_update(&mut self) {
        self.updates = self.updates.saturating_add(1);
    }

    pub(crate) fn record_dropped_events(&mut self, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.dropped_events = self.dropped_events.saturating_add(count);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: f64) -> Option<LoopMetricsSnapshot> {
        let elapsed = now - self.interval_start;
        if elapsed.is_nan() || elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.max(f64::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum / self.frames as f64) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: (self.frames as f64 / elapsed_seconds) as f32,
            ups: (self.updates as f64 / elapsed_seconds) as f32,
            frame_time_ms: frame_time_ms as f32,
            dropped_events: self.dropped_events,
        };

        self.restart(now);
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_computes_expected_values() {
        let mut accumulator = MetricsAccumulator::new(1.0);
        accumulator.restart(10.0);

        accumulator.record_frame(0.016);
        accumulator.record_frame(0.016);
        for _ in 0..4 {
            accumulator.record_update();
        }
        accumulator.record_dropped_events(3);

        let snapshot = accumulator
            .maybe_snapshot(11.0)
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.ups - 4.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert_eq!(snapshot.dropped_events, 3);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let mut accumulator = MetricsAccumulator::new(1.0);
        accumulator.restart(10.0);
        accumulator.record_frame(0.016);

        assert!(accumulator.maybe_snapshot(10.5).is_none());
    }

    #[test]
    fn snapshot_resets_counters() {
        let mut accumulator = MetricsAccumulator::new(1.0);
        accumulator.record_update();
        accumulator.maybe_snapshot(1.0).expect("first snapshot");

        let second = accumulator.maybe_snapshot(2.0).expect("second snapshot");
        assert_eq!(second.ups, 0.0);
        assert_eq!(second.frame_time_ms, 0.0);
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot, LoopMetricsSnapshot::default());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let expected = LoopMetricsSnapshot {
            fps: 60.0,
            ups: 60.0,
            frame_time_ms: 16.6,
            dropped_events: 1,
        };
        handle.publish(expected);

        assert_eq!(handle.snapshot(), expected);
    }
}
