use std::{sync::Arc, time::Instant};

use parking_lot::Mutex;

/// Per-frame delta-time provider. Deltas are never negative; `reset`
/// restarts measurement so the next delta does not include the time spent
/// before it.
pub trait DeltaSource {
    fn next_delta_time(&mut self) -> f32;

    fn reset(&mut self);
}

/// Wall-clock deltas, clamped to `max_delta`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    last: Option<Instant>,
    max_delta: f32,
}

impl SystemClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            last: None,
            max_delta,
        }
    }
}

impl DeltaSource for SystemClock {
    fn next_delta_time(&mut self) -> f32 {
        let now = Instant::now();
        let delta = self
            .last
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        delta.min(self.max_delta)
    }

    fn reset(&mut self) {
        self.last = Some(Instant::now());
    }
}

/// Constant step, used by the headless driver.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: f32,
    elapsed: f64,
}

impl FixedStepClock {
    pub fn new(step: f32) -> Self {
        Self {
            step: step.max(0.0),
            elapsed: 0.0,
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(1.0 / fps.max(1) as f32)
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl DeltaSource for FixedStepClock {
    fn next_delta_time(&mut self) -> f32 {
        self.elapsed += self.step as f64;
        self.step
    }

    fn reset(&mut self) {}
}

/// Accumulator fed by hand. Clones share the accumulator, so the owner of a
/// clone can push time while the frame loop consumes it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    pending: Arc<Mutex<f32>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f32) {
        *self.pending.lock() += seconds.max(0.0);
    }

    pub fn pending(&self) -> f32 {
        *self.pending.lock()
    }
}

impl DeltaSource for ManualClock {
    fn next_delta_time(&mut self) -> f32 {
        std::mem::take(&mut *self.pending.lock())
    }

    fn reset(&mut self) {
        *self.pending.lock() = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_accumulates_elapsed_time() {
        let mut clock = FixedStepClock::from_fps(50);
        assert!((clock.next_delta_time() - 0.02).abs() < 1e-6);
        clock.next_delta_time();
        assert!((clock.elapsed() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn manual_clock_reset_drops_accumulated_time() {
        let feeder = ManualClock::new();
        let mut clock = feeder.clone();
        feeder.advance(3.0);
        clock.reset();
        assert_eq!(clock.next_delta_time(), 0.0);

        feeder.advance(0.5);
        assert_eq!(clock.next_delta_time(), 0.5);
        assert_eq!(feeder.pending(), 0.0);
    }

    #[test]
    fn system_clock_first_delta_is_zero_and_clamped() {
        let mut clock = SystemClock::new(0.1);
        assert_eq!(clock.next_delta_time(), 0.0);
        assert!(clock.next_delta_time() <= 0.1);
    }
}
