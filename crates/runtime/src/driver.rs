/// Runs one frame phase, either once per tick or at a fixed rate.
///
/// Fixed-rate drivers accumulate frame time and sub-step in whole intervals.
/// The accumulator is capped at `max_calls` intervals so a long stall drops
/// time instead of spiralling into ever longer catch-up frames.
#[derive(Debug, Clone)]
pub struct CallbackDriver {
    name: &'static str,
    interval: f64,
    accumulator: f64,
    max_calls: u32,
    max_delta: f64,
}

impl CallbackDriver {
    /// `calls_per_second <= 0` gives a variable-rate driver that runs exactly
    /// once per update with the frame delta.
    pub fn new(name: &'static str, calls_per_second: f64, max_catch_up: u32, max_delta: f64) -> Self {
        let interval = if calls_per_second > 0.0 {
            1.0 / calls_per_second
        } else {
            0.0
        };
        let max_calls = if interval == 0.0 { 1 } else { max_catch_up.max(1) };
        Self {
            name,
            interval,
            accumulator: 0.0,
            max_calls,
            max_delta,
        }
    }

    pub fn variable(name: &'static str, max_delta: f64) -> Self {
        Self::new(name, 0.0, 1, max_delta)
    }

    /// Feed one frame delta (seconds). Returns how many times `callback` ran.
    pub fn update(&mut self, delta: f64, mut callback: impl FnMut(f64)) -> u32 {
        let delta = delta.clamp(0.0, self.max_delta);
        self.accumulator = (self.accumulator + delta).min(self.max_calls as f64 * self.interval);

        let step = if self.interval > 0.0 { self.interval } else { delta };
        let mut calls = 0;
        while self.accumulator >= self.interval && calls < self.max_calls {
            callback(step);
            self.accumulator -= self.interval;
            calls += 1;
        }
        if calls == self.max_calls && self.interval > 0.0 {
            tracing::trace!(driver = self.name, calls, "fixed-rate catch-up capped");
        }
        calls
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Seconds between calls; zero for variable-rate drivers.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn is_fixed(&self) -> bool {
        self.interval > 0.0
    }
}
