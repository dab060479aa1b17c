use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::driver::CallbackDriver;
use crate::samples::SampleBuffer;

/// Frame loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Rate of the fixed-update phase.
    pub fixed_rate_hz: f64,
    /// Most fixed updates a single tick may run.
    pub max_catch_up: u32,
    /// Longest frame delta (seconds) the drivers are fed.
    pub max_delta: f64,
    /// Ring size of the FPS and CPU samplers.
    pub stats_window: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fixed_rate_hz: 240.0,
            max_catch_up: 10,
            max_delta: 1.0,
            stats_window: 60,
        }
    }
}

/// Frame phases, in the order a tick runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreFrame,
    Update,
    FixedUpdate,
    Render,
    PostFrame,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::PreFrame,
        Phase::Update,
        Phase::FixedUpdate,
        Phase::Render,
        Phase::PostFrame,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::PreFrame => "pre_frame",
            Phase::Update => "update",
            Phase::FixedUpdate => "fixed_update",
            Phase::Render => "render",
            Phase::PostFrame => "post_frame",
        }
    }
}

/// Receives the phase callbacks of a [`GameLoop`]. Every method defaults to
/// doing nothing.
pub trait LoopHandler {
    fn pre_frame(&mut self, _dt: f64) {}
    fn update(&mut self, _dt: f64) {}
    fn fixed_update(&mut self, _dt: f64) {}
    fn render(&mut self, _dt: f64) {}
    fn post_frame(&mut self, _dt: f64) {}
}

fn dispatch<H: LoopHandler + ?Sized>(handler: &mut H, phase: Phase, dt: f64) {
    match phase {
        Phase::PreFrame => handler.pre_frame(dt),
        Phase::Update => handler.update(dt),
        Phase::FixedUpdate => handler.fixed_update(dt),
        Phase::Render => handler.render(dt),
        Phase::PostFrame => handler.post_frame(dt),
    }
}

/// Calls made per phase during one tick, indexed like [`Phase::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub calls: [u32; 5],
}

impl TickStats {
    pub fn calls_for(&self, phase: Phase) -> u32 {
        self.calls[phase as usize]
    }
}

/// Five-phase frame loop with FPS and CPU-time statistics.
#[derive(Debug)]
pub struct GameLoop {
    drivers: [CallbackDriver; 5],
    fps: SampleBuffer,
    cpu_ms: SampleBuffer,
    elapsed: f64,
    ticks: u64,
}

impl GameLoop {
    pub fn new(config: LoopConfig) -> Self {
        let variable = |name| CallbackDriver::variable(name, config.max_delta);
        Self {
            drivers: [
                variable(Phase::PreFrame.name()),
                variable(Phase::Update.name()),
                CallbackDriver::new(
                    Phase::FixedUpdate.name(),
                    config.fixed_rate_hz,
                    config.max_catch_up,
                    config.max_delta,
                ),
                variable(Phase::Render.name()),
                variable(Phase::PostFrame.name()),
            ],
            fps: SampleBuffer::new(config.stats_window),
            cpu_ms: SampleBuffer::new(config.stats_window),
            elapsed: 0.0,
            ticks: 0,
        }
    }

    /// Run every phase for one frame of `delta` seconds.
    pub fn tick<H: LoopHandler + ?Sized>(&mut self, delta: f64, handler: &mut H) -> TickStats {
        let start = Instant::now();
        self.elapsed += delta;
        self.ticks += 1;

        let mut stats = TickStats::default();
        for (slot, phase) in Phase::ALL.into_iter().enumerate() {
            stats.calls[slot] = self.drivers[slot].update(delta, |dt| dispatch(handler, phase, dt));
        }

        if delta > 0.0 {
            self.fps.record(1.0 / delta);
        }
        self.cpu_ms.record(start.elapsed().as_secs_f64() * 1000.0);
        stats
    }

    /// Drive `frames` ticks of a fixed `delta` without sleeping.
    pub fn run_headless<H: LoopHandler + ?Sized>(&mut self, frames: usize, delta: f64, handler: &mut H) {
        let _span = tracing::info_span!("run_headless", frames, delta).entered();
        for _ in 0..frames {
            self.tick(delta, handler);
        }
    }

    /// Tick against the wall clock, sleeping to `frame_budget`, until
    /// `keep_running` returns false.
    pub fn run_realtime<H: LoopHandler + ?Sized>(
        &mut self,
        frame_budget: Duration,
        handler: &mut H,
        mut keep_running: impl FnMut(&Self, &mut H) -> bool,
    ) {
        let _span = tracing::info_span!("run_realtime").entered();
        let mut last = Instant::now();
        while keep_running(self, handler) {
            let now = Instant::now();
            let delta = now.duration_since(last).as_secs_f64();
            last = now;
            self.tick(delta, handler);

            let spent = now.elapsed();
            if spent < frame_budget {
                std::thread::sleep(frame_budget - spent);
            }
        }
    }

    pub fn driver(&self, phase: Phase) -> &CallbackDriver {
        &self.drivers[phase as usize]
    }

    pub fn fps(&self) -> &SampleBuffer {
        &self.fps
    }

    /// CPU time per tick, in milliseconds.
    pub fn cpu_ms(&self) -> &SampleBuffer {
        &self.cpu_ms
    }

    /// Sum of all deltas fed so far (seconds).
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One-line frame statistics.
    pub fn status_line(&self) -> String {
        format!(
            "FPS: {:.1}  CPU: {:.3}ms (Max {:.3}ms)",
            self.fps.slow_average(),
            self.cpu_ms.average(),
            self.cpu_ms.max()
        )
    }
}
