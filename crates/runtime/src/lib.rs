//! Frame loop: per-phase callback drivers with a capped fixed-rate
//! accumulator, plus ring-buffered frame statistics.
//!
//! # Invariants
//! - A fixed-rate driver never runs more than `max_catch_up` times per tick,
//!   and its accumulator never holds more than that many intervals.
//! - Frame deltas are clamped to `max_delta` before any driver sees them.

mod driver;
mod game_loop;
mod samples;

pub use driver::CallbackDriver;
pub use game_loop::{GameLoop, LoopConfig, LoopHandler, Phase, TickStats};
pub use samples::SampleBuffer;

pub fn crate_info() -> &'static str {
    concat!("relief-runtime v", env!("CARGO_PKG_VERSION"))
}
