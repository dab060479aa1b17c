//! Shared types for the relief terrain workspace.
//!
//! Holds the placement `Transform` and the small amount of vector glue the
//! mesher and terrain crates share.

mod math;
mod types;

pub use math::{UP, bilinear, normalize_or};
pub use types::Transform;

pub fn crate_info() -> &'static str {
    concat!("relief-common v", env!("CARGO_PKG_VERSION"))
}
