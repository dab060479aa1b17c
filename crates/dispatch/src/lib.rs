//! Off-thread terrain mesh generation.
//!
//! # Invariants
//! - Every accepted request completes exactly once: with a mesh, a mesh
//!   error, a caught worker panic, or `WorkerLost`.
//! - Progress and completion callbacks of one request never see another
//!   request's messages.
//! - Callbacks run only on the thread that polls the dispatcher.
//!
//! Workers are persistent threads fed through a shared job queue. Each
//! message back carries the request id, and the dispatcher keeps a registry
//! of pending callbacks keyed by that id.

mod dispatcher;
mod request;
mod worker;

pub use dispatcher::MeshDispatcher;
pub use request::{DispatcherConfig, PollStats, RequestId};
pub use worker::{IntoSharedSource, SharedSource};

use relief_mesh::MeshError;

/// Errors from starting the dispatcher or queueing a request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to spawn mesh worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("dispatcher needs at least one worker")]
    NoWorkers,
    #[error("mesh workers are no longer running")]
    WorkerGone,
}

/// Why a queued request produced no mesh.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error("mesh worker panicked: {0}")]
    Panicked(String),
    #[error("mesh worker exited before completing the request")]
    WorkerLost,
}

pub fn crate_info() -> &'static str {
    concat!("relief-dispatch v", env!("CARGO_PKG_VERSION"))
}
