//! Core application primitives (HTTP surface, worker runtime)

pub mod http;
pub mod runtime;

pub use http::{create_router, serve, AppState, HealthStatus};
pub use runtime::WorkerRuntime;
