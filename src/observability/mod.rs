//! Observability
//!
//! Structured logging for the counter daemon:
//! - `tracing` events throughout the crate
//! - stderr fmt output filtered by `RUST_LOG`
//! - span helpers around polling, aggregation and emission

pub mod spans;
pub mod tracing_setup;

pub use spans::*;
pub use tracing_setup::init as init_tracing;
