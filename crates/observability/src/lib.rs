//! Process-wide logging setup for services embedding the inventory engine.

/// Initialize JSON logging filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, formats).
pub mod tracing;

pub use crate::tracing::{LogFormat, init_for_tests, init_with};
