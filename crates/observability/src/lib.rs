//! Tracing/logging setup shared by binaries and tests.

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Initialize tracing for tests: pretty output captured by the test harness.
pub fn init_for_tests() {
    tracing::init_test();
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
