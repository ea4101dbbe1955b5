//! Tracing and logging setup shared by binaries and tests.

/// Initialize process-wide structured logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Logging for test binaries: human-readable and captured by the harness.
pub fn init_for_tests() {
    tracing::init_test();
}

/// Tracing configuration (filters, formats).
pub mod tracing;
