//! Process-wide logging setup for storefront binaries and tests.

/// Initialize process-wide structured logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let _ = tracing::init();
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
