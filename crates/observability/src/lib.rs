//! Process-wide tracing setup shared by the binaries.

/// Initialize process-wide tracing with JSON output, filtered by `RUST_LOG`
/// (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(DEFAULT_FILTER);
}

/// Same as [`init`] with a different fallback filter when `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) {
    tracing::init(default_filter);
}

pub const DEFAULT_FILTER: &str = "info";

/// Subscriber construction (filters, layers).
pub mod tracing;
