//! Tracing bootstrap for binaries and embedders.
//!
//! The library itself only emits `tracing` events; nothing is printed unless a
//! subscriber is installed, either by the host application or by [`init`].

use std::env;

use tracing_subscriber::EnvFilter;

/// Filter used when no environment variable supplies one.
pub const DEFAULT_FILTER: &str = "info,social_api=debug";

/// Environment variable consulted after `RUST_LOG`.
pub const LOG_ENV: &str = "SOCIAL_API_LOG";

/// Initialize a global fmt subscriber with severity gating from environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `SOCIAL_API_LOG`
/// 3) [`DEFAULT_FILTER`]
///
/// Calling this twice, or after another subscriber was installed, is a no-op.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(true)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let custom = env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok());

    custom.unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
