//! Structured logging for the unfold/fold kernels
//!
//! With the `tracing` feature enabled, every accepted kernel call emits a
//! `trace` event naming the device and the column matrix it walks, and every
//! rejected call emits a single `debug` event carrying the error. Without the
//! feature all helpers compile to no-ops.
//!
//! # Example
//!
//! ```ignore
//! use volfold_kernels::tracing_support::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig {
//!     filter: "volfold_kernels=trace".to_string(),
//!     ..TracingConfig::default()
//! })?;
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directive (default `volfold_kernels=info,warn`)
//! - `VOLFOLD_LOG_FORMAT`: `json` for one JSON object per event, compact text otherwise

use crate::error::KernelError;
use anyhow::Result;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Subscriber settings for [`init_tracing`]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive (e.g. `"volfold_kernels=trace"`)
    pub filter: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
    pub with_ansi: bool,
    pub with_thread_ids: bool,
}

impl TracingConfig {
    /// Build a config from a filter directive and a `VOLFOLD_LOG_FORMAT` value
    pub fn from_values(filter: Option<String>, format: Option<&str>) -> Self {
        Self {
            filter: filter.unwrap_or_else(|| "volfold_kernels=info,warn".to_string()),
            json: format.is_some_and(|f| f.eq_ignore_ascii_case("json")),
            with_ansi: true,
            with_thread_ids: false,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        let format = std::env::var("VOLFOLD_LOG_FORMAT").ok();
        Self::from_values(std::env::var("RUST_LOG").ok(), format.as_deref())
    }
}

/// Install a global `tracing-subscriber` fmt layer
///
/// Call once at application startup; a second call returns an error.
#[cfg(feature = "tracing")]
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;
    let layer = fmt::layer().with_thread_ids(config.with_thread_ids);
    let layer = if config.json {
        layer.json().with_filter(filter).boxed()
    } else {
        layer
            .compact()
            .with_ansi(config.with_ansi)
            .with_filter(filter)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}

/// Stub for when tracing feature is disabled
#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_config: TracingConfig) -> Result<()> {
    Ok(())
}

/// Record one accepted kernel call over a `rows x row_len` column matrix
#[cfg(feature = "tracing")]
pub fn record_kernel_call(operation: &str, volume: &[usize], column: &[usize], device: &str) {
    let rows: usize = column.iter().take(4).product();
    let row_len: usize = column.iter().skip(4).product();
    tracing::trace!(
        operation = operation,
        device = device,
        volume = ?volume,
        column = ?column,
        rows = rows,
        row_len = row_len,
        "kernel_call"
    );
}

/// Stub for when tracing is disabled
#[cfg(not(feature = "tracing"))]
pub fn record_kernel_call(_operation: &str, _volume: &[usize], _column: &[usize], _device: &str) {}

/// Record a call rejected by precondition checks
#[cfg(feature = "tracing")]
pub fn record_rejection(operation: &str, error: &KernelError) {
    tracing::debug!(operation = operation, error = %error, "kernel_rejected");
}

/// Stub for when tracing is disabled
#[cfg(not(feature = "tracing"))]
pub fn record_rejection(_operation: &str, _error: &KernelError) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_values() {
        let config = TracingConfig::from_values(None, None);
        assert_eq!(config.filter, "volfold_kernels=info,warn");
        assert!(!config.json);
        assert!(config.with_ansi);

        let config = TracingConfig::from_values(Some("volfold_kernels=trace".into()), Some("JSON"));
        assert_eq!(config.filter, "volfold_kernels=trace");
        assert!(config.json);

        assert!(!TracingConfig::from_values(None, Some("pretty")).json);
    }

    #[test]
    fn test_record_helpers() {
        // Must not panic with or without a subscriber
        record_kernel_call("vol2col", &[1, 4, 4, 4], &[1, 2, 2, 2, 3, 3, 3], "cpu");
        record_rejection("col2vol", &KernelError::channel_mismatch("col2vol", 1, 2));
    }
}
