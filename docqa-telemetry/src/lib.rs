//! # docqa-telemetry
//!
//! Installs the process-wide `tracing` subscriber used by the docqa binaries.
//!
//! Events go to stderr so that answers printed on stdout stay clean. The
//! filter comes from `RUST_LOG` and falls back to [`DEFAULT_FILTER`].
//!
//! ```rust,no_run
//! docqa_telemetry::init_telemetry("docqa").expect("telemetry");
//! tracing::info!("ready");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Error returned when another global subscriber is already installed.
pub type TelemetryError = Box<dyn std::error::Error + Send + Sync + 'static>;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Output format of log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line events.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Build the event filter from `RUST_LOG`, or [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialise human-readable logging for `service_name`.
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    init_with_format(service_name, LogFormat::Pretty)
}

/// Initialise logging in the given format.
///
/// Calling it again after a successful initialisation is a no-op.
///
/// # Errors
///
/// Fails if a global subscriber was installed by other code.
pub fn init_with_format(service_name: &str, format: LogFormat) -> Result<(), TelemetryError> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Pretty => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(e) = result {
        INITIALIZED.store(false, Ordering::SeqCst);
        return Err(e);
    }

    tracing::debug!(service = service_name, ?format, "telemetry initialized");
    Ok(())
}
