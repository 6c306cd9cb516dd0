//! Telemetry wiring from the typed configuration.

use hoststream_config::{LogOutput, TelemetryConfig};
use hoststream_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, build_sha, init_logging};
use tracing::info;

use crate::error::{RuntimeError, RuntimeResult};

/// Logging settings derived from `telemetry`; an unset format follows the build profile.
#[must_use]
pub fn logging_config(telemetry: &TelemetryConfig) -> LoggingConfig<'_> {
    let format = match telemetry.format {
        Some(LogOutput::Json) => LogFormat::Json,
        Some(LogOutput::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    LoggingConfig {
        level: &telemetry.level,
        format,
        build_sha: build_sha(),
        span_events: false,
    }
}

/// Install the global subscriber and enter the plugin-level span.
///
/// The returned guard must live as long as the plugin instance.
///
/// # Errors
///
/// Returns [`RuntimeError::Telemetry`] when a subscriber is already installed.
pub fn init_telemetry(telemetry: &TelemetryConfig) -> RuntimeResult<GlobalContextGuard> {
    init_logging(&logging_config(telemetry)).map_err(|err| RuntimeError::Telemetry {
        operation: "telemetry.init",
        source: err.into(),
    })?;
    let guard = GlobalContextGuard::new("plugin");
    info!(build_sha = build_sha(), "plugin telemetry initialised");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_format_overrides_inference() {
        let telemetry = TelemetryConfig {
            level: "debug".into(),
            format: Some(LogOutput::Json),
        };
        let logging = logging_config(&telemetry);
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    fn unset_format_follows_build_profile() {
        let telemetry = TelemetryConfig::default();
        let logging = logging_config(&telemetry);
        assert_eq!(logging.format, LogFormat::infer());
        assert_eq!(logging.level, "info");
    }
}
