//! Subscriber installation for a plugin process.
//!
//! # Design
//! - One global subscriber per process; the host may load several plugin
//!   instances, so a second installation is reported rather than replacing the first.
//! - The build identifier is captured on first installation and shared by every span.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Filter applied when neither `RUST_LOG` nor the configuration names one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Fails when `config.level` is not a valid filter directive or when another
/// subscriber is already installed in this process.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("log level must not be blank");
    }
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.level)
            .map_err(|err| anyhow!("invalid log level '{}': {err}", config.level))?,
    };
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    tracing_subscriber::registry()
        .with(output_layer(config))
        .with(filter)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber already installed: {err}"))
}

fn output_layer(config: &LoggingConfig) -> BoxedLayer {
    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_span_events(span_events);
    match config.format {
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

/// Build identifier recorded at installation, or `dev` before that.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive, e.g. `info` or `hoststream_core=debug`.
    pub level: &'a str,
    /// Output encoding.
    pub format: LogFormat,
    /// Build identifier attached to the plugin span.
    pub build_sha: &'a str,
    /// Emit a line when each span closes, with its busy/idle timings.
    pub span_events: bool,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
            span_events: false,
        }
    }
}

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty output for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(anyhow!("invalid log format '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert!("yaml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn default_config_uses_inferred_format() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.format, LogFormat::infer());
        assert!(!config.span_events);
    }

    #[test]
    fn blank_level_is_rejected_before_installation() {
        let config = LoggingConfig {
            level: "  ",
            ..LoggingConfig::default()
        };
        assert!(init_logging(&config).is_err());
    }

    #[test]
    fn second_installation_is_reported() {
        let config = LoggingConfig {
            format: LogFormat::Json,
            build_sha: "abc123",
            span_events: true,
            ..LoggingConfig::default()
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
