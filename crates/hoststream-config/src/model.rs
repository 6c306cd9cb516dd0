//! Typed configuration sections and their defaults.
//!
//! # Design
//! - Every section deserializes from a partial document; missing fields take defaults.
//! - Defaults live beside the types so loaders and tests agree on them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use hoststream_core::{DEFAULT_INTERNAL_BUFFER_SIZE, StreamConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default capacity of the host notification queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default tracing level directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoststreamConfig {
    /// Serialized dispatch runtime settings.
    pub runtime: RuntimeConfig,
    /// Defaults applied to streams created from a bare URL.
    pub streams: StreamDefaults,
    /// Logging settings.
    pub telemetry: TelemetryConfig,
}

/// Settings for the serialized dispatch runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of host notifications waiting for the worker.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Factory parameters used when callers only supply a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDefaults {
    /// Requested chunking size in bytes.
    pub internal_buffer_size: usize,
    /// Whether the host should keep a cache file.
    pub cache: bool,
    /// Whether range reads are requested.
    pub seekable: bool,
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            internal_buffer_size: DEFAULT_INTERNAL_BUFFER_SIZE,
            cache: false,
            seekable: false,
        }
    }
}

impl StreamDefaults {
    /// Factory parameters for `url` using these defaults.
    #[must_use]
    pub fn stream_config(&self, url: impl Into<String>) -> StreamConfig {
        StreamConfig::new(url)
            .with_cache(self.cache)
            .with_seekable(self.seekable)
            .with_internal_buffer_size(self.internal_buffer_size)
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Human-readable multi-line output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogOutput {
    /// Render the output as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogOutput {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat {
                value: s.to_string(),
            }),
        }
    }
}

impl Display for LogOutput {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Tracing filter directive, e.g. `info` or `hoststream_core=debug`.
    pub level: String,
    /// Output encoding; `None` lets the build profile decide.
    pub format: Option<LogOutput>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
