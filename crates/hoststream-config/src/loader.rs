//! JSON documents and environment overrides.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{HoststreamConfig, LogOutput};
use crate::validate::parse_positive;

/// Overrides `runtime.queue_capacity`.
pub const ENV_QUEUE_CAPACITY: &str = "HOSTSTREAM_QUEUE_CAPACITY";
/// Overrides `streams.internal_buffer_size`.
pub const ENV_BUFFER_SIZE: &str = "HOSTSTREAM_BUFFER_SIZE";
/// Overrides `telemetry.level`.
pub const ENV_LOG_LEVEL: &str = "HOSTSTREAM_LOG_LEVEL";
/// Overrides `telemetry.format`.
pub const ENV_LOG_FORMAT: &str = "HOSTSTREAM_LOG_FORMAT";

impl HoststreamConfig {
    /// Decode and validate a JSON document. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and validation errors
    /// for out-of-range values.
    pub fn from_json_str(document: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, decode and validate a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`HoststreamConfig::from_json_str`].
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let document = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "config.read",
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration file");
        Self::from_json_str(&document)
    }

    /// Apply `HOSTSTREAM_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is set to an unusable value.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides resolved through `lookup`, then validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is set to an unusable value.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_QUEUE_CAPACITY) {
            self.runtime.queue_capacity = parse_positive("runtime", "queue_capacity", &value)?;
        }
        if let Some(value) = lookup(ENV_BUFFER_SIZE) {
            self.streams.internal_buffer_size =
                parse_positive("streams", "internal_buffer_size", &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.telemetry.level = value;
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            self.telemetry.format = Some(value.parse::<LogOutput>()?);
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_document_keeps_defaults() -> anyhow::Result<()> {
        let config = HoststreamConfig::from_json_str(
            r#"{"runtime":{"queue_capacity":8},"telemetry":{"format":"json"}}"#,
        )?;
        assert_eq!(config.runtime.queue_capacity, 8);
        assert_eq!(config.telemetry.format, Some(LogOutput::Json));
        assert_eq!(config.telemetry.level, "info");
        assert_eq!(config.streams, HoststreamConfig::default().streams);
        Ok(())
    }

    #[test]
    fn malformed_and_invalid_documents_are_rejected() {
        assert!(matches!(
            HoststreamConfig::from_json_str("{"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            HoststreamConfig::from_json_str(r#"{"telemetry":{"format":"xml"}}"#),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            HoststreamConfig::from_json_str(r#"{"runtime":{"queue_capacity":0}}"#),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = HoststreamConfig::from_path(Path::new("/definitely/missing/hoststream.json"));
        assert!(matches!(
            result,
            Err(ConfigError::Io {
                operation: "config.read",
                ..
            })
        ));
    }

    #[test]
    fn environment_overrides_apply() -> anyhow::Result<()> {
        let mut config = HoststreamConfig::default();
        config.apply_env_with(env(&[
            (ENV_QUEUE_CAPACITY, "32"),
            (ENV_BUFFER_SIZE, "8192"),
            (ENV_LOG_LEVEL, "hoststream_core=debug"),
            (ENV_LOG_FORMAT, "pretty"),
        ]))?;
        assert_eq!(config.runtime.queue_capacity, 32);
        assert_eq!(config.streams.internal_buffer_size, 8192);
        assert_eq!(config.telemetry.level, "hoststream_core=debug");
        assert_eq!(config.telemetry.format, Some(LogOutput::Pretty));
        Ok(())
    }

    #[test]
    fn unusable_environment_values_are_rejected() {
        let mut config = HoststreamConfig::default();
        assert!(matches!(
            config.apply_env_with(env(&[(ENV_QUEUE_CAPACITY, "0")])),
            Err(ConfigError::InvalidField {
                field: "queue_capacity",
                ..
            })
        ));
        assert!(matches!(
            config.apply_env_with(env(&[(ENV_LOG_FORMAT, "yaml")])),
            Err(ConfigError::InvalidLogFormat { .. })
        ));
    }
}
