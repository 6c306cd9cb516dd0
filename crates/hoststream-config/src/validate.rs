//! Validation and parsing helpers.

use crate::error::{ConfigError, ConfigResult};
use crate::model::HoststreamConfig;

/// Largest accepted internal buffer size.
pub const MAX_INTERNAL_BUFFER_SIZE: usize = 64 * 1024 * 1024;

impl HoststreamConfig {
    /// Check every section for values the runtime cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        ensure_positive("runtime", "queue_capacity", self.runtime.queue_capacity)?;
        ensure_positive(
            "streams",
            "internal_buffer_size",
            self.streams.internal_buffer_size,
        )?;
        if self.streams.internal_buffer_size > MAX_INTERNAL_BUFFER_SIZE {
            return Err(ConfigError::InvalidField {
                section: "streams",
                field: "internal_buffer_size",
                value: Some(self.streams.internal_buffer_size.to_string()),
                reason: "exceeds maximum buffer size",
            });
        }
        if self.telemetry.level.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                section: "telemetry",
                field: "level",
                value: None,
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Parse a strictly positive size value.
pub(crate) fn parse_positive(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> ConfigResult<usize> {
    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidField {
            section,
            field,
            value: Some(value.to_string()),
            reason: "must be an unsigned integer",
        })?;
    ensure_positive(section, field, parsed)?;
    Ok(parsed)
}

fn ensure_positive(section: &'static str, field: &'static str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            section,
            field,
            value: Some(value.to_string()),
            reason: "must be greater than zero",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert!(HoststreamConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let mut config = HoststreamConfig::default();
        config.runtime.queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                section: "runtime",
                field: "queue_capacity",
                ..
            })
        ));
    }

    #[test]
    fn buffer_size_bounds_are_enforced() {
        let mut config = HoststreamConfig::default();
        config.streams.internal_buffer_size = 0;
        assert!(config.validate().is_err());
        config.streams.internal_buffer_size = MAX_INTERNAL_BUFFER_SIZE + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                reason: "exceeds maximum buffer size",
                ..
            })
        ));
    }

    #[test]
    fn blank_log_level_is_rejected() {
        let mut config = HoststreamConfig::default();
        config.telemetry.level = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_positive_rejects_zero_and_garbage() {
        assert_eq!(parse_positive("runtime", "queue_capacity", " 16 ").ok(), Some(16));
        assert!(parse_positive("runtime", "queue_capacity", "0").is_err());
        assert!(matches!(
            parse_positive("runtime", "queue_capacity", "-3"),
            Err(ConfigError::InvalidField {
                reason: "must be an unsigned integer",
                ..
            })
        ));
    }
}
