use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ProviderError;

/// Construction-time options for a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderOptions {
    /// Channel to bind at creation time, same as an immediate `bind_to_channel`.
    pub channel: Option<String>,

    /// Upper bound on a single backend acquisition, in seconds.
    /// `None` waits for the backend indefinitely.
    pub acquire_timeout_secs: Option<f64>,
}

impl ProviderOptions {
    pub fn with_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..Default::default()
        }
    }

    /// Parse options from JSON, e.g. `{"channel": "news1"}`.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| ProviderError::InvalidOptions(format!("failed to parse options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if let Some(channel) = &self.channel {
            if channel.trim().is_empty() {
                return Err(ProviderError::InvalidOptions("channel must not be empty".into()));
            }
        }
        if let Some(secs) = self.acquire_timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ProviderError::InvalidOptions(format!(
                    "acquire timeout must be positive, got {}",
                    secs
                )));
            }
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_secs.map(Duration::from_secs_f64)
    }
}
