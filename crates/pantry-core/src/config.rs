//! Session configuration

use crate::error::PantryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Description of the synthesized essentials group
pub const ESSENTIALS_GROUP: &str = "Pantry Essentials";

/// Pantry session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Persistence flush period in milliseconds
    pub flush_interval_ms: u64,
    /// Description identifying the essentials group
    pub essentials_group: String,
    /// Attempts at reading the persisted pantry once authenticated
    pub hydration_attempts: u32,
    /// Delay between hydration read attempts in milliseconds
    pub hydration_retry_ms: u64,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With flush period
    #[inline]
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With essentials group description
    #[inline]
    #[must_use]
    pub fn with_essentials_group(mut self, description: impl Into<String>) -> Self {
        self.essentials_group = description.into();
        self
    }

    /// With hydration retry policy
    #[inline]
    #[must_use]
    pub fn with_hydration_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.hydration_attempts = attempts;
        self.hydration_retry_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Flush period
    #[inline]
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Delay between hydration attempts
    #[inline]
    #[must_use]
    pub fn hydration_retry_delay(&self) -> Duration {
        Duration::from_millis(self.hydration_retry_ms)
    }

    /// Reject settings the session cannot run with
    ///
    /// # Errors
    /// `PantryError::Config` on a zero flush period, zero hydration attempts
    /// or an empty essentials description.
    pub fn validate(&self) -> Result<(), PantryError> {
        if self.flush_interval_ms == 0 {
            return Err(PantryError::Config("flush_interval_ms must be > 0".into()));
        }
        if self.hydration_attempts == 0 {
            return Err(PantryError::Config("hydration_attempts must be > 0".into()));
        }
        if self.essentials_group.trim().is_empty() {
            return Err(PantryError::Config("essentials_group must not be empty".into()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    /// `PantryError::Config` if the document is malformed or fails validation.
    pub fn from_toml_str(input: &str) -> Result<Self, PantryError> {
        let config: Self =
            toml::from_str(input).map_err(|e| PantryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 20_000,
            essentials_group: ESSENTIALS_GROUP.to_string(),
            hydration_attempts: 3,
            hydration_retry_ms: 1_000,
        }
    }
}
