// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Construction-time options for a [`crate::Store`].
//!
//! None of these affect correctness: they only control trace output and the
//! artificial latency window used to shuffle completion delivery.

use serde::{Deserialize, Serialize};

use crate::error::ArgumentError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Log one debug line per operation
    pub enable_trace_log: bool,
    /// Lower bound of the injected delivery delay
    pub min_delay_ms: u64,
    /// Upper bound of the injected delivery delay; 0 disables delays
    pub max_delay_ms: u64,
    /// Seed for the delay generator, so a shuffled run can be replayed
    pub seed: u64,
}

impl MockConfig {
    pub fn with_trace_log(mut self, enable: bool) -> Self {
        self.enable_trace_log = enable;
        self
    }

    pub fn with_delay(mut self, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.min_delay_ms = min_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ArgumentError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ArgumentError::InvalidConfig(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ArgumentError> {
        let config: MockConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| ArgumentError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_delay() {
        let config = MockConfig::default();
        assert!(!config.enable_trace_log);
        assert_eq!(config.max_delay_ms, 0);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = MockConfig::from_yaml_str("enable_trace_log: true\nmax_delay_ms: 20\n").unwrap();
        assert_eq!(
            config,
            MockConfig::default().with_trace_log(true).with_delay(0, 20)
        );
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        assert!(matches!(
            MockConfig::from_yaml_str("min_delay_ms: 30\nmax_delay_ms: 10\n"),
            Err(ArgumentError::InvalidConfig(_))
        ));
        assert!(MockConfig::default().with_delay(5, 1).validate().is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(matches!(
            MockConfig::from_yaml_str("max_delay_ms: soon\n"),
            Err(ArgumentError::InvalidConfig(_))
        ));
    }
}
