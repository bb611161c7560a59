// Scan configuration: defaults, JSON config files and validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vulnerax_scanner::error::ConfigError;
use vulnerax_scanner::target::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES, DEFAULT_TIMEOUT_SECS, DEFAULT_WORKERS, TargetScope,
    default_user_agent,
};

/// User-facing scan options. Every field has a default, so `{}` is a valid
/// config file. `null` for an optional limit removes that limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
    pub timeout_seconds: f64,
    pub user_agent: String,
    pub same_origin_only: bool,
    pub workers: usize,
    pub max_duration_seconds: Option<f64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_pages: Some(DEFAULT_MAX_PAGES),
            max_depth: Some(DEFAULT_MAX_DEPTH),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            same_origin_only: true,
            workers: DEFAULT_WORKERS,
            max_duration_seconds: None,
        }
    }
}

impl ScanConfig {
    /// Load a camelCase JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(display.clone(), e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(display, e.to_string()))
    }

    /// Check every option and bind them to `root`.
    pub fn validate(&self, root: &str) -> Result<TargetScope, ConfigError> {
        if !is_positive(self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }
        let max_duration = match self.max_duration_seconds {
            Some(secs) if !is_positive(secs) => return Err(ConfigError::InvalidDuration(secs)),
            Some(secs) => Some(Duration::from_secs_f64(secs)),
            None => None,
        };

        let scope = TargetScope::new(root)?
            .with_max_pages(self.max_pages)
            .with_max_depth(self.max_depth)
            .with_timeout(Duration::from_secs_f64(self.timeout_seconds))
            .with_user_agent(self.user_agent.trim())
            .with_same_origin_only(self.same_origin_only)
            .with_max_duration(max_duration)
            .with_workers(self.workers);

        scope.validate()?;
        Ok(scope)
    }
}

// Finite and above zero; Duration::from_secs_f64 panics otherwise
fn is_positive(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs < u64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let scope = ScanConfig::default().validate("https://example.com").unwrap();
        assert_eq!(scope.max_pages, Some(200));
        assert_eq!(scope.max_depth, Some(5));
        assert_eq!(scope.timeout, Duration::from_secs(10));
        assert_eq!(scope.workers, 10);
        assert!(scope.same_origin_only);
        assert!(scope.max_duration.is_none());
    }

    #[test]
    fn test_rejects_non_positive_timeouts() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = ScanConfig {
                timeout_seconds: bad,
                ..Default::default()
            };
            assert!(matches!(
                config.validate("https://example.com"),
                Err(ConfigError::InvalidTimeout(_))
            ));
        }
    }

    #[test]
    fn test_rejects_bad_duration() {
        let config = ScanConfig {
            max_duration_seconds: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            config.validate("https://example.com"),
            Err(ConfigError::InvalidDuration(0.0))
        );
    }

    #[test]
    fn test_root_errors_surface() {
        assert!(matches!(
            ScanConfig::default().validate("gopher://example.com"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }
}
