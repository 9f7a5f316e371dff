use crate::error::{TrackResult, TrackerError};
use crate::fix_filter::FilterConfig;
use crate::metrics::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine configuration. Every field has a default, so a partial JSON document such as
/// `{"filter": {"min_distance_threshold_m": 3.0}}` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub filter: FilterConfig,
    pub metrics: MetricsConfig,
    /// Duration clock resolution
    pub tick_interval_ms: u64,
    /// Per-subscriber event buffer; events beyond it are dropped for that subscriber
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            metrics: MetricsConfig::default(),
            tick_interval_ms: 1000,
            event_capacity: 256,
        }
    }
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> TrackResult<Self> {
        let config: TrackerConfig =
            serde_json::from_str(json).map_err(|e| TrackerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> TrackResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> TrackResult<()> {
        let accuracy = self.filter.max_acceptable_accuracy_m;
        if !accuracy.is_finite() || accuracy <= 0.0 {
            return Err(TrackerError::Config(format!(
                "max_acceptable_accuracy_m must be positive, got {}",
                accuracy
            )));
        }
        let min_distance = self.filter.min_distance_threshold_m;
        if !min_distance.is_finite() || min_distance < 0.0 {
            return Err(TrackerError::Config(format!(
                "min_distance_threshold_m must be non-negative, got {}",
                min_distance
            )));
        }
        if !self.metrics.weight_kg.is_finite() || self.metrics.weight_kg <= 0.0 {
            return Err(TrackerError::Config("weight_kg must be positive".to_string()));
        }
        if !self.metrics.step_length_m.is_finite() || self.metrics.step_length_m <= 0.0 {
            return Err(TrackerError::Config(
                "step_length_m must be positive".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(TrackerError::Config(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(TrackerError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.filter.max_acceptable_accuracy_m, 20.0);
        assert_eq!(config.filter.min_distance_threshold_m, 5.0);
        assert_eq!(config.metrics.weight_kg, 70.0);
        assert_eq!(config.metrics.step_length_m, 0.78);
        assert_eq!(config.tick_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            TrackerConfig::from_json_str(r#"{"filter": {"min_distance_threshold_m": 3.0}}"#)
                .unwrap();
        assert_eq!(config.filter.min_distance_threshold_m, 3.0);
        assert_eq!(config.filter.max_acceptable_accuracy_m, 20.0);
        assert_eq!(config.metrics, MetricsConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = TrackerConfig::from_json_str(r#"{"tick_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));

        let err =
            TrackerConfig::from_json_str(r#"{"metrics": {"weight_kg": -1.0}}"#).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));

        let err = TrackerConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"metrics": {{"weight_kg": 82.5}}}}"#).unwrap();

        let config = TrackerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.metrics.weight_kg, 82.5);

        let missing = TrackerConfig::from_json_file("/nonexistent/run_tracker.json");
        assert!(matches!(missing, Err(TrackerError::Config(_))));
    }
}
