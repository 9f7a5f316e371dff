use crate::fix::LocationFix;
use crate::geo_math;
use serde::{Deserialize, Serialize};

/// Thresholds for admitting a fix into the track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Fixes with a worse (larger) accuracy radius are dropped
    pub max_acceptable_accuracy_m: f64,
    /// Fixes closer than this to the last accepted one are treated as jitter
    pub min_distance_threshold_m: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_acceptable_accuracy_m: 20.0,
            min_distance_threshold_m: 5.0,
        }
    }
}

/// Outcome of evaluating one candidate fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterDecision {
    Accept,
    RejectAccuracy { accuracy_m: f64 },
    RejectTooClose { distance_m: f64 },
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// Accuracy gate plus minimum-displacement gate.
///
/// Stateless: the caller supplies the last accepted fix. Movement under the distance
/// threshold is lost on purpose so a stationary runner does not accumulate jitter.
#[derive(Debug, Clone, Default)]
pub struct FixFilter {
    config: FilterConfig,
}

impl FixFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        candidate: &LocationFix,
        last_accepted: Option<&LocationFix>,
    ) -> FilterDecision {
        // Accuracy first, distance can never override it
        if candidate.accuracy_m > self.config.max_acceptable_accuracy_m {
            return FilterDecision::RejectAccuracy {
                accuracy_m: candidate.accuracy_m,
            };
        }

        let Some(last) = last_accepted else {
            return FilterDecision::Accept;
        };

        let distance_m = geo_math::distance_meters(last.coordinate(), candidate.coordinate());
        if distance_m >= self.config.min_distance_threshold_m {
            FilterDecision::Accept
        } else {
            FilterDecision::RejectTooClose { distance_m }
        }
    }

    pub fn should_accept(
        &self,
        candidate: &LocationFix,
        last_accepted: Option<&LocationFix>,
    ) -> bool {
        self.evaluate(candidate, last_accepted).is_accept()
    }
}
