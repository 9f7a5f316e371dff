use crate::error::{TrackResult, TrackerError};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// GPS location fix from the platform location service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: f64,
    /// Milliseconds, monotonic or wall clock as delivered by the producer
    pub timestamp_ms: i64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            timestamp_ms,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Reject fixes that cannot be fed to the filter: non-finite or out-of-range
    /// coordinates, negative or non-finite accuracy.
    pub fn validate(&self) -> TrackResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(TrackerError::InvalidFix(format!(
                "latitude {} outside -90..90",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(TrackerError::InvalidFix(format!(
                "longitude {} outside -180..180",
                self.longitude
            )));
        }
        if !self.accuracy_m.is_finite() || self.accuracy_m < 0.0 {
            return Err(TrackerError::InvalidFix(format!(
                "accuracy {} must be a non-negative number",
                self.accuracy_m
            )));
        }
        Ok(())
    }
}

/// A fix that passed the filter, tagged with its position in the route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPoint {
    pub index: usize,
    pub fix: LocationFix,
}

impl AcceptedPoint {
    pub fn coordinate(&self) -> Coordinate {
        self.fix.coordinate()
    }
}
