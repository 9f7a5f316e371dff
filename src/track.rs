use crate::error::{TrackResult, TrackerError};
use crate::fix::{AcceptedPoint, Coordinate, LocationFix};
use crate::geo_math;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Append-only route plus the running distance over it
#[derive(Debug, Clone, Default)]
pub struct Track {
    points: Vec<AcceptedPoint>,
    distance_m: f64,
}

/// Result of a single append
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendOutcome {
    pub index: usize,
    pub distance_delta_m: f64,
    pub total_distance_m: f64,
}

/// Cheap summary of the track for live metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackStats {
    pub distance_m: f64,
    pub point_count: usize,
    pub heading_deg: Option<f64>,
}

/// Owns the track. Single writer (fix ingestion), many readers (UI, metrics).
///
/// Point and distance are updated under one write guard, so readers never see a point
/// whose distance has not been counted yet.
#[derive(Debug, Default)]
pub struct TrackAccumulator {
    track: RwLock<Track>,
}

impl TrackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TrackResult<RwLockReadGuard<'_, Track>> {
        self.track.read().map_err(|_| TrackerError::lock("track"))
    }

    fn write(&self) -> TrackResult<RwLockWriteGuard<'_, Track>> {
        self.track.write().map_err(|_| TrackerError::lock("track"))
    }

    pub fn append(&self, fix: LocationFix) -> TrackResult<AppendOutcome> {
        let mut track = self.write()?;

        let distance_delta_m = track
            .points
            .last()
            .map(|last| geo_math::distance_meters(last.coordinate(), fix.coordinate()))
            .unwrap_or(0.0);

        let index = track.points.len();
        track.points.push(AcceptedPoint { index, fix });
        track.distance_m += distance_delta_m;

        Ok(AppendOutcome {
            index,
            distance_delta_m,
            total_distance_m: track.distance_m,
        })
    }

    pub fn current_distance(&self) -> TrackResult<f64> {
        Ok(self.read()?.distance_m)
    }

    pub fn route_snapshot(&self) -> TrackResult<Vec<Coordinate>> {
        Ok(self.read()?.points.iter().map(|p| p.coordinate()).collect())
    }

    /// Coordinates appended at or after `start_index`, for incremental redraws
    pub fn route_since(&self, start_index: usize) -> TrackResult<Vec<Coordinate>> {
        let track = self.read()?;
        Ok(track
            .points
            .iter()
            .skip(start_index)
            .map(|p| p.coordinate())
            .collect())
    }

    pub fn points(&self) -> TrackResult<Vec<AcceptedPoint>> {
        Ok(self.read()?.points.clone())
    }

    /// Points and distance read under the same guard
    pub fn snapshot(&self) -> TrackResult<(Vec<AcceptedPoint>, f64)> {
        let track = self.read()?;
        Ok((track.points.clone(), track.distance_m))
    }

    pub fn last_point(&self) -> TrackResult<Option<AcceptedPoint>> {
        Ok(self.read()?.points.last().copied())
    }

    /// Distance, point count and last-segment bearing read under one guard,
    /// without cloning the route
    pub fn stats(&self) -> TrackResult<TrackStats> {
        let track = self.read()?;
        let n = track.points.len();
        let heading_deg = if n >= 2 {
            Some(geo_math::initial_bearing_deg(
                track.points[n - 2].coordinate(),
                track.points[n - 1].coordinate(),
            ))
        } else {
            None
        };
        Ok(TrackStats {
            distance_m: track.distance_m,
            point_count: n,
            heading_deg,
        })
    }

    pub fn len(&self) -> TrackResult<usize> {
        Ok(self.read()?.points.len())
    }

    pub fn is_empty(&self) -> TrackResult<bool> {
        Ok(self.read()?.points.is_empty())
    }

    pub fn reset(&self) -> TrackResult<()> {
        let mut track = self.write()?;
        track.points.clear();
        track.distance_m = 0.0;
        Ok(())
    }
}
