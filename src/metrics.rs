//! Derived run metrics.
//!
//! Everything here is a pure function of (distance, duration). Calories and steps are
//! linear heuristics, not physiological models.

use crate::fix::AcceptedPoint;
use crate::session::SessionState;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MS_PER_HOUR: f64 = 3_600_000.0;
const KCAL_PER_KG_KM: f64 = 0.75;

/// Body assumptions behind the calorie and step estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub weight_kg: f64,
    pub step_length_m: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            weight_kg: 70.0,
            step_length_m: 0.78,
        }
    }
}

/// Minutes and seconds per kilometer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pace {
    pub minutes: u32,
    pub seconds: u32,
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'{:02}''", self.minutes, self.seconds)
    }
}

/// Placeholder shown when pace is undefined (not moving yet)
pub const PACE_PLACEHOLDER: &str = "--'--''";

pub fn format_pace(pace: Option<Pace>) -> String {
    pace.map(|p| p.to_string())
        .unwrap_or_else(|| PACE_PLACEHOLDER.to_string())
}

/// km/h; zero duration yields 0 rather than infinity
pub fn average_speed_kmh(distance_m: f64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    (distance_m / 1000.0) / (duration_ms as f64 / MS_PER_HOUR)
}

pub fn pace_minutes_per_km(speed_kmh: f64) -> Option<Pace> {
    if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        return None;
    }
    let total_seconds = (3600.0 / speed_kmh).round();
    if total_seconds > u32::MAX as f64 {
        return None;
    }
    let total_seconds = total_seconds as u32;
    Some(Pace {
        minutes: total_seconds / 60,
        seconds: total_seconds % 60,
    })
}

pub fn estimated_calories(distance_m: f64, weight_kg: f64) -> u32 {
    ((distance_m / 1000.0) * weight_kg * KCAL_PER_KG_KM) as u32
}

pub fn estimated_steps(distance_m: f64, step_length_m: f64) -> u32 {
    if step_length_m <= 0.0 {
        return 0;
    }
    (distance_m / step_length_m) as u32
}

/// "12.34 km"
pub fn format_distance_km(distance_m: f64) -> String {
    format!("{:.2} km", distance_m / 1000.0)
}

/// "h:mm:ss" past the hour, "mm:ss" below it
pub fn format_duration(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Live view of a session, recomputed on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub state: SessionState,
    pub distance_m: f64,
    pub duration_ms: u64,
    pub average_speed_kmh: f64,
    pub pace: Option<Pace>,
    pub calories: u32,
    pub steps: u32,
    pub point_count: usize,
    pub heading_deg: Option<f64>,
}

impl MetricsSnapshot {
    pub fn compute(
        state: SessionState,
        distance_m: f64,
        duration_ms: u64,
        point_count: usize,
        heading_deg: Option<f64>,
        config: &MetricsConfig,
    ) -> Self {
        let average_speed_kmh = average_speed_kmh(distance_m, duration_ms);
        MetricsSnapshot {
            state,
            distance_m,
            duration_ms,
            average_speed_kmh,
            pace: pace_minutes_per_km(average_speed_kmh),
            calories: estimated_calories(distance_m, config.weight_kg),
            steps: estimated_steps(distance_m, config.step_length_m),
            point_count,
            heading_deg,
        }
    }

    pub fn pace_display(&self) -> String {
        format_pace(self.pace)
    }
}

/// Finalized record of one run. Produced once at stop and handed out; the engine keeps
/// no copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: String,
    pub distance_m: f64,
    pub duration_ms: u64,
    pub average_speed_kmh: f64,
    pub calories: u32,
    pub steps: u32,
    pub route: Vec<AcceptedPoint>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rejected_fixes: u64,
    pub out_of_order_fixes: u64,
}

impl RunSummary {
    pub fn pace(&self) -> Option<Pace> {
        pace_minutes_per_km(self.average_speed_kmh)
    }

    /// Start plus session duration; differs from `end_time` by the time spent paused
    pub fn computed_end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::milliseconds(self.duration_ms as i64)
    }

    pub fn formatted_distance(&self) -> String {
        format_distance_km(self.distance_m)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_ms)
    }

    pub fn formatted_pace(&self) -> String {
        format_pace(self.pace())
    }
}

/// Inputs to [`build_summary`] that come from the session rather than the track
#[derive(Debug, Clone)]
pub struct SummaryContext {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub rejected_fixes: u64,
    pub out_of_order_fixes: u64,
}

/// Freeze all derived metrics together into the final record
pub fn build_summary(
    route: Vec<AcceptedPoint>,
    distance_m: f64,
    ctx: SummaryContext,
    config: &MetricsConfig,
) -> RunSummary {
    RunSummary {
        session_id: ctx.session_id,
        distance_m,
        duration_ms: ctx.duration_ms,
        average_speed_kmh: average_speed_kmh(distance_m, ctx.duration_ms),
        calories: estimated_calories(distance_m, config.weight_kg),
        steps: estimated_steps(distance_m, config.step_length_m),
        route,
        start_time: ctx.start_time,
        end_time: ctx.end_time,
        rejected_fixes: ctx.rejected_fixes,
        out_of_order_fixes: ctx.out_of_order_fixes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::LocationFix;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn test_average_speed() {
        // 10 km in an hour
        assert_abs_diff_eq!(average_speed_kmh(10_000.0, 3_600_000), 10.0, epsilon = 1e-9);
        assert_eq!(average_speed_kmh(500.0, 0), 0.0);
    }

    #[test]
    fn test_pace() {
        assert_eq!(
            pace_minutes_per_km(12.0),
            Some(Pace {
                minutes: 5,
                seconds: 0
            })
        );
        // 60 / 11 = 5.4545 min = 5'27''
        assert_eq!(
            pace_minutes_per_km(11.0),
            Some(Pace {
                minutes: 5,
                seconds: 27
            })
        );
        assert_eq!(pace_minutes_per_km(0.0), None);
        assert_eq!(pace_minutes_per_km(-3.0), None);
        assert_eq!(pace_minutes_per_km(f64::NAN), None);
    }

    #[test]
    fn test_pace_rounding_carries_into_minutes() {
        // 3600 / 10.0017 = 359.94 s, rounds to 6'00'' rather than 5'60''
        let pace = pace_minutes_per_km(10.0017).unwrap();
        assert_eq!(pace.to_string(), "6'00''");
    }

    #[test]
    fn test_pace_display() {
        assert_eq!(format_pace(pace_minutes_per_km(12.0)), "5'00''");
        assert_eq!(format_pace(None), PACE_PLACEHOLDER);
    }

    #[test]
    fn test_calories_and_steps() {
        assert_eq!(estimated_calories(1000.0, 70.0), 52);
        assert_eq!(estimated_calories(0.0, 70.0), 0);
        assert_eq!(estimated_steps(500.0, 0.5), 1000);
        assert_eq!(estimated_steps(100.0, 0.78), 128);
        assert_eq!(estimated_steps(100.0, 0.0), 0);
    }

    #[test]
    fn test_estimates_scale_linearly() {
        for distance in [2000.0, 4000.0, 8000.0] {
            assert_eq!(
                estimated_calories(2.0 * distance, 70.0),
                2 * estimated_calories(distance, 70.0)
            );
        }
        for distance in [750.0, 1500.0, 3000.0] {
            assert_eq!(
                estimated_steps(2.0 * distance, 0.75),
                2 * estimated_steps(distance, 0.75)
            );
        }
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_distance_km(5234.0), "5.23 km");
        assert_eq!(format_duration(65_000), "01:05");
        assert_eq!(format_duration(3_725_000), "1:02:05");
        assert_eq!(format_duration(0), "00:00");
    }

    #[test]
    fn test_snapshot_compute() {
        let snap = MetricsSnapshot::compute(
            SessionState::Tracking,
            3000.0,
            900_000,
            12,
            Some(45.0),
            &MetricsConfig::default(),
        );
        assert_abs_diff_eq!(snap.average_speed_kmh, 12.0, epsilon = 1e-9);
        assert_eq!(snap.pace_display(), "5'00''");
        assert_eq!(snap.calories, 157);
        assert_eq!(snap.point_count, 12);
    }

    #[test]
    fn test_build_summary() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        let end = start + Duration::minutes(40);
        let route = vec![
            AcceptedPoint {
                index: 0,
                fix: LocationFix::new(10.0, 106.0, 5.0, 0),
            },
            AcceptedPoint {
                index: 1,
                fix: LocationFix::new(10.01, 106.0, 5.0, 1000),
            },
        ];
        let summary = build_summary(
            route.clone(),
            6000.0,
            SummaryContext {
                session_id: "run_1".to_string(),
                start_time: start,
                end_time: end,
                duration_ms: 1_800_000,
                rejected_fixes: 3,
                out_of_order_fixes: 0,
            },
            &MetricsConfig::default(),
        );

        assert_abs_diff_eq!(summary.average_speed_kmh, 12.0, epsilon = 1e-9);
        assert_eq!(summary.calories, 315);
        assert_eq!(summary.steps, 7692);
        assert_eq!(summary.route, route);
        assert_eq!(summary.formatted_pace(), "5'00''");
        assert_eq!(summary.formatted_duration(), "30:00");
        assert_eq!(summary.computed_end_time(), start + Duration::minutes(30));
        assert_eq!(summary.end_time, end);
    }
}
