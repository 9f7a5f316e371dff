// Run Tracker
// Live GPS track processing and run metrics for an active run

pub mod clock;
pub mod config;
pub mod error;
pub mod fix;
pub mod fix_filter;
pub mod geo_math;
pub mod metrics;
pub mod session;
pub mod sink;
pub mod storage;
pub mod track;

pub use clock::{ClockTicker, DurationClock};
pub use config::TrackerConfig;
pub use error::{TrackResult, TrackerError};
pub use fix::{AcceptedPoint, Coordinate, LocationFix};
pub use fix_filter::{FilterConfig, FilterDecision, FixFilter};
pub use metrics::{MetricsConfig, MetricsSnapshot, Pace, RunSummary};
pub use session::{FixOutcome, RunSession, SessionEvent, SessionState};
pub use sink::{JsonFileSink, MemorySink, RunSink};
pub use storage::{GpxTrack, RunExport};
pub use track::TrackAccumulator;
