use crate::clock::DurationClock;
use crate::config::TrackerConfig;
use crate::error::{TrackResult, TrackerError};
use crate::fix::{Coordinate, LocationFix};
use crate::fix_filter::{FilterDecision, FixFilter};
use crate::metrics::{build_summary, MetricsSnapshot, RunSummary, SummaryContext};
use crate::sink::RunSink;
use crate::track::TrackAccumulator;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No run in progress
    Idle,
    /// Clock running, fixes accumulated
    Tracking,
    /// Clock frozen, fixes ignored
    Paused,
    /// Run finished; needs an explicit reset
    Stopped,
}

/// What happened to a delivered fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Session not tracking; nothing recorded
    Ignored,
    Accepted { index: usize, distance_delta_m: f64 },
    Rejected(FilterDecision),
}

/// Push notifications for subscribers that prefer a channel over polling
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    PointAccepted {
        index: usize,
        coordinate: Coordinate,
        total_distance_m: f64,
    },
    Ticked {
        elapsed_ms: u64,
    },
    Finished {
        session_id: String,
        distance_m: f64,
        duration_ms: u64,
    },
}

/// Everything guarded by the transition lock
#[derive(Debug)]
struct SessionCore {
    state: SessionState,
    clock: DurationClock,
    session_id: Option<String>,
    start_time: Option<DateTime<Utc>>,
    rejected_fixes: u64,
    out_of_order_fixes: u64,
}

impl SessionCore {
    fn new(tick_ms: u64) -> Self {
        Self {
            state: SessionState::Idle,
            clock: DurationClock::new(tick_ms),
            session_id: None,
            start_time: None,
            rejected_fixes: 0,
            out_of_order_fixes: 0,
        }
    }

    fn clear(&mut self) {
        self.clock.clear();
        self.session_id = None;
        self.start_time = None;
        self.rejected_fixes = 0;
        self.out_of_order_fixes = 0;
    }
}

/// One run-tracking lifecycle.
///
/// Shared as `Arc<RunSession>` between the fix producer, the clock ticker and readers.
/// Transitions and fix ingestion serialize on one mutex; the track is appended while that
/// mutex is held, so `stop` sees either the whole append or none of it. Route and
/// distance reads only take the track's read lock.
pub struct RunSession {
    config: TrackerConfig,
    filter: FixFilter,
    core: Mutex<SessionCore>,
    track: TrackAccumulator,
    sink: Option<Arc<dyn RunSink>>,
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl RunSession {
    /// Create new session in Idle state. Rejects a config that fails validation.
    pub fn new(config: TrackerConfig) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: TrackerConfig) -> Self {
        RunSession {
            filter: FixFilter::new(config.filter),
            core: Mutex::new(SessionCore::new(config.tick_interval_ms)),
            track: TrackAccumulator::new(),
            sink: None,
            subscribers: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Hand every finished run to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn RunSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn lock_core(&self) -> TrackResult<MutexGuard<'_, SessionCore>> {
        self.core.lock().map_err(|_| TrackerError::lock("session"))
    }

    fn invalid(from: SessionState, action: &'static str) -> TrackerError {
        TrackerError::InvalidTransition { from, action }
    }

    /// Idle → Tracking
    pub fn start(&self) -> TrackResult<()> {
        let mut core = self.lock_core()?;
        if core.state != SessionState::Idle {
            return Err(Self::invalid(core.state, "start"));
        }

        self.track.reset()?;
        let now = Utc::now();
        core.clear();
        core.clock.restart();
        core.session_id = Some(format!("run_{}", now.timestamp_millis()));
        core.start_time = Some(now);
        core.state = SessionState::Tracking;
        log::info!("Run started ({})", core.session_id.as_deref().unwrap_or("?"));

        self.emit(SessionEvent::StateChanged {
            from: SessionState::Idle,
            to: SessionState::Tracking,
        });
        Ok(())
    }

    /// Tracking → Paused
    pub fn pause(&self) -> TrackResult<()> {
        let mut core = self.lock_core()?;
        if core.state != SessionState::Tracking {
            return Err(Self::invalid(core.state, "pause"));
        }
        core.clock.freeze();
        core.state = SessionState::Paused;
        log::info!("Run paused at {} ms", core.clock.elapsed_ms());

        self.emit(SessionEvent::StateChanged {
            from: SessionState::Tracking,
            to: SessionState::Paused,
        });
        Ok(())
    }

    /// Paused → Tracking, clock continues from where it froze
    pub fn resume(&self) -> TrackResult<()> {
        let mut core = self.lock_core()?;
        if core.state != SessionState::Paused {
            return Err(Self::invalid(core.state, "resume"));
        }
        core.clock.unfreeze();
        core.state = SessionState::Tracking;
        log::info!("Run resumed at {} ms", core.clock.elapsed_ms());

        self.emit(SessionEvent::StateChanged {
            from: SessionState::Paused,
            to: SessionState::Tracking,
        });
        Ok(())
    }

    /// Tracking|Paused → Stopped. Builds the run summary, hands a copy to the sink and
    /// returns it.
    ///
    /// A failing sink is logged and does not fail the stop.
    pub fn stop(&self) -> TrackResult<RunSummary> {
        let summary = {
            let mut core = self.lock_core()?;
            let from = core.state;
            match from {
                SessionState::Tracking | SessionState::Paused => {}
                SessionState::Idle | SessionState::Stopped => {
                    return Err(Self::invalid(from, "stop"));
                }
            }

            // Read before mutating so a failure leaves the session untouched
            let (route, distance_m) = self.track.snapshot()?;
            let end_time = Utc::now();

            core.clock.freeze();
            core.state = SessionState::Stopped;

            let ctx = SummaryContext {
                session_id: core.session_id.clone().unwrap_or_default(),
                start_time: core.start_time.unwrap_or(end_time),
                end_time,
                duration_ms: core.clock.elapsed_ms(),
                rejected_fixes: core.rejected_fixes,
                out_of_order_fixes: core.out_of_order_fixes,
            };
            let summary = build_summary(route, distance_m, ctx, &self.config.metrics);

            // Published under the core lock so no later tick or point overtakes them
            self.emit(SessionEvent::StateChanged {
                from,
                to: SessionState::Stopped,
            });
            self.emit(SessionEvent::Finished {
                session_id: summary.session_id.clone(),
                distance_m: summary.distance_m,
                duration_ms: summary.duration_ms,
            });
            summary
        };

        log::info!(
            "Run {} stopped: {:.1} m in {} ms, {} points",
            summary.session_id,
            summary.distance_m,
            summary.duration_ms,
            summary.route.len()
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.persist(summary.clone()) {
                log::error!("Failed to persist run {}: {}", summary.session_id, e);
            }
        }

        Ok(summary)
    }

    /// Stopped → Idle; clears the track and metrics. Resetting an idle session is a no-op.
    pub fn reset(&self) -> TrackResult<()> {
        let mut core = self.lock_core()?;
        let from = core.state;
        match from {
            SessionState::Stopped | SessionState::Idle => {}
            SessionState::Tracking | SessionState::Paused => {
                return Err(Self::invalid(from, "reset"));
            }
        }
        self.track.reset()?;
        core.clear();
        core.state = SessionState::Idle;

        if from != SessionState::Idle {
            log::info!("Session reset");
            self.emit(SessionEvent::StateChanged {
                from,
                to: SessionState::Idle,
            });
        }
        Ok(())
    }

    /// Feed one fix from the location source.
    ///
    /// Outside Tracking the fix is dropped without error. Filter rejections are normal
    /// outcomes, not errors; only a malformed fix is.
    pub fn on_fix_received(&self, fix: LocationFix) -> TrackResult<FixOutcome> {
        let mut core = self.lock_core()?;
        if core.state != SessionState::Tracking {
            log::trace!("Ignoring fix while {:?}", core.state);
            return Ok(FixOutcome::Ignored);
        }

        fix.validate()?;

        let last = self.track.last_point()?.map(|p| p.fix);
        let decision = self.filter.evaluate(&fix, last.as_ref());
        if !decision.is_accept() {
            core.rejected_fixes += 1;
            log::debug!("Fix rejected: {:?}", decision);
            return Ok(FixOutcome::Rejected(decision));
        }

        if let Some(last) = last {
            if fix.timestamp_ms < last.timestamp_ms {
                core.out_of_order_fixes += 1;
                log::warn!(
                    "Fix at {} ms older than last accepted at {} ms, kept in delivery order",
                    fix.timestamp_ms,
                    last.timestamp_ms
                );
            }
        }

        let appended = self.track.append(fix)?;
        self.emit(SessionEvent::PointAccepted {
            index: appended.index,
            coordinate: fix.coordinate(),
            total_distance_m: appended.total_distance_m,
        });
        drop(core);

        log::debug!(
            "Fix #{} accepted, +{:.1} m (total {:.1} m)",
            appended.index,
            appended.distance_delta_m,
            appended.total_distance_m
        );

        Ok(FixOutcome::Accepted {
            index: appended.index,
            distance_delta_m: appended.distance_delta_m,
        })
    }

    /// Advance the duration clock by one tick if tracking; returns elapsed ms
    pub fn tick(&self) -> TrackResult<u64> {
        let mut core = self.lock_core()?;
        let before = core.clock.elapsed_ms();
        let elapsed_ms = core.clock.tick();
        if elapsed_ms != before {
            self.emit(SessionEvent::Ticked { elapsed_ms });
        }
        Ok(elapsed_ms)
    }

    pub fn state(&self) -> TrackResult<SessionState> {
        Ok(self.lock_core()?.state)
    }

    pub fn is_tracking(&self) -> TrackResult<bool> {
        Ok(self.state()? == SessionState::Tracking)
    }

    pub fn elapsed_ms(&self) -> TrackResult<u64> {
        Ok(self.lock_core()?.clock.elapsed_ms())
    }

    pub fn session_id(&self) -> TrackResult<Option<String>> {
        Ok(self.lock_core()?.session_id.clone())
    }

    /// Recompute live metrics from the track and the clock
    pub fn current_metrics(&self) -> TrackResult<MetricsSnapshot> {
        let core = self.lock_core()?;
        let stats = self.track.stats()?;
        Ok(MetricsSnapshot::compute(
            core.state,
            stats.distance_m,
            core.clock.elapsed_ms(),
            stats.point_count,
            stats.heading_deg,
            &self.config.metrics,
        ))
    }

    pub fn current_distance(&self) -> TrackResult<f64> {
        self.track.current_distance()
    }

    pub fn route_snapshot(&self) -> TrackResult<Vec<Coordinate>> {
        self.track.route_snapshot()
    }

    pub fn route_since(&self, start_index: usize) -> TrackResult<Vec<Coordinate>> {
        self.track.route_since(start_index)
    }

    /// Subscribe to session events. Slow subscribers lose events once their buffer
    /// fills; dropped receivers are pruned on the next send.
    pub fn subscribe(&self) -> TrackResult<Receiver<SessionEvent>> {
        let (tx, rx) = channel::bounded(self.config.event_capacity);
        self.subscribers
            .lock()
            .map_err(|_| TrackerError::lock("subscribers"))?
            .push(tx);
        Ok(rx)
    }

    /// Callers hold the core lock, so subscribers see events in transition order.
    /// Lock order is core, then subscribers.
    fn emit(&self, event: SessionEvent) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl Default for RunSession {
    fn default() -> Self {
        Self::with_config(TrackerConfig::default())
    }
}
