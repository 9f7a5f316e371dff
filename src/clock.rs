use crate::session::RunSession;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Session time, advanced by fixed ticks rather than sampled from fix timestamps.
///
/// GPS dropouts do not stop it; only `freeze` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationClock {
    elapsed_ms: u64,
    tick_ms: u64,
    running: bool,
}

impl DurationClock {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            elapsed_ms: 0,
            tick_ms,
            running: false,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start from zero
    pub fn restart(&mut self) {
        self.elapsed_ms = 0;
        self.running = true;
    }

    /// Continue from the frozen value
    pub fn unfreeze(&mut self) {
        self.running = true;
    }

    pub fn freeze(&mut self) {
        self.running = false;
    }

    pub fn clear(&mut self) {
        self.elapsed_ms = 0;
        self.running = false;
    }

    /// Advance one tick if running; returns the elapsed time either way
    pub fn tick(&mut self) -> u64 {
        if self.running {
            self.elapsed_ms = self.elapsed_ms.saturating_add(self.tick_ms);
        }
        self.elapsed_ms
    }
}

/// Background task calling [`RunSession::tick`] once per tick interval.
///
/// Holds only a weak reference, so it ends on its own once the session is dropped.
/// Dropping the handle aborts the task.
pub struct ClockTicker {
    handle: JoinHandle<()>,
}

impl ClockTicker {
    /// Spawn on the current tokio runtime using the session's configured interval
    pub fn spawn(session: &Arc<RunSession>) -> Self {
        let period = Duration::from_millis(session.config().tick_interval_ms);
        let weak = Arc::downgrade(session);
        let handle = tokio::spawn(tick_loop(weak, period));
        ClockTicker { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn tick_loop(session: Weak<RunSession>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let Some(session) = session.upgrade() else {
            log::debug!("Session dropped, clock ticker exiting");
            break;
        };
        if let Err(e) = session.tick() {
            log::warn!("Clock tick failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;

    #[test]
    fn test_clock_only_advances_while_running() {
        let mut clock = DurationClock::new(1000);
        assert_eq!(clock.tick(), 0);

        clock.restart();
        clock.tick();
        clock.tick();
        assert_eq!(clock.elapsed_ms(), 2000);

        clock.freeze();
        clock.tick();
        assert_eq!(clock.elapsed_ms(), 2000);

        clock.unfreeze();
        clock.tick();
        assert_eq!(clock.elapsed_ms(), 3000);

        clock.restart();
        assert_eq!(clock.elapsed_ms(), 0);

        clock.clear();
        assert!(!clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_drives_session_clock() {
        let session = Arc::new(RunSession::new(TrackerConfig::default()).unwrap());
        session.start().unwrap();

        let ticker = ClockTicker::spawn(&session);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(session.elapsed_ms().unwrap(), 3000);

        session.pause().unwrap();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(session.elapsed_ms().unwrap(), 3000);

        ticker.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_exits_when_session_dropped() {
        let session = Arc::new(RunSession::new(TrackerConfig::default()).unwrap());
        let ticker = ClockTicker::spawn(&session);
        drop(session);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(ticker.is_finished());
    }
}
