use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use run_tracker::{
    FixOutcome, GpxTrack, JsonFileSink, LocationFix, RunSession, RunSummary, TrackerConfig,
};

/// Replay a recorded fix log through a run session and print the resulting summary
#[derive(Parser, Debug)]
#[command(name = "run-replay")]
struct Args {
    /// JSON array of fixes: [{"latitude", "longitude", "accuracy_m", "timestamp_ms"}, ...]
    #[arg(long)]
    fixes: PathBuf,

    /// Engine configuration (JSON, partial documents allowed)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the accepted route as GPX
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// Persist the run summary into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct ReplayStats {
    accepted: u64,
    rejected: u64,
    invalid: u64,
}

fn load_fixes(path: &Path) -> Result<Vec<LocationFix>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let fixes: Vec<LocationFix> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(fixes)
}

/// Feed fixes in order, synthesizing the clock ticks that would have fired between them
fn replay(session: &RunSession, fixes: &[LocationFix]) -> Result<(RunSummary, ReplayStats)> {
    let tick_ms = i64::try_from(session.config().tick_interval_ms)
        .context("tick_interval_ms does not fit a millisecond timestamp")?;
    let mut stats = ReplayStats::default();

    session.start()?;

    let origin = fixes.first().map(|f| f.timestamp_ms).unwrap_or(0);
    let mut ticks_done: i64 = 0;

    for fix in fixes {
        let ticks_due = fix.timestamp_ms.saturating_sub(origin).max(0) / tick_ms;
        while ticks_done < ticks_due {
            session.tick()?;
            ticks_done += 1;
        }

        match session.on_fix_received(*fix) {
            Ok(FixOutcome::Accepted { .. }) => stats.accepted += 1,
            Ok(FixOutcome::Rejected(_)) => stats.rejected += 1,
            Ok(FixOutcome::Ignored) => {}
            Err(e) if e.is_caller_error() => {
                log::warn!("Skipping fix at {} ms: {}", fix.timestamp_ms, e);
                stats.invalid += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let summary = session.stop()?;
    Ok((summary, stats))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)?,
        None => TrackerConfig::default(),
    };

    let fixes = load_fixes(&args.fixes)?;
    if fixes.is_empty() {
        bail!("{} contains no fixes", args.fixes.display());
    }
    log::info!("Replaying {} fixes from {}", fixes.len(), args.fixes.display());

    let mut session = RunSession::new(config)?;
    if let Some(dir) = &args.out_dir {
        session = session.with_sink(Arc::new(JsonFileSink::new(dir)?));
    }

    let (summary, stats) = replay(&session, &fixes)?;
    log::info!(
        "Accepted {} / rejected {} / invalid {}",
        stats.accepted,
        stats.rejected,
        stats.invalid
    );
    log::info!(
        "{} in {} ({} /km)",
        summary.formatted_distance(),
        summary.formatted_duration(),
        summary.formatted_pace()
    );

    if let Some(path) = &args.gpx {
        GpxTrack::from_summary(&summary)
            .write_to(path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("GPX written to {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_synthesizes_ticks() {
        let session = RunSession::default();
        let fixes: Vec<LocationFix> = (0..5)
            .map(|i| LocationFix::new(10.76 + i as f64 * 0.0002, 106.66, 8.0, i * 4000))
            .collect();

        let (summary, stats) = replay(&session, &fixes).unwrap();
        assert_eq!(stats.accepted, 5);
        assert_eq!(summary.duration_ms, 16_000);
        assert_eq!(summary.route.len(), 5);
    }

    #[test]
    fn test_replay_skips_invalid_fixes() {
        let session = RunSession::default();
        let fixes = vec![
            LocationFix::new(10.76, 106.66, 8.0, 0),
            LocationFix::new(f64::NAN, 106.66, 8.0, 1000),
            LocationFix::new(10.7601, 106.66, 80.0, 2000),
            LocationFix::new(10.7605, 106.66, 8.0, 3000),
        ];

        let (summary, stats) = replay(&session, &fixes).unwrap();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(summary.rejected_fixes, 1);
    }

    #[test]
    fn test_replay_survives_extreme_timestamps() {
        let session = RunSession::default();
        let fixes = vec![
            LocationFix::new(10.76, 106.66, 8.0, i64::MAX),
            LocationFix::new(10.7605, 106.66, 8.0, i64::MIN),
            LocationFix::new(10.7610, 106.66, 8.0, i64::MAX),
        ];

        let (summary, stats) = replay(&session, &fixes).unwrap();
        assert_eq!(stats.accepted, 3);
        assert_eq!(summary.duration_ms, 0);
        assert_eq!(summary.out_of_order_fixes, 1);
    }

    #[test]
    fn test_replay_rejects_oversized_tick_interval() {
        let config = TrackerConfig {
            tick_interval_ms: u64::MAX,
            ..TrackerConfig::default()
        };
        let session = RunSession::new(config).unwrap();
        let fixes = vec![LocationFix::new(10.76, 106.66, 8.0, 0)];
        assert!(replay(&session, &fixes).is_err());
    }
}
