use std::fs::File;
use std::io::BufReader;
use std::iter;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use micue_bridge::{Bridge, LogEntry, read_marker_log};
use micue_core::{ChainSummary, MarkerEvent, verify_chain};
use micue_session::{SessionConfig, SimulationReport, run_headless};
use micue_timing::{HighPrecisionTimer, ManualTimer, Timer};
use tracing::{info, warn};

use crate::cli::{SessionArgs, SimulateArgs, VerifyArgs};
use crate::logging;

pub fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let config = match path {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    info!(
        rounds = config.max_rounds,
        blink_ms = config.blink_duration_ms,
        task_ms = config.task_duration_ms,
        seeded = config.seed.is_some(),
        "session config loaded"
    );
    Ok(config)
}

pub fn detect_bridge(args: &SessionArgs) -> Bridge {
    Bridge::detect(args.record_dir.as_deref(), args.trial)
}

/// Runs a headless session, prints one line per marker, and checks the chain.
pub fn simulate(args: &SimulateArgs) -> Result<SimulationReport> {
    let mut config = load_config(args.session.config.as_deref())?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let expected_rounds = config.max_rounds;
    let rng = config.rng();
    let bridge = detect_bridge(&args.session);
    let frame = Duration::from_millis(args.frame_ms);

    let report = if args.realtime {
        let mut timer = HighPrecisionTimer::new();
        let report = run_headless(&args.subject, config, bridge, rng, &mut timer, frame);
        logging::log_frame_stats("tick", &timer.frame_stats(), timer.frame_count());
        report
    } else {
        let mut timer = ManualTimer::new();
        run_headless(&args.subject, config, bridge, rng, &mut timer, frame)
    };

    println!("{:>8}  {}", report.started_at_ms, MarkerEvent::session_start().to_wire()?);
    for transition in &report.transitions {
        println!("{:>8}  {}", transition.at_ms, transition.marker.to_wire()?);
    }

    let markers: Vec<MarkerEvent> = iter::once(MarkerEvent::session_start())
        .chain(report.transitions.iter().map(|t| t.marker))
        .collect();
    let chain = verify_chain(&markers).context("simulated session produced a broken marker chain")?;
    chain.check_rounds(expected_rounds)?;
    Ok(report)
}

/// Reads a recorder file back and validates its marker chain.
pub fn verify(args: &VerifyArgs) -> Result<ChainSummary> {
    let path = &args.file;
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let records = read_marker_log(BufReader::new(file)).with_context(|| format!("reading {}", path.display()))?;

    if !matches!(records.first().map(|r| &r.entry), Some(LogEntry::Start { .. })) {
        warn!(file = %path.display(), "recording does not begin with a stream start");
    }
    if !matches!(records.last().map(|r| &r.entry), Some(LogEntry::Stop)) {
        warn!(file = %path.display(), "recording was not stopped cleanly");
    }

    let markers: Vec<MarkerEvent> = records
        .iter()
        .filter_map(|record| match record.entry {
            LogEntry::Marker { marker } => Some(marker),
            _ => None,
        })
        .collect();

    let summary = verify_chain(&markers).with_context(|| format!("{} is not a valid session", path.display()))?;
    if let Some(rounds) = args.rounds {
        summary.check_rounds(rounds)?;
    }
    info!(
        file = %path.display(),
        markers = summary.markers,
        rounds = summary.rounds,
        left = summary.tasks.left,
        right = summary.tasks.right,
        rest = summary.tasks.rest,
        "marker chain verified"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn simulate_args(record_dir: Option<&Path>, seed: u64) -> SimulateArgs {
        SimulateArgs {
            subject: "T1".into(),
            seed: Some(seed),
            realtime: false,
            frame_ms: 16,
            session: SessionArgs {
                config: None,
                record_dir: record_dir.map(Path::to_path_buf),
                trial: 2,
            },
        }
    }

    #[test]
    fn simulate_records_a_file_that_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let report = simulate(&simulate_args(Some(dir.path()), 4)).unwrap();
        assert_eq!(report.summary.rounds, 5);
        assert!(report.summary.bridge_connected);

        let summary = verify(&VerifyArgs {
            file: dir.path().join("Markers_T1_Trial0002.jsonl"),
            rounds: Some(5),
        })
        .unwrap();
        assert_eq!(summary.markers, 11);
        assert_eq!(summary.tasks, report.summary.tasks);
        assert_eq!(report.started_at_ms, 0);
    }

    #[test]
    fn rerun_keeps_the_earlier_recording() {
        let dir = tempfile::tempdir().unwrap();
        simulate(&simulate_args(Some(dir.path()), 4)).unwrap();
        let first = dir.path().join("Markers_T1_Trial0002.jsonl");
        let before = fs::read_to_string(&first).unwrap();

        simulate(&simulate_args(Some(dir.path()), 5)).unwrap();
        assert_eq!(fs::read_to_string(&first).unwrap(), before);
        for file in [first, dir.path().join("Markers_T1_Trial0002-2.jsonl")] {
            let summary = verify(&VerifyArgs { file, rounds: Some(5) }).unwrap();
            assert_eq!(summary.markers, 11);
        }
    }

    #[test]
    fn simulate_is_reproducible_for_a_seed() {
        let a = simulate(&simulate_args(None, 21)).unwrap();
        let b = simulate(&simulate_args(None, 21)).unwrap();
        assert_eq!(a.transitions, b.transitions);
    }

    #[test]
    fn verify_rejects_round_mismatch_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        simulate(&simulate_args(Some(dir.path()), 1)).unwrap();
        let file = dir.path().join("Markers_T1_Trial0002.jsonl");
        assert!(
            verify(&VerifyArgs {
                file: file.clone(),
                rounds: Some(4),
            })
            .is_err()
        );

        let garbage = dir.path().join("garbage.jsonl");
        fs::write(&garbage, "not json\n").unwrap();
        assert!(verify(&VerifyArgs { file: garbage, rounds: None }).is_err());
    }

    #[test]
    fn config_file_drives_the_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("micue.json");
        fs::write(&config, r#"{"max_rounds": 2, "blink_duration_ms": 100, "task_duration_ms": 200}"#).unwrap();
        let mut args = simulate_args(None, 3);
        args.session.config = Some(config);
        let report = simulate(&args).unwrap();
        assert_eq!(report.summary.rounds, 2);
        assert_eq!(report.summary.markers, 5);
        // 16ms ticks land each phase change on the first frame past its dwell
        assert_eq!(report.summary.duration_ms, 112 + 208 + 112 + 208);
    }
}
