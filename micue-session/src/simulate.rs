use std::time::Duration;

use micue_bridge::Bridge;
use micue_timing::{FrameTimingStats, Timer};
use rand::Rng;
use tracing::debug;

use crate::config::SessionConfig;
use crate::scheduler::Transition;
use crate::session::{Session, SessionSummary};

#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Clock reading of the opening marker.
    pub started_at_ms: u64,
    pub summary: SessionSummary,
    pub transitions: Vec<Transition>,
    pub frames: FrameTimingStats,
}

/// Drives a session without a window, ticking once per `frame`.
///
/// With a [`micue_timing::ManualTimer`] this finishes instantly; with a
/// [`micue_timing::HighPrecisionTimer`] it paces in real time.
pub fn run_headless<T: Timer, R: Rng>(
    subject: &str,
    config: SessionConfig,
    bridge: Bridge,
    rng: R,
    timer: &mut T,
    frame: Duration,
) -> SimulationReport {
    // a zero frame would never advance a manual clock
    let frame = frame.max(Duration::from_millis(1));
    let mut session = Session::start(subject, config, bridge, rng, timer.now_ms());
    let mut transitions = Vec::new();

    while session.is_active() {
        let frame_start = timer.now();
        timer.sleep(frame);
        let spent = timer.elapsed(frame_start);
        timer.record_frame(spent);

        if let Some(transition) = session.tick(timer.now_ms()) {
            debug!(marker = %transition.marker, at_ms = transition.at_ms, "simulated transition");
            transitions.push(transition);
        }
    }

    SimulationReport {
        started_at_ms: session.started_at_ms(),
        summary: session.summary(),
        transitions,
        frames: timer.frame_stats(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micue_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn runs_to_completion_on_manual_clock() {
        let mut timer = ManualTimer::new();
        let report = run_headless(
            "sim",
            SessionConfig::default(),
            Bridge::Disconnected,
            StdRng::seed_from_u64(3),
            &mut timer,
            Duration::from_millis(16),
        );
        assert_eq!(report.transitions.len(), 10);
        assert!(report.transitions.last().unwrap().is_terminal());
        assert_eq!(report.summary.rounds, 5);
        assert_eq!(report.summary.markers, 11);
        assert_eq!(report.summary.tasks.total(), 5);
        // 16ms frames overshoot each 4000ms dwell by at most one frame
        assert!(report.summary.max_lateness_ms < 16);
        assert!(report.frames.average_frame_time_ns > 0.0);
    }

    #[test]
    fn zero_frame_still_terminates() {
        let mut timer = ManualTimer::new();
        let config = SessionConfig {
            max_rounds: 1,
            blink_duration_ms: 5,
            task_duration_ms: 5,
            ..Default::default()
        };
        let report = run_headless(
            "sim",
            config,
            Bridge::Disconnected,
            StdRng::seed_from_u64(0),
            &mut timer,
            Duration::ZERO,
        );
        assert_eq!(report.summary.markers, 3);
        assert_eq!(timer.now_ms(), 10);
    }

    #[test]
    fn report_keeps_the_opening_time() {
        let mut timer = ManualTimer::at_ms(2_500);
        let config = SessionConfig {
            max_rounds: 1,
            blink_duration_ms: 100,
            task_duration_ms: 100,
            ..Default::default()
        };
        let report = run_headless(
            "sim",
            config,
            Bridge::Disconnected,
            StdRng::seed_from_u64(5),
            &mut timer,
            Duration::from_millis(10),
        );
        assert_eq!(report.started_at_ms, 2_500);
        assert_eq!(report.transitions[0].at_ms, 2_600);
        assert_eq!(report.summary.duration_ms, 200);
    }
}
