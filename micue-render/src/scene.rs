use std::f32::consts::TAU;

use micue_core::{CuePhase, SessionStage};

/// One breath in and out of the relaxation circle.
pub const BREATH_PERIOD_MS: u64 = 8000;

/// Everything the renderer needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scene<'a> {
    Welcome {
        subject: &'a str,
        error: Option<&'a str>,
    },
    Relaxation {
        /// 0 at rest, 1 at full inhale.
        breath: f32,
        remaining_s: u64,
    },
    Ready {
        subject: &'a str,
    },
    Cue {
        phase: CuePhase,
        /// Fraction of the current dwell, in `[0, 1]`.
        progress: f32,
        completed_rounds: u32,
        max_rounds: u32,
    },
    Closing {
        rounds: u32,
    },
}

impl Scene<'_> {
    pub fn stage(&self) -> SessionStage {
        match self {
            Scene::Welcome { .. } => SessionStage::Welcome,
            Scene::Relaxation { .. } => SessionStage::Relaxation,
            Scene::Ready { .. } => SessionStage::Ready,
            Scene::Cue { .. } => SessionStage::Trials,
            Scene::Closing { .. } => SessionStage::Closing,
        }
    }
}

/// Smooth 0 -> 1 -> 0 swell over [`BREATH_PERIOD_MS`].
pub fn breath_level(elapsed_ms: u64) -> f32 {
    let t = (elapsed_ms % BREATH_PERIOD_MS) as f32 / BREATH_PERIOD_MS as f32;
    (1.0 - (TAU * t).cos()) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breath_swells_and_returns() {
        assert!(breath_level(0) < 1e-6);
        assert!((breath_level(BREATH_PERIOD_MS / 2) - 1.0).abs() < 1e-6);
        assert!(breath_level(BREATH_PERIOD_MS) < 1e-6);
        assert!(breath_level(1000) < breath_level(3000));
    }

    #[test]
    fn scenes_map_to_stages() {
        let cue = Scene::Cue {
            phase: CuePhase::Left,
            progress: 0.0,
            completed_rounds: 0,
            max_rounds: 5,
        };
        assert_eq!(cue.stage(), SessionStage::Trials);
        assert_eq!(Scene::Closing { rounds: 5 }.stage(), SessionStage::Closing);
    }
}
