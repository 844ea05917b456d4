/// Screens a recording session walks through, outside the trial loop itself.
pub trait Stage: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn accepts_text(&self) -> bool;
    fn next(&self) -> Option<Self>;

    fn is_welcome(&self) -> bool {
        false
    }
    fn is_relaxation(&self) -> bool {
        false
    }
    fn is_ready(&self) -> bool {
        false
    }
    fn is_trials(&self) -> bool {
        false
    }
    fn is_closing(&self) -> bool {
        false
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStage {
    #[default]
    Welcome,
    Relaxation,
    Ready,
    Trials,
    Closing,
}

impl Stage for SessionStage {
    fn accepts_text(&self) -> bool {
        matches!(self, Self::Welcome)
    }

    fn next(&self) -> Option<Self> {
        use SessionStage::*;
        Some(match self {
            Welcome => Relaxation,
            Relaxation => Ready,
            Ready => Trials,
            Trials => Closing,
            Closing => return None,
        })
    }

    fn is_welcome(&self) -> bool {
        matches!(self, Self::Welcome)
    }

    fn is_relaxation(&self) -> bool {
        matches!(self, Self::Relaxation)
    }

    fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    fn is_trials(&self) -> bool {
        matches!(self, Self::Trials)
    }

    fn is_closing(&self) -> bool {
        matches!(self, Self::Closing)
    }
}
