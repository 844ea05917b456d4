use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarkerError;

/// One stage of a trial as the subject sees it.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CuePhase {
    Blink,
    Left,
    Right,
    Rest,
}

/// Tasks a round may draw from.
pub const TASK_POOL: [CuePhase; 3] = [CuePhase::Left, CuePhase::Right, CuePhase::Rest];

impl CuePhase {
    pub const ALL: [CuePhase; 4] = [
        CuePhase::Blink,
        CuePhase::Left,
        CuePhase::Right,
        CuePhase::Rest,
    ];

    /// Everything except the inter-trial blink interval is a task.
    pub fn is_task(&self) -> bool {
        !matches!(self, CuePhase::Blink)
    }

    /// Wire label, matched literally by the analysis side.
    pub fn as_str(&self) -> &'static str {
        match self {
            CuePhase::Blink => "BLINK",
            CuePhase::Left => "LEFT",
            CuePhase::Right => "RIGHT",
            CuePhase::Rest => "REST",
        }
    }

    /// Text shown to the subject under the cue.
    pub fn instruction(&self) -> &'static str {
        match self {
            CuePhase::Blink => "Blink now",
            CuePhase::Left => "Imagine moving your LEFT hand",
            CuePhase::Right => "Imagine moving your RIGHT hand",
            CuePhase::Rest => "Rest",
        }
    }
}

impl fmt::Display for CuePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CuePhase {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CuePhase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MarkerError::UnknownPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_holds_only_tasks() {
        assert!(TASK_POOL.iter().all(CuePhase::is_task));
        assert!(!CuePhase::Blink.is_task());
    }

    #[test]
    fn labels_parse_back() {
        for phase in CuePhase::ALL {
            assert_eq!(phase.as_str().parse::<CuePhase>().unwrap(), phase);
        }
        assert!("blink".parse::<CuePhase>().is_err());
        assert!("None".parse::<CuePhase>().is_err());
    }

    #[test]
    fn serde_uses_wire_labels() {
        let json = serde_json::to_string(&CuePhase::Right).unwrap();
        assert_eq!(json, "\"RIGHT\"");
    }
}
