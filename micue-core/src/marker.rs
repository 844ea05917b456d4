use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cue::CuePhase;
use crate::error::MarkerError;

/// Wire label for "no active phase".
pub const NONE_LABEL: &str = "None";

/// "`stop` has just ended; `start` has just begun."
///
/// `None` on either side is the session boundary: the first marker of a
/// session has no `stop`, the last has no `start`.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerEvent {
    #[serde(with = "endpoint")]
    pub stop: Option<CuePhase>,
    #[serde(with = "endpoint")]
    pub start: Option<CuePhase>,
}

impl MarkerEvent {
    pub fn new(stop: Option<CuePhase>, start: Option<CuePhase>) -> Self {
        Self { stop, start }
    }

    /// `{None, BLINK}`, always the first marker of a session.
    pub fn session_start() -> Self {
        Self::new(None, Some(CuePhase::Blink))
    }

    pub fn between(stop: CuePhase, start: CuePhase) -> Self {
        Self::new(Some(stop), Some(start))
    }

    pub fn session_end(last: CuePhase) -> Self {
        Self::new(Some(last), None)
    }

    pub fn is_session_start(&self) -> bool {
        self.stop.is_none()
    }

    pub fn is_session_end(&self) -> bool {
        self.start.is_none()
    }

    /// Compact JSON object, `{"stop":"…","start":"…"}`.
    pub fn to_wire(&self) -> Result<String, MarkerError> {
        serde_json::to_string(self).map_err(MarkerError::Encode)
    }

    pub fn from_wire(json: &str) -> Result<Self, MarkerError> {
        serde_json::from_str(json).map_err(MarkerError::Decode)
    }
}

impl fmt::Display for MarkerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} -> {}}}",
            endpoint_label(self.stop),
            endpoint_label(self.start)
        )
    }
}

pub fn endpoint_label(endpoint: Option<CuePhase>) -> &'static str {
    endpoint.map_or(NONE_LABEL, |p| p.as_str())
}

pub fn parse_endpoint(raw: &str) -> Result<Option<CuePhase>, MarkerError> {
    if raw == NONE_LABEL {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

mod endpoint {
    use super::{endpoint_label, parse_endpoint};
    use crate::cue::CuePhase;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(value: &Option<CuePhase>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(endpoint_label(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<CuePhase>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_endpoint(&raw).map_err(D::Error::custom)
    }
}

/// Receives markers in the order transitions are decided.
///
/// Implementations must not block: `emit` runs inside a scheduling tick.
pub trait MarkerSink {
    fn emit(&mut self, event: &MarkerEvent);
}

impl MarkerSink for Vec<MarkerEvent> {
    fn emit(&mut self, event: &MarkerEvent) {
        self.push(*event);
    }
}

impl<S: MarkerSink + ?Sized> MarkerSink for &mut S {
    fn emit(&mut self, event: &MarkerEvent) {
        (**self).emit(event);
    }
}
