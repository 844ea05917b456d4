use std::sync::{Arc, Mutex, PoisonError};

use crate::bridge::AcquisitionBridge;
use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Start(String),
    Marker(String),
    Stop,
}

/// In-process bridge that keeps every call. Clones share one call list, so
/// a handle stays readable after the original is boxed into a [`crate::Bridge`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBridge {
    calls: Arc<Mutex<Vec<BridgeCall>>>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Marker payloads only, in arrival order.
    pub fn markers(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BridgeCall::Marker(json) => Some(json),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: BridgeCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl AcquisitionBridge for MemoryBridge {
    fn name(&self) -> &str {
        "memory"
    }

    fn start_streams(&mut self, subject_id: &str) -> Result<(), BridgeError> {
        self.push(BridgeCall::Start(subject_id.to_string()));
        Ok(())
    }

    fn send_marker(&mut self, marker_json: &str) -> Result<(), BridgeError> {
        self.push(BridgeCall::Marker(marker_json.to_string()));
        Ok(())
    }

    fn stop_streams(&mut self) -> Result<(), BridgeError> {
        self.push(BridgeCall::Stop);
        Ok(())
    }
}
