//! Step event types and parsing
//!
//! Defines the two event kinds emitted by the swap execution engine. Events
//! arrive as JSON objects tagged by `event`:
//!
//! ```json
//! {"event": "steps_list", "steps": [{"type": "SWAP_START"}]}
//! {"event": "step_complete", "step": {"type": "SOURCE_SWAP_HASH", "tx_hash": "0x.."}}
//! ```

use crate::error::{ProgressError, ProgressResult};
use crate::steps::StepDescriptor;

use serde::{Deserialize, Serialize};

/// Events consumed from the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Current believed full phase plan
    StepsList { steps: Vec<StepDescriptor> },

    /// One phase finished
    StepComplete { step: StepDescriptor },
}

impl ProgressEvent {
    /// Get event name for metrics
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::StepsList { .. } => "steps_list",
            ProgressEvent::StepComplete { .. } => "step_complete",
        }
    }

    /// Number of step descriptors carried
    pub fn step_count(&self) -> usize {
        match self {
            ProgressEvent::StepsList { steps } => steps.len(),
            ProgressEvent::StepComplete { .. } => 1,
        }
    }
}

/// Parser for newline-delimited JSON step events
#[derive(Debug, Clone, Copy, Default)]
pub struct EventParser;

impl EventParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single JSON line into an event
    pub fn parse_line(&self, line: &str) -> ProgressResult<ProgressEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProgressError::EventParsing("empty event".to_string()));
        }

        serde_json::from_str(line).map_err(|e| ProgressError::EventParsing(e.to_string()))
    }

    /// Parse an already-decoded JSON value
    pub fn parse_value(&self, value: serde_json::Value) -> ProgressResult<ProgressEvent> {
        serde_json::from_value(value).map_err(|e| ProgressError::EventParsing(e.to_string()))
    }
}
