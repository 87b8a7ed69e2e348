//! Typed requests and responses for driving a reader

use crate::error::NoCandidate;
use crate::types::{ExtractedText, NodeId};
use serde::{Deserialize, Serialize};

/// A command sent to the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReaderRequest {
    /// Liveness check
    Ping,
    /// Fetch the last successful extraction
    GetLastText,
    /// Select a surface, recognize it and fill the nearest field
    ReadCanvas,
    /// Forget the last successful extraction
    ClearText,
}

/// The reader's answer to a [`ReaderRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReaderResponse {
    Ready,
    LastText { text: Option<ExtractedText> },
    ReadFinished { outcome: ReadOutcome },
    Cleared,
    /// A read is already running; the request was rejected
    Busy,
}

/// How a read ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReadOutcome {
    NoCandidate { reason: NoCandidate },
    NoTextDetected,
    /// Text was written into the field at `field`
    Filled { text: String, field: NodeId },
    /// Text was extracted but there was no field to put it in
    Extracted { text: String },
    EngineUnavailable { message: String },
    RecognitionFailed { message: String },
}

impl ReadOutcome {
    /// Extracted text, if the read produced any
    pub fn text(&self) -> Option<&str> {
        match self {
            ReadOutcome::Filled { text, .. } | ReadOutcome::Extracted { text } => Some(text),
            _ => None,
        }
    }
}
