// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Frames, decoded payloads, classified events and the protocol error a
// producer can report in-band.

use crate::message::{Citation, VisualPayload};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Raw frame
// ---------------------------------------------------------------------------

/// One delimited unit of the wire protocol, split into its event label and
/// payload. Lives only between decoding and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// The `event:` label, or `"message"` when the frame carries none.
    pub event: String,
    /// All `data:` lines joined with `\n`. `None` for keep-alive frames.
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A frame payload after the structured-decode attempt.
///
/// Anything that is not a JSON object stays `Raw` and is later read as
/// plain text; older producers stream bare prose on `data:` lines.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(serde_json::Map<String, serde_json::Value>),
    Raw(String),
}

impl Payload {
    pub fn decode(data: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(data) {
            Ok(serde_json::Value::Object(record)) => Payload::Structured(record),
            _ => Payload::Raw(data.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

/// Side-channel metadata for the current answer.
///
/// Every field is optional: absent means "leave unchanged", not "clear".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetadataUpdate {
    /// Full citation snapshot; replaces the current list.
    #[serde(default)]
    pub matched_rules: Option<Vec<Citation>>,
    /// Citation delta; appended with dedup by id. Takes precedence over
    /// `matched_rules` when both are present.
    #[serde(default)]
    pub additional_rules: Option<Vec<Citation>>,
    /// Follow-up prompts; replaces the current list wholesale.
    #[serde(default)]
    pub suggested_questions: Option<Vec<String>>,
}

/// A classified unit of meaning, consumed once by the transcript reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    Visual(VisualPayload),
    Metadata(MetadataUpdate),
    /// A failure to surface inline on the open message.
    Error(String),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The producer reported a failure inside the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream reported an error: {message}")]
pub struct StreamProtocolError {
    pub message: String,
}

impl StreamProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
