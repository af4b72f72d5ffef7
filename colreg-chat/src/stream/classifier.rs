// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Event classifier
//
// Turns one decoded frame into a typed stream event. A frame is a small
// multi-line record:
//
//   event: <type>\n
//   data: <payload>\n
//
// The payload is decoded once into `Payload::{Structured, Raw}` and then
// dispatched on the event type. Raw payloads are prose from older
// producers and become text events.

use super::types::{MetadataUpdate, Payload, RawFrame, StreamEvent, StreamProtocolError};
use crate::message::VisualPayload;
use serde_json::{Map, Value};

/// Event type assumed when a frame carries no `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

const EVENT_PREFIX: &str = "event: ";
const DATA_PREFIX: &str = "data: ";

/// Raw payload prefix used by producers that cannot emit JSON errors.
const LEGACY_ERROR_PREFIX: &str = "[ERROR]:";
/// Raw end-of-stream marker; carries no content.
const DONE_SENTINEL: &str = "[DONE]";

type Outcome = Result<Option<StreamEvent>, StreamProtocolError>;
type StructuredHandler = fn(&str, Map<String, Value>) -> Outcome;

// ---------------------------------------------------------------------------
// Frame parsing
// ---------------------------------------------------------------------------

/// Split a frame into its event label and joined payload.
///
/// Unrecognized lines (including `:` comments) are ignored.
pub fn parse_frame(frame: &str) -> RawFrame {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(label) = line.strip_prefix(EVENT_PREFIX) {
            let label = label.trim();
            if !label.is_empty() {
                event = Some(label.to_string());
            }
        } else if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(data);
        }
    }

    RawFrame {
        event: event.unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
        data: if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        },
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify one frame string.
///
/// Returns `Ok(None)` for protocol no-ops such as keep-alives, and
/// `Err` when the producer reported an error in-band.
pub fn classify_frame(frame: &str) -> Outcome {
    classify(&parse_frame(frame))
}

/// Classify an already-parsed frame.
pub fn classify(frame: &RawFrame) -> Outcome {
    let Some(data) = frame.data.as_deref() else {
        return Ok(None);
    };

    match Payload::decode(data) {
        Payload::Structured(record) => handler_for(&frame.event)(&frame.event, record),
        Payload::Raw(text) => classify_raw(&frame.event, text),
    }
}

fn handler_for(event_type: &str) -> StructuredHandler {
    match event_type {
        "metadata" => classify_metadata,
        "visual" => classify_visual,
        "error" => classify_error,
        _ => classify_message,
    }
}

/// Generic records: text delta, inline visual, or in-band error.
fn classify_message(event_type: &str, record: Map<String, Value>) -> Outcome {
    if let Some(Value::String(text)) = record.get("text") {
        return Ok(Some(StreamEvent::Text(text.clone())));
    }
    if let Some(visual) = visual_from_record(&record) {
        return Ok(Some(StreamEvent::Visual(visual)));
    }
    if let Some(message) = error_message(&record) {
        return Err(StreamProtocolError::new(message));
    }
    tracing::debug!(event = event_type, "record carries no known field, skipped");
    Ok(None)
}

fn classify_metadata(event_type: &str, record: Map<String, Value>) -> Outcome {
    match serde_json::from_value::<MetadataUpdate>(Value::Object(record)) {
        Ok(update) => Ok(Some(StreamEvent::Metadata(update))),
        Err(e) => {
            tracing::warn!(event = event_type, error = %e, "malformed metadata record dropped");
            Ok(None)
        }
    }
}

fn classify_visual(event_type: &str, record: Map<String, Value>) -> Outcome {
    match visual_from_record(&record) {
        Some(visual) => Ok(Some(StreamEvent::Visual(visual))),
        // Not visual-shaped after all: read it like any other record.
        None => classify_message(event_type, record),
    }
}

fn classify_error(_event_type: &str, record: Map<String, Value>) -> Outcome {
    let message = error_message(&record)
        .or_else(|| record.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| Value::Object(record).to_string());
    Err(StreamProtocolError::new(message))
}

fn classify_raw(event_type: &str, text: String) -> Outcome {
    if event_type == "error" {
        return Err(StreamProtocolError::new(text.trim()));
    }
    if text.trim() == DONE_SENTINEL {
        return Ok(None);
    }
    if let Some(rest) = text.strip_prefix(LEGACY_ERROR_PREFIX) {
        return Err(StreamProtocolError::new(rest.trim()));
    }
    Ok(Some(StreamEvent::Text(text)))
}

// ---------------------------------------------------------------------------
// Field probes
// ---------------------------------------------------------------------------

/// A visual needs a string kind tag and a data map. The map's contents
/// are not inspected.
fn visual_from_record(record: &Map<String, Value>) -> Option<VisualPayload> {
    let kind = record.get("type")?.as_str()?;
    let data = record.get("data")?.as_object()?;
    let caption = record
        .get("caption")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(VisualPayload {
        kind: kind.into(),
        data: data.clone(),
        caption,
    })
}

fn error_message(record: &Map<String, Value>) -> Option<String> {
    match record.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
