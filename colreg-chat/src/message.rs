// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Conversation data model.
//
// These are the types every other module works with: the stream
// classifier produces citations and visual payloads, the transcript
// reducer folds them into messages, and renderers read messages from
// transcript snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity and role
// ---------------------------------------------------------------------------

/// Opaque message identifier, assigned once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh identifier prefixed with the role (e.g. `user_3f2a...`).
    pub fn generate(role: Role) -> Self {
        Self(format!("{}_{}", role.as_str(), Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a message. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// ---------------------------------------------------------------------------
// Citations
// ---------------------------------------------------------------------------

/// A rule or annex reference attached to an assistant answer.
///
/// Only `id` is required on the wire; the remaining fields default to
/// empty so that partial citation records still merge by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Unique key, e.g. `"rule_14"`.
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Locator: the part of the regulations (e.g. "B").
    #[serde(default)]
    pub part: String,
    /// Locator: the section within the part, when there is one.
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub summary: String,
    /// Full rule body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Citation {
    /// A citation carrying only its id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            part: String::new(),
            section: None,
            summary: String::new(),
            content: String::new(),
            keywords: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Visual payloads
// ---------------------------------------------------------------------------

/// The kind tag of an embedded visual.
///
/// Known kinds map to renderer components. Unknown kinds are kept
/// verbatim: only the payload's shape is checked, never its meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VisualKind {
    VesselLights,
    LightArcs,
    DayShapes,
    SoundSignal,
    MorseSignal,
    Other(String),
}

impl VisualKind {
    pub fn as_str(&self) -> &str {
        match self {
            VisualKind::VesselLights => "vessel-lights",
            VisualKind::LightArcs => "light-arcs",
            VisualKind::DayShapes => "day-shapes",
            VisualKind::SoundSignal => "sound-signal",
            VisualKind::MorseSignal => "morse-signal",
            VisualKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for VisualKind {
    fn from(tag: &str) -> Self {
        match tag {
            "vessel-lights" => VisualKind::VesselLights,
            "light-arcs" => VisualKind::LightArcs,
            "day-shapes" => VisualKind::DayShapes,
            "sound-signal" => VisualKind::SoundSignal,
            "morse-signal" => VisualKind::MorseSignal,
            other => VisualKind::Other(other.to_string()),
        }
    }
}

impl From<String> for VisualKind {
    fn from(tag: String) -> Self {
        VisualKind::from(tag.as_str())
    }
}

impl From<VisualKind> for String {
    fn from(kind: VisualKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for VisualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured visual embedded in an assistant answer.
///
/// Rendering is a pure function of this value; the client never
/// interprets `data` beyond requiring it to be a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualPayload {
    #[serde(rename = "type")]
    pub kind: VisualKind,
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

/// One ordered block of a message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// A run of text. Consecutive text deltas coalesce into one run.
    Text { content: String },
    /// A visual always starts a new block boundary.
    Visual { visual: VisualPayload },
}

impl ContentItem {
    pub fn text(content: impl Into<String>) -> Self {
        ContentItem::Text {
            content: content.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { content } => Some(content),
            ContentItem::Visual { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Voice attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Pending,
    Done,
    Failed,
}

/// A locally recorded audio clip attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAttachment {
    /// Local reference to the clip (file path or recorder handle).
    pub clip: String,
    pub mime_type: String,
    pub status: TranscriptionStatus,
    /// Transcribed text, or the failure placeholder.
    pub text: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Streaming lifecycle of an assistant message.
///
/// User messages are created `Closed`; they are never extended by the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    Empty,
    Accumulating,
    Closed,
}

/// One turn in the conversation.
///
/// Invariant: concatenating the text runs of `content_items` in order
/// yields `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub content_items: Vec<ContentItem>,
    pub matched_rules: Vec<Citation>,
    pub suggested_questions: Vec<String>,
    pub voice_attachment: Option<VoiceAttachment>,
    pub state: MessageState,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A complete user message with typed text.
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut message = Self::blank(Role::User, MessageState::Closed);
        if !text.is_empty() {
            message.content_items.push(ContentItem::text(text.clone()));
        }
        message.text = text;
        message
    }

    /// A user message whose text will come from transcribing `clip`.
    pub fn user_voice(clip: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let mut message = Self::blank(Role::User, MessageState::Closed);
        message.voice_attachment = Some(VoiceAttachment {
            clip: clip.into(),
            mime_type: mime_type.into(),
            status: TranscriptionStatus::Pending,
            text: None,
        });
        message
    }

    /// An empty assistant message, ready to be opened for streaming.
    pub fn assistant() -> Self {
        Self::blank(Role::Assistant, MessageState::Empty)
    }

    fn blank(role: Role, state: MessageState) -> Self {
        Self {
            id: MessageId::generate(role),
            role,
            text: String::new(),
            content_items: Vec::new(),
            matched_rules: Vec::new(),
            suggested_questions: Vec::new(),
            voice_attachment: None,
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == MessageState::Closed
    }

    /// Iterate over the visual payloads in body order.
    pub fn visuals(&self) -> impl Iterator<Item = &VisualPayload> {
        self.content_items.iter().filter_map(|item| match item {
            ContentItem::Visual { visual } => Some(visual),
            ContentItem::Text { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_message_is_closed_with_one_text_run() {
        let msg = Message::user("Who gives way?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text, "Who gives way?");
        assert_eq!(msg.content_items, vec![ContentItem::text("Who gives way?")]);
        assert!(msg.is_closed());
    }

    #[test]
    fn assistant_message_starts_empty() {
        let msg = Message::assistant();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.state, MessageState::Empty);
        assert!(msg.text.is_empty());
        assert!(msg.content_items.is_empty());
    }

    #[test]
    fn voice_message_starts_pending_without_text() {
        let msg = Message::user_voice("clip-1.webm", "audio/webm");
        let attachment = msg.voice_attachment.expect("attachment");
        assert_eq!(attachment.status, TranscriptionStatus::Pending);
        assert!(attachment.text.is_none());
        assert!(msg.text.is_empty());
    }

    #[test]
    fn generated_ids_are_unique_and_role_prefixed() {
        let a = MessageId::generate(Role::User);
        let b = MessageId::generate(Role::User);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("user_"));
        assert!(MessageId::generate(Role::Assistant)
            .as_str()
            .starts_with("assistant_"));
    }

    #[test]
    fn citation_deserializes_with_only_id() {
        let citation: Citation = serde_json::from_value(json!({"id": "rule_14"})).unwrap();
        assert_eq!(citation, Citation::new("rule_14"));
    }

    #[test]
    fn citation_deserializes_full_record() {
        let citation: Citation = serde_json::from_value(json!({
            "id": "rule_14",
            "title": "Head-on situation",
            "part": "B",
            "section": "II",
            "summary": "Both vessels alter course to starboard.",
            "content": "(a) When two power-driven vessels...",
            "keywords": ["head-on", "starboard"]
        }))
        .unwrap();
        assert_eq!(citation.section.as_deref(), Some("II"));
        assert_eq!(citation.keywords, vec!["head-on", "starboard"]);
    }

    #[test]
    fn known_visual_kinds_parse_and_unknown_kinds_are_kept() {
        assert_eq!(VisualKind::from("day-shapes"), VisualKind::DayShapes);
        assert_eq!(
            VisualKind::from("tide-table"),
            VisualKind::Other("tide-table".to_string())
        );
        assert_eq!(VisualKind::from("tide-table").as_str(), "tide-table");
    }

    #[test]
    fn visual_payload_round_trips_type_tag() {
        let payload: VisualPayload = serde_json::from_value(json!({
            "type": "vessel-lights",
            "data": {"config": "sailing"},
            "caption": "Sailing vessel"
        }))
        .unwrap();
        assert_eq!(payload.kind, VisualKind::VesselLights);
        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["type"], "vessel-lights");
        assert_eq!(back["data"]["config"], "sailing");
    }

    #[test]
    fn content_items_serialize_with_type_tag() {
        let value = serde_json::to_value(ContentItem::text("Hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "content": "Hi"}));
    }
}
