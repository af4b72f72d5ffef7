// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Transcript reducer
//
// Folds classified stream events into the open assistant message.
// Preconditions are checked before anything is touched, so an event is
// either applied completely or not at all.

use std::collections::HashSet;

use super::Transcript;
use crate::message::{Citation, ContentItem, Message, MessageId, MessageState, Role};
use crate::stream::{MetadataUpdate, StreamEvent};

/// Prefix of the inline note appended when a stream fails.
pub const ERROR_NOTE_MARKER: &str = "⚠️ ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("message {id} is not open for streaming")]
    NotOpen { id: MessageId },

    #[error("message {id} is open but not the last message")]
    NotLast { id: MessageId },

    #[error("message {id} is not an assistant message")]
    NotAssistant { id: MessageId },

    #[error("message {id} is still open; close it before appending")]
    AlreadyOpen { id: MessageId },

    #[error("message {id} must have role {expected:?}")]
    UnexpectedRole { id: MessageId, expected: Role },

    #[error("no message with id {id}")]
    UnknownMessage { id: MessageId },

    #[error("message {id} has no voice attachment")]
    NoVoiceAttachment { id: MessageId },
}

// ---------------------------------------------------------------------------
// Reducer entry points
// ---------------------------------------------------------------------------

/// Apply one event to the open message `target`.
///
/// `target` must be the transcript's open message, must be last and
/// must be an assistant message.
pub fn apply(
    transcript: &mut Transcript,
    target: &MessageId,
    event: StreamEvent,
) -> Result<(), AssembleError> {
    let message = open_target(transcript, target)?;
    merge(message, event);
    Ok(())
}

/// Pure form of [`apply`]: returns the next transcript and leaves the
/// input untouched.
pub fn reduce(
    transcript: &Transcript,
    target: &MessageId,
    event: StreamEvent,
) -> Result<Transcript, AssembleError> {
    let mut next = transcript.clone();
    apply(&mut next, target, event)?;
    Ok(next)
}

/// Close the open message. No event can change it afterwards.
pub fn close(transcript: &mut Transcript, target: &MessageId) -> Result<(), AssembleError> {
    let message = open_target(transcript, target)?;
    message.state = MessageState::Closed;
    transcript.open = None;
    Ok(())
}

fn open_target<'a>(
    transcript: &'a mut Transcript,
    target: &MessageId,
) -> Result<&'a mut Message, AssembleError> {
    if transcript.open.as_ref() != Some(target) {
        return Err(AssembleError::NotOpen { id: target.clone() });
    }
    let message = match transcript.messages.last_mut() {
        Some(last) if &last.id == target => last,
        _ => return Err(AssembleError::NotLast { id: target.clone() }),
    };
    if message.role != Role::Assistant {
        return Err(AssembleError::NotAssistant { id: target.clone() });
    }
    if message.state == MessageState::Closed {
        return Err(AssembleError::NotOpen { id: target.clone() });
    }
    Ok(message)
}

// ---------------------------------------------------------------------------
// Merge rules
// ---------------------------------------------------------------------------

fn merge(message: &mut Message, event: StreamEvent) {
    match event {
        StreamEvent::Text(delta) => push_text(message, &delta),
        StreamEvent::Visual(visual) => message.content_items.push(ContentItem::Visual { visual }),
        StreamEvent::Metadata(update) => merge_metadata(message, update),
        StreamEvent::Error(description) => {
            let note = if message.text.is_empty() {
                format!("{ERROR_NOTE_MARKER}{description}")
            } else {
                format!("\n\n{ERROR_NOTE_MARKER}{description}")
            };
            push_text(message, &note);
        }
    }
    message.state = MessageState::Accumulating;
}

/// Extend the trailing text run, or start one after a visual.
fn push_text(message: &mut Message, delta: &str) {
    if delta.is_empty() {
        return;
    }
    message.text.push_str(delta);
    match message.content_items.last_mut() {
        Some(ContentItem::Text { content }) => content.push_str(delta),
        _ => message.content_items.push(ContentItem::text(delta)),
    }
}

fn merge_metadata(message: &mut Message, update: MetadataUpdate) {
    // A delta list wins over a snapshot carried in the same record.
    if let Some(additional) = update.additional_rules {
        append_unique(&mut message.matched_rules, additional);
    } else if let Some(snapshot) = update.matched_rules {
        let mut rules = Vec::with_capacity(snapshot.len());
        append_unique(&mut rules, snapshot);
        message.matched_rules = rules;
    }

    if let Some(questions) = update.suggested_questions {
        message.suggested_questions = questions;
    }
}

/// Append citations whose id is not yet present, keeping first-seen order.
fn append_unique(rules: &mut Vec<Citation>, incoming: Vec<Citation>) {
    let mut seen: HashSet<String> = rules.iter().map(|r| r.id.clone()).collect();
    for citation in incoming {
        if seen.insert(citation.id.clone()) {
            rules.push(citation);
        }
    }
}
