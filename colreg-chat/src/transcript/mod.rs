// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Conversation transcript
//
// Ordered, append-only list of messages for one session. At most one
// message is open for streaming and it is always the last one; the open
// message is tracked by id rather than inferred from position.

mod assembler;

pub use assembler::{apply, close, reduce, AssembleError, ERROR_NOTE_MARKER};

use crate::message::{ContentItem, Message, MessageId, MessageState, Role, TranscriptionStatus};

/// How a pending voice message was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceResolution {
    /// The transcription text; displayed like typed text.
    Transcribed(String),
    /// Transcription failed; the placeholder is shown instead.
    Failed { placeholder: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
    open: Option<MessageId>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Id of the message currently being extended by the stream.
    pub fn open_message_id(&self) -> Option<&MessageId> {
        self.open.as_ref()
    }

    /// True while an answer is open but no content has arrived yet.
    pub fn is_awaiting_first_token(&self) -> bool {
        match (self.open.as_ref(), self.messages.last()) {
            (Some(open), Some(last)) => &last.id == open && last.state == MessageState::Empty,
            _ => false,
        }
    }

    /// Append a complete user message.
    pub fn push_user(&mut self, message: Message) -> Result<MessageId, AssembleError> {
        self.ensure_no_open_message()?;
        if message.role != Role::User {
            return Err(AssembleError::UnexpectedRole {
                id: message.id,
                expected: Role::User,
            });
        }
        let id = message.id.clone();
        self.messages.push(message);
        Ok(id)
    }

    /// Append an empty assistant message and open it for streaming.
    pub fn open_assistant(&mut self, message: Message) -> Result<MessageId, AssembleError> {
        self.ensure_no_open_message()?;
        if message.role != Role::Assistant {
            return Err(AssembleError::UnexpectedRole {
                id: message.id,
                expected: Role::Assistant,
            });
        }
        if message.state != MessageState::Empty {
            return Err(AssembleError::NotOpen { id: message.id });
        }
        let id = message.id.clone();
        self.messages.push(message);
        self.open = Some(id.clone());
        Ok(id)
    }

    /// Record the outcome of transcribing a voice message.
    ///
    /// A successful transcription becomes the message text. A failure
    /// shows the placeholder and marks the attachment failed; the rest
    /// of the session is unaffected.
    pub fn resolve_voice(
        &mut self,
        id: &MessageId,
        resolution: VoiceResolution,
    ) -> Result<(), AssembleError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| AssembleError::UnknownMessage { id: id.clone() })?;
        let attachment = message
            .voice_attachment
            .as_mut()
            .ok_or_else(|| AssembleError::NoVoiceAttachment { id: id.clone() })?;

        let (status, text) = match resolution {
            VoiceResolution::Transcribed(text) => (TranscriptionStatus::Done, text),
            VoiceResolution::Failed { placeholder } => (TranscriptionStatus::Failed, placeholder),
        };
        attachment.status = status;
        attachment.text = Some(text.clone());
        message.content_items = vec![ContentItem::text(text.clone())];
        message.text = text;
        Ok(())
    }

    fn ensure_no_open_message(&self) -> Result<(), AssembleError> {
        match &self.open {
            Some(id) => Err(AssembleError::AlreadyOpen { id: id.clone() }),
            None => Ok(()),
        }
    }
}
