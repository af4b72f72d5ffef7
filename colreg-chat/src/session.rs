// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Chat session
//
// Drives one conversation: appends the user turn and an empty answer,
// reads the backend stream through the frame decoder and classifier,
// and folds each event into the transcript in arrival order. Every turn
// ends with the answer closed and the streaming flag cleared, whether it
// completed, failed or was cancelled.
//
// The session is the only writer of the transcript. Readers subscribe to
// a watch channel and see a consistent snapshot after every event.

use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::UserMessages;
use crate::message::{Message, MessageId};
use crate::stream::{classify_frame, FrameDecoder, StreamEvent};
use crate::transcript::{self, AssembleError, Transcript, VoiceResolution};
use crate::transport::{CancellationToken, ChatRequest, ChatTransport, TransportError};
use crate::voice::Transcriber;

// ---------------------------------------------------------------------------
// Outcomes and errors
// ---------------------------------------------------------------------------

/// How a turn ended. The answer is closed in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ended normally.
    Completed,
    /// The caller cancelled; partial content was kept.
    Cancelled,
    /// The backend reported an error in-band.
    ProtocolError(String),
    /// The request or the stream failed at the transport level.
    TransportFailed(String),
    /// A voice message could not be transcribed; no request was sent.
    TranscriptionFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a reply is still streaming; wait for it to finish or cancel it")]
    Busy,

    #[error("message is empty")]
    EmptyMessage,

    #[error("voice input is not configured")]
    NoTranscriber,

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

// ---------------------------------------------------------------------------
// Streaming flag
// ---------------------------------------------------------------------------

/// Holds the session's streaming flag for the duration of one turn and
/// clears it on every exit path, including early returns and panics.
struct StreamingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> StreamingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for StreamingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Open answer
// ---------------------------------------------------------------------------

/// Closes the turn's answer if the turn future is dropped before it
/// finishes (timeout, aborted task, losing `select!` branch, panic).
/// Without it the transcript would keep an open message and reject every
/// later turn.
struct OpenAnswer<'a> {
    transcript: &'a watch::Sender<Transcript>,
    id: MessageId,
    armed: bool,
}

impl<'a> OpenAnswer<'a> {
    fn new(transcript: &'a watch::Sender<Transcript>, id: MessageId) -> Self {
        Self {
            transcript,
            id,
            armed: true,
        }
    }

    /// The turn closed the answer itself.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OpenAnswer<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = &self.id;
        let closed = self
            .transcript
            .send_if_modified(|t| transcript::close(t, id).is_ok());
        if closed {
            tracing::warn!(message_id = %self.id, "turn dropped mid-stream, answer closed");
        }
    }
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

pub struct ChatSession {
    session_id: String,
    transport: Arc<dyn ChatTransport>,
    transcriber: Option<Arc<dyn Transcriber>>,
    messages: UserMessages,
    transcript: watch::Sender<Transcript>,
    streaming: AtomicBool,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, messages: UserMessages) -> Self {
        let (transcript, _) = watch::channel(Transcript::new());
        Self {
            session_id: format!("session_{}", Uuid::new_v4().simple()),
            transport,
            transcriber: None,
            messages,
            transcript,
            streaming: AtomicBool::new(false),
        }
    }

    /// Enable voice input.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True while a turn is in flight; input should be disabled.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Subscribe to transcript snapshots, published after every change.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.transcript.subscribe()
    }

    /// A copy of the current transcript.
    pub fn snapshot(&self) -> Transcript {
        self.transcript.borrow().clone()
    }

    /// Send a typed message and stream the answer into the transcript.
    pub async fn send(
        &self,
        text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let _streaming = StreamingGuard::acquire(&self.streaming)?;

        let user_id = self.update(|t| t.push_user(Message::user(text.clone())))?;
        tracing::info!(session_id = %self.session_id, message_id = %user_id, "user turn sent");
        self.run_turn(text, cancel).await
    }

    /// Transcribe a recorded clip, then send the result like typed text.
    ///
    /// A failed transcription marks the voice message failed and ends the
    /// turn without contacting the chat backend.
    pub async fn send_voice(
        &self,
        clip: impl Into<String>,
        audio: Bytes,
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        let transcriber = self
            .transcriber
            .clone()
            .ok_or(SessionError::NoTranscriber)?;
        let _streaming = StreamingGuard::acquire(&self.streaming)?;

        let user_id = self.update(|t| t.push_user(Message::user_voice(clip, mime_type)))?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = transcriber.transcribe(audio, mime_type) => Some(result),
        };

        let failure = match result {
            Some(Ok(text)) => {
                self.update(|t| {
                    t.resolve_voice(&user_id, VoiceResolution::Transcribed(text.clone()))
                })?;
                tracing::info!(session_id = %self.session_id, message_id = %user_id, "voice turn transcribed");
                return self.run_turn(text, cancel).await;
            }
            Some(Err(e)) => {
                tracing::warn!(session_id = %self.session_id, message_id = %user_id, error = %e, "transcription failed");
                TurnOutcome::TranscriptionFailed(e.to_string())
            }
            None => TurnOutcome::Cancelled,
        };

        let placeholder = self.messages.transcription_failed.clone();
        self.update(|t| t.resolve_voice(&user_id, VoiceResolution::Failed { placeholder }))?;
        Ok(failure)
    }

    // -----------------------------------------------------------------------
    // Turn driver
    // -----------------------------------------------------------------------

    async fn run_turn(
        &self,
        text: String,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        let answer_id = self.update(|t| t.open_assistant(Message::assistant()))?;
        let mut open = OpenAnswer::new(&self.transcript, answer_id.clone());

        let driven = self.drive(&answer_id, text, cancel).await;
        let closed = self.update(|t| transcript::close(t, &answer_id));
        open.disarm();
        let outcome = driven.and_then(|outcome| closed.map(|()| outcome)).map_err(|e| {
            tracing::error!(session_id = %self.session_id, message_id = %answer_id, error = %e, "transcript rejected an update");
            e
        })?;

        match &outcome {
            TurnOutcome::Completed => {
                tracing::info!(session_id = %self.session_id, message_id = %answer_id, "answer completed")
            }
            TurnOutcome::Cancelled => {
                tracing::warn!(session_id = %self.session_id, message_id = %answer_id, "answer cancelled, partial content kept")
            }
            other => {
                tracing::warn!(session_id = %self.session_id, message_id = %answer_id, outcome = ?other, "answer ended with an error")
            }
        }
        Ok(outcome)
    }

    async fn drive(
        &self,
        target: &MessageId,
        message: String,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AssembleError> {
        if cancel.is_cancelled() {
            return Ok(TurnOutcome::Cancelled);
        }

        let request = ChatRequest {
            message,
            session_id: self.session_id.clone(),
        };
        let mut chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnOutcome::Cancelled),
            opened = self.transport.open(request) => match opened {
                Ok(chunks) => chunks,
                Err(e) => return self.fail_transport(target, e),
            },
        };

        let mut decoder = FrameDecoder::new();
        loop {
            if cancel.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(TurnOutcome::Cancelled),
                next = chunks.next() => next,
            };
            let frames = match next {
                Some(Ok(bytes)) => {
                    let frames = decoder.feed_bytes(&bytes);
                    tracing::debug!(
                        message_id = %target,
                        bytes = bytes.len(),
                        frames = frames.len(),
                        buffered = decoder.buffered_len(),
                        "chunk decoded"
                    );
                    frames
                }
                Some(Err(e)) => return self.fail_transport(target, e),
                None => break,
            };
            if let Some(outcome) = self.apply_frames(target, frames, cancel)? {
                return Ok(outcome);
            }
        }

        let trailing: Vec<String> = decoder.flush().into_iter().collect();
        Ok(self
            .apply_frames(target, trailing, cancel)?
            .unwrap_or(TurnOutcome::Completed))
    }

    /// Classify and apply frames in order. Returns an outcome when the
    /// turn must stop early.
    fn apply_frames(
        &self,
        target: &MessageId,
        frames: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<TurnOutcome>, AssembleError> {
        for frame in frames {
            match classify_frame(&frame) {
                Ok(Some(event)) => self.apply_event(target, event)?,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, message_id = %target, error = %e, "protocol error in stream");
                    self.apply_event(target, StreamEvent::Error(e.message.clone()))?;
                    return Ok(Some(TurnOutcome::ProtocolError(e.message)));
                }
            }
            if cancel.is_cancelled() {
                return Ok(Some(TurnOutcome::Cancelled));
            }
        }
        Ok(None)
    }

    fn fail_transport(
        &self,
        target: &MessageId,
        error: TransportError,
    ) -> Result<TurnOutcome, AssembleError> {
        tracing::error!(session_id = %self.session_id, message_id = %target, error = %error, "chat transport failed");
        let note = self.messages.transport_error.clone();
        self.apply_event(target, StreamEvent::Error(note))?;
        Ok(TurnOutcome::TransportFailed(error.to_string()))
    }

    fn apply_event(&self, target: &MessageId, event: StreamEvent) -> Result<(), AssembleError> {
        self.update(|t| transcript::apply(t, target, event))
    }

    /// Run one transcript mutation and notify subscribers if it succeeded.
    fn update<T>(
        &self,
        mutate: impl FnOnce(&mut Transcript) -> Result<T, AssembleError>,
    ) -> Result<T, AssembleError> {
        let mut result = None;
        self.transcript.send_if_modified(|t| {
            let outcome = mutate(t);
            let changed = outcome.is_ok();
            result = Some(outcome);
            changed
        });
        result.unwrap_or_else(|| unreachable!("send_if_modified always runs its closure"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageState, Role, TranscriptionStatus};
    use crate::transport::ChunkStream;
    use crate::voice::TranscriptionError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Replays a fixed list of chunks and records every request.
    struct ScriptedTransport {
        chunks: Vec<Result<&'static str, TransportError>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(chunks: Vec<Result<&'static str, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                chunks,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn open(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
            self.requests.lock().unwrap().push(request);
            let items: Vec<Result<Bytes, TransportError>> = self
                .chunks
                .iter()
                .cloned()
                .map(|c| c.map(|s| Bytes::from_static(s.as_bytes())))
                .collect();
            Ok(Box::pin(tokio_stream::iter(items)))
        }
    }

    /// Fails before any body arrives.
    struct RejectingTransport(TransportError);

    #[async_trait]
    impl ChatTransport for RejectingTransport {
        async fn open(&self, _request: ChatRequest) -> Result<ChunkStream, TransportError> {
            Err(self.0.clone())
        }
    }

    /// Body chunks are pushed by the test through a channel.
    struct ChannelTransport {
        rx: Mutex<Option<mpsc::Receiver<Result<Bytes, TransportError>>>>,
    }

    impl ChannelTransport {
        fn new() -> (Arc<Self>, mpsc::Sender<Result<Bytes, TransportError>>) {
            let (tx, rx) = mpsc::channel(16);
            (
                Arc::new(Self {
                    rx: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl ChatTransport for ChannelTransport {
        async fn open(&self, _request: ChatRequest) -> Result<ChunkStream, TransportError> {
            let rx = self.rx.lock().unwrap().take().expect("opened once");
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }

    /// The first request never yields a chunk; later requests answer.
    struct StallsOnceTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatTransport for StallsOnceTransport {
        async fn open(&self, _request: ChatRequest) -> Result<ChunkStream, TransportError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(Box::pin(futures_util::stream::pending::<
                    Result<Bytes, TransportError>,
                >()));
            }
            let chunks: Vec<Result<Bytes, TransportError>> =
                vec![Ok(Bytes::from_static(b"data: second answer\n\n"))];
            Ok(Box::pin(tokio_stream::iter(chunks)))
        }
    }

    struct FixedTranscriber(Result<&'static str, ()>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(
            &self,
            _audio: Bytes,
            _mime_type: &str,
        ) -> Result<String, TranscriptionError> {
            self.0
                .map(str::to_string)
                .map_err(|_| TranscriptionError::Status {
                    status: 500,
                    body: "boom".to_string(),
                })
        }
    }

    fn session(transport: Arc<dyn ChatTransport>) -> ChatSession {
        ChatSession::new(transport, UserMessages::default())
    }

    fn answer(session: &ChatSession) -> Message {
        session.snapshot().last().cloned().expect("answer")
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn streams_answer_with_metadata_into_transcript() {
        let transport = ScriptedTransport::new(vec![
            Ok("data: {\"text\":\"The \"}\n\ndata: {\"te"),
            Ok("xt\":\"vessel must yield.\"}\n"),
            Ok("\nevent: metadata\ndata: {\"matched_rules\":[{\"id\":\"rule_14\"}],"),
            Ok("\"suggested_questions\":[\"What is Rule 15?\"]}\n\n"),
        ]);
        let session = session(transport.clone());

        let outcome = session.send("Who gives way?", &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert!(!session.is_streaming());

        let transcript = session.snapshot();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[0].role, Role::User);
        assert_eq!(transcript.messages()[0].text, "Who gives way?");

        let answer = answer(&session);
        assert_eq!(answer.text, "The vessel must yield.");
        assert_eq!(answer.content_items.len(), 1);
        assert_eq!(answer.matched_rules[0].id, "rule_14");
        assert_eq!(answer.suggested_questions, vec!["What is Rule 15?"]);
        assert_eq!(answer.state, MessageState::Closed);
        assert!(transcript.open_message_id().is_none());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "Who gives way?");
        assert_eq!(requests[0].session_id, session.session_id());
    }

    #[tokio::test]
    async fn trailing_frame_without_delimiter_is_applied() {
        let transport = ScriptedTransport::new(vec![Ok("data: plain prose tail")]);
        let session = session(transport);
        session.send("q", &CancellationToken::new()).await.unwrap();
        assert_eq!(answer(&session).text, "plain prose tail");
    }

    #[tokio::test]
    async fn session_id_is_stable_across_turns() {
        let transport = ScriptedTransport::new(vec![Ok("data: ok\n\n")]);
        let session = session(transport.clone());
        let cancel = CancellationToken::new();
        session.send("first", &cancel).await.unwrap();
        session.send("second", &cancel).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].session_id, requests[1].session_id);
        assert!(requests[0].session_id.starts_with("session_"));
        assert_eq!(session.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_touching_transcript() {
        let session = session(ScriptedTransport::new(vec![]));
        let err = session.send("   ", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyMessage));
        assert!(session.snapshot().is_empty());
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn protocol_error_keeps_partial_answer() {
        let transport = ScriptedTransport::new(vec![
            Ok("data: {\"text\":\"partial answer\"}\n\n"),
            Ok("data: {\"error\":\"model overloaded\"}\n\n"),
            Ok("data: {\"text\":\"never applied\"}\n\n"),
        ]);
        let session = session(transport);

        let outcome = session.send("q", &CancellationToken::new()).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::ProtocolError("model overloaded".to_string())
        );
        let answer = answer(&session);
        assert!(answer.text.starts_with("partial answer"));
        assert!(answer.text.contains("model overloaded"));
        assert!(!answer.text.contains("never applied"));
        assert!(answer.is_closed());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn rejected_request_shows_fixed_error_note() {
        let session = session(Arc::new(RejectingTransport(TransportError::Status {
            status: 502,
        })));

        let outcome = session.send("q", &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::TransportFailed(msg) if msg.contains("502")));
        let answer = answer(&session);
        assert!(answer.text.contains(crate::config::DEFAULT_TRANSPORT_ERROR));
        assert!(answer.is_closed());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn stream_interruption_keeps_partial_answer() {
        let transport = ScriptedTransport::new(vec![
            Ok("data: Keep a proper\n\n"),
            Err(TransportError::Read("connection reset".to_string())),
        ]);
        let session = session(transport);

        let outcome = session.send("q", &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::TransportFailed(_)));
        let answer = answer(&session);
        assert!(answer.text.starts_with("Keep a proper"));
        assert!(answer.text.ends_with(crate::config::DEFAULT_TRANSPORT_ERROR));
    }

    // -----------------------------------------------------------------------
    // Concurrency and cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn second_send_while_streaming_is_busy() {
        let (transport, tx) = ChannelTransport::new();
        let session = Arc::new(session(transport));
        let cancel = CancellationToken::new();

        let running = {
            let session = session.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { session.send("first", &cancel).await })
        };
        let mut updates = session.subscribe();
        updates
            .wait_for(|t| t.open_message_id().is_some())
            .await
            .unwrap();

        assert!(session.is_streaming());
        let err = session.send("second", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        tx.send(Ok(Bytes::from_static(b"data: done\n\n"))).await.unwrap();
        drop(tx);
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(session.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_closes_answer_with_partial_content() {
        let (transport, tx) = ChannelTransport::new();
        let session = Arc::new(session(transport));
        let cancel = CancellationToken::new();

        let running = {
            let session = session.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { session.send("q", &cancel).await })
        };

        let mut updates = session.subscribe();
        tx.send(Ok(Bytes::from_static(b"data: {\"text\":\"Sound one\"}\n\n")))
            .await
            .unwrap();
        updates
            .wait_for(|t| t.last().is_some_and(|m| m.text == "Sound one"))
            .await
            .unwrap();

        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("turn should stop")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled);

        // Chunks sent after cancellation are never applied.
        let _ = tx.send(Ok(Bytes::from_static(b"data: late\n\n"))).await;
        let answer = answer(&session);
        assert_eq!(answer.text, "Sound one");
        assert!(answer.is_closed());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn dropped_turn_closes_answer_and_session_recovers() {
        let session = session(Arc::new(StallsOnceTransport {
            calls: AtomicUsize::new(0),
        }));
        let cancel = CancellationToken::new();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), session.send("first", &cancel)).await;
        assert!(timed_out.is_err());

        assert!(!session.is_streaming());
        let transcript = session.snapshot();
        assert!(transcript.open_message_id().is_none());
        assert!(transcript.last().unwrap().is_closed());

        let outcome = session.send("second", &cancel).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        let transcript = session.snapshot();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.last().unwrap().text, "second answer");
    }

    #[tokio::test]
    async fn cancelled_before_open_still_closes_answer() {
        let transport = ScriptedTransport::new(vec![Ok("data: x\n\n")]);
        let session = session(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = session.send("q", &cancel).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(transport.requests().is_empty());
        let answer = answer(&session);
        assert!(answer.text.is_empty());
        assert!(answer.is_closed());
    }

    // -----------------------------------------------------------------------
    // Voice
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn voice_transcription_is_sent_like_typed_text() {
        let transport = ScriptedTransport::new(vec![Ok("data: Rule 35 applies.\n\n")]);
        let session = session(transport.clone())
            .with_transcriber(Arc::new(FixedTranscriber(Ok("What signal in fog?"))));

        let outcome = session
            .send_voice("clip-1.webm", Bytes::from_static(b"\x1a\x45"), "audio/webm", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);

        let transcript = session.snapshot();
        let user = &transcript.messages()[0];
        assert_eq!(user.text, "What signal in fog?");
        let attachment = user.voice_attachment.as_ref().unwrap();
        assert_eq!(attachment.status, TranscriptionStatus::Done);
        assert_eq!(transport.requests()[0].message, "What signal in fog?");
        assert_eq!(answer(&session).text, "Rule 35 applies.");
    }

    #[tokio::test]
    async fn voice_failure_marks_message_and_skips_request() {
        let transport = ScriptedTransport::new(vec![Ok("data: unused\n\n")]);
        let session = session(transport.clone())
            .with_transcriber(Arc::new(FixedTranscriber(Err(()))));

        let outcome = session
            .send_voice("clip-2.webm", Bytes::new(), "audio/webm", &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::TranscriptionFailed(_)));

        let transcript = session.snapshot();
        assert_eq!(transcript.len(), 1);
        let user = &transcript.messages()[0];
        assert_eq!(user.text, crate::config::DEFAULT_TRANSCRIPTION_FAILED);
        assert_eq!(
            user.voice_attachment.as_ref().unwrap().status,
            TranscriptionStatus::Failed
        );
        assert!(transport.requests().is_empty());
        assert!(!session.is_streaming());

        // The session keeps working after a failed transcription.
        session.send("typed instead", &CancellationToken::new()).await.unwrap();
        assert_eq!(session.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn voice_without_transcriber_is_an_error() {
        let session = session(ScriptedTransport::new(vec![]));
        let err = session
            .send_voice("clip", Bytes::new(), "audio/webm", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoTranscriber));
        assert!(session.snapshot().is_empty());
    }
}
