// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Chat transport
//
// Responsibilities:
// - Send one request per user turn to the chat backend
// - Hand back the response body as a stream of raw byte chunks
// - Map connection failures and non-success statuses to `TransportError`
//
// `ChatTransport` is the injection point; `HttpChatTransport` is the
// reqwest implementation used by the binary.

mod cancel;
mod http;

pub use cancel::CancellationToken;
pub use http::HttpChatTransport;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;
use serde::Serialize;
use std::pin::Pin;

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

/// Outbound body for one user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    /// Generated once per session, stable across turns.
    pub session_id: String,
}

/// Response body chunks in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("chat request failed: {0}")]
    Connect(String),

    #[error("chat request timed out after {0} ms")]
    Timeout(u64),

    #[error("chat backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("chat stream interrupted: {0}")]
    Read(String),
}

// ---------------------------------------------------------------------------
// Trait: ChatTransport (dependency injection point)
// ---------------------------------------------------------------------------

/// Opens the streaming response for one turn.
///
/// Implementations must be Send + Sync so a session can be shared with
/// the task that cancels it.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: ChatRequest) -> Result<ChunkStream, TransportError>;
}
