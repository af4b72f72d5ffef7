// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use std::time::Duration;

use super::{ChatRequest, ChatTransport, ChunkStream, TransportError};
use crate::config::ApiConfig;

/// Streams chat answers from the backend's `POST /chat` endpoint.
pub struct HttpChatTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpChatTransport {
    pub fn new(client: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            client,
            endpoint: config.chat_url(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        // Only the wait for response headers is bounded; the body streams
        // for as long as the answer takes.
        let resp = tokio::time::timeout(self.timeout, req.send())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "chat backend rejected request"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let stream = resp
            .bytes_stream()
            .map_err(|e| TransportError::Read(e.to_string()));
        Ok(Box::pin(stream))
    }
}
