// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Speech-to-text boundary
//
// The session treats transcription as an opaque async function from
// recorded audio to text. `WhisperTranscriber` implements it against an
// OpenAI-compatible `/audio/transcriptions` endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::config::TranscriptionConfig;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("transcription service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transcription response was not understood: {0}")]
    Malformed(String),

    #[error("transcription produced no text")]
    Empty,
}

/// Converts recorded audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String, TranscriptionError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct WhisperTranscriber {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(client: reqwest::Client, config: &TranscriptionConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String, TranscriptionError> {
        let size = audio.len();
        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name_for(mime_type))
            .mime_str(mime_type)
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(bytes = size, mime_type, "sending audio for transcription");
        let response = request
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;
        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(TranscriptionError::Empty);
        }
        Ok(text)
    }
}

/// Upload file name; the service sniffs the container from the extension.
fn file_name_for(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/webm" => "audio.webm",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "audio.mp4",
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/ogg" => "audio.ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "audio.wav",
        _ => "audio.bin",
    }
}

/// Best-effort MIME type from a file extension, for audio read from disk.
pub fn mime_type_for_path(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("webm") => "audio/webm",
        Some("mp4") | Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}
