// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use super::defaults::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS, DEFAULT_TRANSCRIPTION_FAILED, DEFAULT_TRANSPORT_ERROR,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Parsed and validated client config.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Config format version. Always "v1".
    pub version: String,
    pub api: ApiConfig,
    /// Speech-to-text endpoint. `None` disables voice input.
    pub transcription: Option<TranscriptionConfig>,
    pub messages: UserMessages,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            api: ApiConfig::default(),
            transcription: None,
            messages: UserMessages::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Chat backend connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Backend root, without the `/chat` path.
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    /// Limit on waiting for response headers, in milliseconds.
    pub timeout_ms: u64,
}

impl ApiConfig {
    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// OpenAI-compatible transcription endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Fixed user-facing strings shown inline in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessages {
    /// Appended to the answer when the chat transport fails.
    pub transport_error: String,
    /// Shown in place of a voice message that could not be transcribed.
    pub transcription_failed: String,
}

impl Default for UserMessages {
    fn default() -> Self {
        Self {
            transport_error: DEFAULT_TRANSPORT_ERROR.to_string(),
            transcription_failed: DEFAULT_TRANSCRIPTION_FAILED.to_string(),
        }
    }
}
