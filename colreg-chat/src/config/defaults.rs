// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Built-in defaults, used for any section the config file leaves out.

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Time allowed for the chat backend to answer with response headers.
/// The body itself streams for as long as the answer takes.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

pub const DEFAULT_TRANSPORT_ERROR: &str =
    "Sorry, there was an error processing your request. Please try again.";
pub const DEFAULT_TRANSCRIPTION_FAILED: &str = "[Voice message could not be transcribed]";
