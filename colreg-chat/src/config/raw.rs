// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// Kept separate from the public Config structs so that variable
// interpolation and validation happen between parsing and building.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub colreg: String,
    pub api: Option<RawApiConfig>,
    pub transcription: Option<RawTranscriptionConfig>,
    pub messages: Option<RawMessages>,
}

#[derive(Debug, Deserialize)]
pub struct RawApiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawTranscriptionConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessages {
    pub transport_error: Option<String>,
    pub transcription_failed: Option<String>,
}
