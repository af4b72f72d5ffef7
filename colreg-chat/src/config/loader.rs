// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use super::defaults::{DEFAULT_TRANSCRIPTION_MODEL, DEFAULT_TRANSCRIPTION_URL};
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate client config from the given source.
///
/// Steps:
/// 1. Read raw YAML from the source (no content = built-in defaults)
/// 2. Parse YAML into raw deserialization types
/// 3. Validate the version
/// 4. Resolve `${VAR}` interpolation in string fields
/// 5. Fill defaults and validate URLs and limits
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let Some(raw_yaml) = source.load()? else {
        tracing::debug!(origin = %source.describe(), "no config found, using defaults");
        return Ok(Config::default());
    };

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.colreg != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.colreg
        )));
    }

    let api = build_api_config(raw.api)?;
    let transcription = raw.transcription.map(build_transcription_config).transpose()?;
    let messages = build_messages(raw.messages)?;

    Ok(Config {
        version: raw.colreg,
        api,
        transcription,
        messages,
    })
}

fn build_api_config(raw: Option<raw::RawApiConfig>) -> Result<ApiConfig, ConfigError> {
    let defaults = ApiConfig::default();
    let Some(raw) = raw else {
        return Ok(defaults);
    };

    let base_url = match raw.base_url {
        Some(url) => resolve_variables(&url)?,
        None => defaults.base_url,
    };
    validate_http_url("api.base_url", &base_url)?;

    let timeout_ms = raw.timeout_ms.unwrap_or(defaults.timeout_ms);
    if timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "api.timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(ApiConfig {
        base_url,
        api_key: resolve_secret(raw.api_key)?,
        timeout_ms,
    })
}

fn build_transcription_config(
    raw: raw::RawTranscriptionConfig,
) -> Result<TranscriptionConfig, ConfigError> {
    let url = match raw.url {
        Some(url) => resolve_variables(&url)?,
        None => DEFAULT_TRANSCRIPTION_URL.to_string(),
    };
    validate_http_url("transcription.url", &url)?;

    let model = raw
        .model
        .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "transcription.model must not be empty".to_string(),
        ));
    }

    Ok(TranscriptionConfig {
        url,
        api_key: resolve_secret(raw.api_key)?,
        model,
    })
}

fn build_messages(raw: Option<raw::RawMessages>) -> Result<UserMessages, ConfigError> {
    let defaults = UserMessages::default();
    let Some(raw) = raw else {
        return Ok(defaults);
    };
    Ok(UserMessages {
        transport_error: non_empty("messages.transport_error", raw.transport_error)?
            .unwrap_or(defaults.transport_error),
        transcription_failed: non_empty("messages.transcription_failed", raw.transcription_failed)?
            .unwrap_or(defaults.transcription_failed),
    })
}

/// Interpolate a secret; an empty result means "not configured".
fn resolve_secret(value: Option<String>) -> Result<Option<String>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let resolved = resolve_variables(&value)?;
    Ok(if resolved.trim().is_empty() {
        None
    } else {
        Some(resolved)
    })
}

fn non_empty(field: &str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Validation(format!(
            "{field} must not be empty"
        ))),
        other => Ok(other),
    }
}

fn validate_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} must be an http(s) URL, got \"{url}\""
        )))
    }
}
