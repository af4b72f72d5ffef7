// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Client config
//
// Loads colreg.yaml, resolves `${VAR}` interpolation, fills defaults and
// validates endpoints. Every section is optional; a missing optional
// file yields the built-in defaults.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::{DEFAULT_TRANSCRIPTION_FAILED, DEFAULT_TRANSPORT_ERROR};
pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::load_config;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{ApiConfig, Config, TranscriptionConfig, UserMessages};
