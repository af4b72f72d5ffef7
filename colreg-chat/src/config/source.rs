// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use super::error::ConfigError;

/// Where config YAML comes from.
///
/// `Ok(None)` means there is no config at all and built-in defaults apply.
pub trait ConfigSource {
    fn load(&self) -> Result<Option<String>, ConfigError>;

    /// Human-readable origin for log lines and error messages.
    fn describe(&self) -> String;
}

/// Reads config from disk.
///
/// With `required: false` a missing file is not an error, so the client
/// runs against a local backend without any config.
pub struct FileSource {
    pub path: PathBuf,
    pub required: bool,
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.required => Ok(None),
            Err(source) => Err(ConfigError::Io {
                origin: self.describe(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Config content held in memory. Used by tests and embedders.
pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        Ok(Some(self.content.clone()))
    }

    fn describe(&self) -> String {
        "<inline>".to_string()
    }
}
