//! Error types for the remapper

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::device::DeviceInfo;

/// Errors that stop the remapper
#[derive(Error, Debug)]
pub enum RemapError {
    #[error("No matching input device found ({} device(s) available)", available.len())]
    DeviceNotFound { available: Vec<DeviceInfo> },

    #[error("Permission denied opening {}: run as root or add the user to the 'input' group", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read input events: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to wait for input: {0}")]
    Wait(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RemapError {
    /// Classify an open error, singling out missing privileges
    pub fn from_open(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            RemapError::PermissionDenied { path }
        } else {
            RemapError::Open { path, source }
        }
    }
}

/// Errors loading or validating the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Button code {code} is bound to both {first} and {second}")]
    ConflictingBinding {
        code: u16,
        first: &'static str,
        second: &'static str,
    },

    #[error("Unknown button name: \"{0}\"")]
    UnknownButton(String),

    #[error("poll_timeout_ms must be between {min} and {max}, got {value}")]
    InvalidPollTimeout { value: u64, min: u64, max: u64 },
}
