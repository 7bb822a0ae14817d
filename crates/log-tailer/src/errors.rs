// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Delivery of a batch failed on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to upload after {attempts} attempts: {status}")]
pub struct DeliveryError {
    /// Status text of the last response, or the transport error if no response arrived.
    pub status: String,
    pub attempts: u32,
}

/// The tracked file could not be opened or read from the requested offset.
#[derive(Debug, thiserror::Error)]
#[error("Failed to read {path}: {source}")]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The identity token of a path could not be resolved.
#[derive(Debug, thiserror::Error)]
#[error("Failed to resolve file identity for {path}: {source}")]
pub struct IdentityError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Failed to initialize watcher: {0}")]
    Init(String),

    #[error("Failed to watch {path}: {message}")]
    Watch { path: PathBuf, message: String },

    #[error("Watcher error: {0}")]
    Notify(String),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),

    #[error("No log file paths configured")]
    EmptyPaths,

    #[error("Log file path must be absolute: {0}")]
    RelativePath(PathBuf),

    #[error("Log file path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("Log endpoint is empty")]
    EmptyEndpoint,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error("Tail service for {0} is not running")]
    ServiceUnavailable(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_display() {
        let error = DeliveryError {
            status: "Internal Server Error".to_string(),
            attempts: 2,
        };
        assert_eq!(
            error.to_string(),
            "Failed to upload after 2 attempts: Internal Server Error"
        );
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::MissingVar("FILE_PATH").to_string(),
            "FILE_PATH environment variable is not set"
        );
        assert_eq!(
            ConfigError::RelativePath(PathBuf::from("logs/app.log")).to_string(),
            "Log file path must be absolute: logs/app.log"
        );
    }

    #[test]
    fn test_agent_error_wraps_watcher_error() {
        let error: AgentError = WatcherError::Init("inotify limit reached".to_string()).into();
        assert!(matches!(error, AgentError::Watcher(WatcherError::Init(_))));
    }
}
