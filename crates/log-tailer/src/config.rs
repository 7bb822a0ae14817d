// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

pub const FILE_PATH_ENV: &str = "FILE_PATH";
pub const LOG_ENDPOINT_ENV: &str = "LOG_ENDPOINT";

/// Configuration passed to [`crate::agent::Agent`]. The core never reads the
/// environment itself; [`AgentConfig::from_env`] is meant for the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Absolute paths of the files to tail, one tail service per entry.
    pub paths: Vec<PathBuf>,
    /// Base URL of the collector, without trailing slash.
    pub endpoint: String,
    pub https_proxy: Option<String>,
}

impl AgentConfig {
    pub fn new(paths: Vec<PathBuf>, endpoint: &str) -> Result<AgentConfig, ConfigError> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let mut unique: Vec<PathBuf> = Vec::with_capacity(paths.len());
        for path in paths {
            validate_path(&path)?;
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        if unique.is_empty() {
            return Err(ConfigError::EmptyPaths);
        }

        Ok(AgentConfig {
            paths: unique,
            endpoint: endpoint.to_string(),
            https_proxy: None,
        })
    }

    #[must_use]
    pub fn with_https_proxy(mut self, https_proxy: Option<String>) -> Self {
        self.https_proxy = https_proxy;
        self
    }

    pub fn from_env() -> Result<AgentConfig, ConfigError> {
        let file_paths =
            env::var(FILE_PATH_ENV).map_err(|_| ConfigError::MissingVar(FILE_PATH_ENV))?;
        let endpoint =
            env::var(LOG_ENDPOINT_ENV).map_err(|_| ConfigError::MissingVar(LOG_ENDPOINT_ENV))?;

        let https_proxy = env::var("LOG_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();

        Ok(AgentConfig::new(parse_paths(&file_paths), &endpoint)?.with_https_proxy(https_proxy))
    }
}

/// Splits a comma-separated path list, skipping blank entries.
pub fn parse_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if !path.is_absolute() {
        return Err(ConfigError::RelativePath(path.to_path_buf()));
    }
    if path.file_name().is_none() {
        return Err(ConfigError::NoFileName(path.to_path_buf()));
    }
    Ok(())
}
