// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of line batches to the collector.
//!
//! A batch is serialized once into newline-joined `{"log": ...}` records and
//! POSTed to `{endpoint}/{basename}`. A non-success status or a transport
//! error is retried exactly once after [`RETRY_DELAY`], with the very same
//! payload. When the retry fails too the batch is reported as a
//! [`DeliveryError`] and it is up to the caller to log it.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::constants::{MAX_DELIVERY_ATTEMPTS, PAYLOAD_CONTENT_TYPE, RETRY_DELAY};
use crate::errors::DeliveryError;

/// Lines read together, shipped in one request and resent unchanged on retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    lines: Vec<String>,
}

#[derive(Serialize)]
struct LogRecord<'a> {
    log: &'a str,
}

impl UploadBatch {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// One JSON object per line, in file order, joined by `\n` without a trailing newline.
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        let records = self
            .lines
            .iter()
            .map(|line| serde_json::to_string(&LogRecord { log: line }))
            .collect::<Result<Vec<String>, _>>()?;
        Ok(records.join("\n"))
    }
}

#[async_trait]
pub trait BatchUploader {
    /// Ships `batch`, read from `source`, with the bounded retry policy.
    async fn upload(&self, source: &Path, batch: &UploadBatch) -> Result<(), DeliveryError>;
}

/// Builds the client shared by every tail service.
///
/// An unusable proxy is logged and the client is built without it, so the
/// agent keeps shipping logs.
#[must_use]
pub fn build_client(https_proxy: Option<&str>) -> reqwest::Client {
    match try_build_client(https_proxy) {
        Ok(client) => client,
        Err(e) => {
            error!("TAIL | Unable to create HTTP client with proxy, falling back to default: {e}");
            reqwest::Client::new()
        }
    }
}

fn try_build_client(https_proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy) = https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    /// Collector base URL, without trailing slash.
    endpoint: String,
}

impl HttpUploader {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, source: &Path) -> Option<String> {
        let name = source.file_name()?.to_string_lossy();
        Some(format!("{}/{}", self.endpoint, name))
    }

    /// A single POST. The error carries the status text or the transport error.
    async fn send(&self, url: &str, payload: &str) -> Result<(), String> {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, PAYLOAD_CONTENT_TYPE)
            .body(payload.to_owned())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_text(status))
        }
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.as_str().to_string(), str::to_string)
}

#[async_trait]
impl BatchUploader for HttpUploader {
    async fn upload(&self, source: &Path, batch: &UploadBatch) -> Result<(), DeliveryError> {
        let Some(url) = self.url_for(source) else {
            return Err(DeliveryError {
                status: format!("{} has no file name", source.display()),
                attempts: 0,
            });
        };
        let payload = batch.payload().map_err(|e| DeliveryError {
            status: format!("unable to serialize payload: {e}"),
            attempts: 0,
        })?;

        let mut last_status = String::new();
        for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
            if attempt > 1 {
                sleep(RETRY_DELAY).await;
            }
            match self.send(&url, &payload).await {
                Ok(()) => {
                    debug!("TAIL | Uploaded {} log lines to {url}", batch.len());
                    return Ok(());
                }
                Err(status) => {
                    if attempt < MAX_DELIVERY_ATTEMPTS {
                        warn!("TAIL | Retrying upload to {url} after failure: {status}");
                    }
                    last_status = status;
                }
            }
        }

        Err(DeliveryError {
            status: last_status,
            attempts: MAX_DELIVERY_ATTEMPTS,
        })
    }
}
