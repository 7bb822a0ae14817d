// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runs one tail service per configured path and feeds them change events.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::inode::{FsInodeResolver, InodeResolver};
use crate::reader::{FsLineReader, LineReader};
use crate::tail::{TailHandle, TailService, TailState};
use crate::uploader::{build_client, BatchUploader, HttpUploader};
use crate::watcher::{ChangeEvent, ChangeNotifier, ChangeStream};

pub struct Agent {
    handles: Vec<TailHandle>,
    services: Vec<TailService>,
}

impl Agent {
    /// Builds the filesystem and HTTP collaborators, shared by every path.
    pub fn new(config: &AgentConfig) -> Self {
        let client = build_client(config.https_proxy.as_deref());
        Self::with_collaborators(
            config,
            Arc::new(FsInodeResolver),
            Arc::new(FsLineReader),
            Arc::new(HttpUploader::new(client, &config.endpoint)),
        )
    }

    pub fn with_collaborators(
        config: &AgentConfig,
        resolver: Arc<dyn InodeResolver + Send + Sync>,
        reader: Arc<dyn LineReader + Send + Sync>,
        uploader: Arc<dyn BatchUploader + Send + Sync>,
    ) -> Self {
        let (services, handles): (Vec<TailService>, Vec<TailHandle>) = config
            .paths
            .iter()
            .map(|path| {
                TailService::new(TailState::new(
                    path.clone(),
                    Arc::clone(&resolver),
                    Arc::clone(&reader),
                    Arc::clone(&uploader),
                ))
            })
            .unzip();

        Agent { handles, services }
    }

    pub fn handles(&self) -> &[TailHandle] {
        &self.handles
    }

    /// Ships what is already in each file, then follows change events until
    /// `cancel` fires or the notifier stops.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), AgentError> {
        let Agent { handles, services } = self;

        for service in services {
            tokio::spawn(service.run());
        }

        for handle in &handles {
            match handle.process_now().await {
                Ok(outcome) => debug!(
                    "TAIL | Initial read of {}: {outcome:?}",
                    handle.path().display()
                ),
                Err(e) => error!("TAIL | {e}"),
            }
        }

        let (mut notifier, mut events) = ChangeNotifier::new()?;
        for dir in watch_dirs(&handles) {
            if let Err(e) = notifier.watch(&dir) {
                error!("TAIL | {e}");
            }
        }
        info!("TAIL | Tailing {} files", handles.len());

        follow(&handles, &mut events, &cancel).await;

        drop(notifier);
        for handle in &handles {
            if let Err(e) = handle.shutdown().await {
                debug!("TAIL | {e}");
            }
        }
        Ok(())
    }
}

/// Dispatches change events until `cancel` fires or the stream ends. Watcher
/// errors are logged and later events are still dispatched.
async fn follow(handles: &[TailHandle], events: &mut ChangeStream, cancel: &CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("TAIL | Agent cancelled");
                break;
            }
            event = events.recv() => match event {
                Some(Ok(change)) => dispatch(handles, &change),
                Some(Err(e)) => error!("TAIL | {e}"),
                None => {
                    error!("TAIL | Change notifier stopped");
                    break;
                }
            },
        }
    }
}

fn dispatch(handles: &[TailHandle], change: &ChangeEvent) {
    for handle in handles {
        handle.on_event(change);
    }
}

/// Distinct parent directories of the tracked paths, in configuration order.
fn watch_dirs(handles: &[TailHandle]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for handle in handles {
        if let Some(parent) = handle.path().parent() {
            if !dirs.iter().any(|dir| dir == parent) {
                dirs.push(parent.to_path_buf());
            }
        }
    }
    dirs
}
