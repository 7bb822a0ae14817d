// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-file tailing state and the actor that serializes work on it.
//!
//! [`TailState`] decides which bytes of a file are new. Each cycle:
//!
//! 1. resolves the identity token of the path;
//! 2. if a token was resolved and differs from the known one, the file was
//!    rotated: the token is adopted and the read position goes back to 0;
//! 3. reads the complete lines after the read position;
//! 4. stops if there are none;
//! 5. otherwise uploads them and, whatever the delivery result, advances the
//!    read position by exactly the bytes those lines span.
//!
//! A cycle goes `IDLE -> READING -> UPLOADING -> IDLE` and only ever runs
//! through `&mut TailState`, which [`TailService`] owns. All other tasks talk
//! to the service through a [`TailHandle`]:
//!
//! ```text
//!    ┌──────────────┐
//!    │  TailHandle  │ (watcher dispatch, startup, tests)
//!    └──────┬───────┘
//!           │ trigger (coalesced) / commands
//!           v
//!    ┌──────────────┐
//!    │ TailService  │ (single consumer)
//!    └──────┬───────┘
//!           │ owns
//!           v
//!    ┌──────────────┐
//!    │  TailState   │
//!    └──────────────┘
//! ```
//!
//! Triggers coalesce. Any number of triggers arriving while a cycle is in
//! flight leave a single pending trigger behind, which runs one more cycle
//! from the updated read position once the current one is done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, error, info, warn};

use crate::constants::TAIL_COMMAND_CHANNEL_SIZE;
use crate::errors::AgentError;
use crate::inode::{FileId, InodeResolver};
use crate::reader::{LineReader, ReadOutcome};
use crate::uploader::{BatchUploader, UploadBatch};
use crate::watcher::ChangeEvent;

/// In-memory position of one tailed file. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub current_inode: Option<FileId>,
    /// Byte offset, always on a line boundary.
    pub last_read_position: u64,
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    NoNewLines,
    /// The file could not be read; position untouched.
    Unreadable,
    Uploaded { lines: usize, bytes: u64 },
    /// Delivery failed after the retry; the lines are dropped but the position still advances.
    Dropped { lines: usize, bytes: u64 },
}

pub struct TailState {
    tracked: TrackedFile,
    resolver: Arc<dyn InodeResolver + Send + Sync>,
    reader: Arc<dyn LineReader + Send + Sync>,
    uploader: Arc<dyn BatchUploader + Send + Sync>,
}

impl TailState {
    /// Resolves the identity of `path` right away; it may not exist yet.
    pub fn new(
        path: PathBuf,
        resolver: Arc<dyn InodeResolver + Send + Sync>,
        reader: Arc<dyn LineReader + Send + Sync>,
        uploader: Arc<dyn BatchUploader + Send + Sync>,
    ) -> Self {
        let current_inode = resolver.resolve(&path);
        TailState {
            tracked: TrackedFile {
                path,
                current_inode,
                last_read_position: 0,
            },
            resolver,
            reader,
            uploader,
        }
    }

    pub fn tracked(&self) -> &TrackedFile {
        &self.tracked
    }

    pub fn path(&self) -> &Path {
        &self.tracked.path
    }

    /// Resets the position when a fresh, different identity token is found.
    /// An unresolvable token never counts as a rotation.
    fn check_rotation(&mut self) -> bool {
        let Some(resolved) = self.resolver.resolve(&self.tracked.path) else {
            return false;
        };
        if self.tracked.current_inode == Some(resolved) {
            return false;
        }

        info!(
            "TAIL | {} was rotated ({} -> {resolved}), reading from the start",
            self.tracked.path.display(),
            self.tracked
                .current_inode
                .map_or_else(|| "none".to_string(), |id| id.to_string()),
        );
        self.tracked.current_inode = Some(resolved);
        self.tracked.last_read_position = 0;
        true
    }

    pub async fn process(&mut self) -> CycleOutcome {
        self.check_rotation();

        let offset = self.tracked.last_read_position;
        let ReadOutcome {
            lines,
            bytes_consumed,
        } = match self.reader.read_new_lines(&self.tracked.path, offset).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("TAIL | {e}");
                return CycleOutcome::Unreadable;
            }
        };

        if lines.is_empty() {
            return CycleOutcome::NoNewLines;
        }

        let batch = UploadBatch::new(lines);
        let delivered = match self.uploader.upload(&self.tracked.path, &batch).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "TAIL | Dropping {} lines from {}: {e}",
                    batch.len(),
                    self.tracked.path.display()
                );
                false
            }
        };

        self.tracked.last_read_position += bytes_consumed;

        if delivered {
            CycleOutcome::Uploaded {
                lines: batch.len(),
                bytes: bytes_consumed,
            }
        } else {
            CycleOutcome::Dropped {
                lines: batch.len(),
                bytes: bytes_consumed,
            }
        }
    }
}

#[derive(Debug)]
pub enum TailCommand {
    /// Run a cycle now and report its outcome.
    Process(oneshot::Sender<CycleOutcome>),
    Snapshot(oneshot::Sender<TrackedFile>),
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct TailHandle {
    path: Arc<PathBuf>,
    tx: mpsc::Sender<TailCommand>,
    trigger: Arc<Notify>,
}

impl TailHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Triggers a cycle if `event` is about the tracked path. Other paths are ignored.
    pub fn on_event(&self, event: &ChangeEvent) -> bool {
        if event.path != *self.path {
            return false;
        }
        self.trigger();
        true
    }

    /// Requests a cycle without waiting for it.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub async fn process_now(&self) -> Result<CycleOutcome, AgentError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(TailCommand::Process(response_tx)).await?;
        response_rx.await.map_err(|_| self.unavailable())
    }

    pub async fn snapshot(&self) -> Result<TrackedFile, AgentError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(TailCommand::Snapshot(response_tx)).await?;
        response_rx.await.map_err(|_| self.unavailable())
    }

    pub async fn shutdown(&self) -> Result<(), AgentError> {
        self.send(TailCommand::Shutdown).await
    }

    async fn send(&self, command: TailCommand) -> Result<(), AgentError> {
        self.tx.send(command).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> AgentError {
        AgentError::ServiceUnavailable(self.path.to_path_buf())
    }
}

pub struct TailService {
    state: TailState,
    rx: mpsc::Receiver<TailCommand>,
    trigger: Arc<Notify>,
}

impl TailService {
    #[must_use]
    pub fn new(state: TailState) -> (Self, TailHandle) {
        let (tx, rx) = mpsc::channel(TAIL_COMMAND_CHANNEL_SIZE);
        let trigger = Arc::new(Notify::new());
        let handle = TailHandle {
            path: Arc::new(state.path().to_path_buf()),
            tx,
            trigger: Arc::clone(&trigger),
        };
        (TailService { state, rx, trigger }, handle)
    }

    /// Processes triggers and commands one at a time until shutdown or until
    /// every handle is dropped.
    ///
    /// A pending trigger is served before queued commands, and after each
    /// triggered cycle at most one queued command runs, so a steady stream of
    /// change events delays a command by one cycle at most.
    pub async fn run(mut self) {
        debug!("TAIL | Tail service for {} started", self.state.path().display());

        loop {
            tokio::select! {
                biased;

                () = self.trigger.notified() => {
                    self.state.process().await;
                    match self.rx.try_recv() {
                        Ok(command) => {
                            if !self.handle(command).await {
                                break;
                            }
                        }
                        Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Disconnected) => break,
                    }
                }
                command = self.rx.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("TAIL | Tail service for {} stopped", self.state.path().display());
    }

    /// Returns `false` once the service should stop.
    async fn handle(&mut self, command: TailCommand) -> bool {
        match command {
            TailCommand::Process(response_tx) => {
                let outcome = self.state.process().await;
                if response_tx.send(outcome).is_err() {
                    debug!("TAIL | Cycle outcome receiver dropped");
                }
            }
            TailCommand::Snapshot(response_tx) => {
                if response_tx.send(self.state.tracked().clone()).is_err() {
                    debug!("TAIL | Snapshot receiver dropped");
                }
            }
            TailCommand::Shutdown => return false,
        }
        true
    }
}
