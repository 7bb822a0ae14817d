// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Change notifications for the directories holding the tracked files.
//!
//! Uses OS-level notifications through the `notify` crate (inotify, FSEvents,
//! ReadDirectoryChangesW). Raw events are flattened to one [`ChangeEvent`] per
//! affected path and pushed onto a tokio channel, so the agent consumes a
//! typed stream instead of registering callbacks.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::WatcherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Remove,
    Other,
}

/// "Something changed at this path."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

pub type ChangeStream = mpsc::UnboundedReceiver<Result<ChangeEvent, WatcherError>>;

/// Keeps the OS watcher alive; dropping it ends the event stream.
pub struct ChangeNotifier {
    watcher: RecommendedWatcher,
}

impl ChangeNotifier {
    pub fn new() -> Result<(Self, ChangeStream), WatcherError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in convert_event(event) {
                    // The receiver is gone once the agent stops; nothing left to notify.
                    if tx.send(Ok(change)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                if tx.send(Err(WatcherError::Notify(e.to_string()))).is_err() {
                    debug!("TAIL | Change receiver dropped, discarding watcher error");
                }
            }
        })
        .map_err(|e| WatcherError::Init(e.to_string()))?;

        Ok((Self { watcher }, rx))
    }

    /// Watches the entries of `dir`, not its subdirectories.
    pub fn watch(&mut self, dir: &Path) -> Result<(), WatcherError> {
        debug!("TAIL | Watching {}", dir.display());
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::Watch {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })
    }
}

fn convert_event(event: Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Modify(_) => ChangeKind::Modify,
        EventKind::Remove(_) => ChangeKind::Remove,
        EventKind::Access(_) => return Vec::new(),
        EventKind::Any | EventKind::Other => ChangeKind::Other,
    };

    event
        .paths
        .into_iter()
        .map(|path| ChangeEvent::new(kind, path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RenameMode};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::timeout;

    #[test]
    fn test_convert_modify_event() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/tmp/a.log".into());
        assert_eq!(
            convert_event(event),
            vec![ChangeEvent::new(ChangeKind::Modify, "/tmp/a.log")]
        );
    }

    #[test]
    fn test_convert_rename_event_yields_every_path() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/tmp/a.log.1".into())
            .add_path("/tmp/a.log".into());
        let changes = convert_event(event);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].path, PathBuf::from("/tmp/a.log"));
    }

    #[test]
    fn test_access_events_are_dropped() {
        let event = Event::new(EventKind::Access(AccessKind::Any)).add_path("/tmp/a.log".into());
        assert!(convert_event(event).is_empty());
    }

    #[test]
    fn test_create_event_kind() {
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path("/tmp/b.log".into());
        assert_eq!(convert_event(event)[0].kind, ChangeKind::Create);
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let (mut notifier, _rx) = ChangeNotifier::new().unwrap();
        let err = notifier.watch(&missing).unwrap_err();
        assert!(matches!(err, WatcherError::Watch { path, .. } if path == missing));
    }

    #[tokio::test]
    async fn test_notifier_reports_writes() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().canonicalize().unwrap();
        let file = dir_path.join("app.log");

        let (mut notifier, mut rx) = ChangeNotifier::new().unwrap();
        notifier.watch(&dir_path).unwrap();
        std::fs::write(&file, "hello\n").unwrap();

        let seen = timeout(Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if let Ok(change) = event {
                    if change.path == file {
                        return true;
                    }
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        assert!(seen);
    }
}
