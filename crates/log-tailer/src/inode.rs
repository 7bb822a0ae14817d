// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! File identity tokens used to tell a replaced file from an appended one.
//!
//! On Unix the token is the device number plus the inode number reported by
//! `stat`. On Windows it is the volume serial number plus the file index of an
//! open handle. Both stay the same while a writer appends to the file and change
//! when a rotation tool swaps a fresh file in at the same path.

use std::fmt;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::errors::IdentityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    #[cfg(unix)]
    pub fn from_path(path: &Path) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(windows)]
    pub fn from_path(path: &Path) -> io::Result<Self> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION,
        };

        let file = std::fs::File::open(path)?;
        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: the struct is plain data and is fully written by the call below.
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };
        // SAFETY: `handle` stays valid for as long as `file` is alive.
        if unsafe { GetFileInformationByHandle(handle, &mut info) } == 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            dev: u64::from(info.dwVolumeSerialNumber),
            ino: (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow),
        })
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

/// Maps a path to its current identity token.
///
/// Implementations never fail: an unreadable or missing file resolves to `None`.
pub trait InodeResolver {
    fn resolve(&self, path: &Path) -> Option<FileId>;
}

/// Resolves identity tokens from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsInodeResolver;

impl FsInodeResolver {
    pub fn try_resolve(&self, path: &Path) -> Result<FileId, IdentityError> {
        FileId::from_path(path).map_err(|source| IdentityError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl InodeResolver for FsInodeResolver {
    fn resolve(&self, path: &Path) -> Option<FileId> {
        match self.try_resolve(path) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("TAIL | {e}");
                None
            }
        }
    }
}
