// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{trace, warn};

use crate::errors::ReadError;

/// Complete lines found after an offset, and the exact number of bytes they span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub lines: Vec<String>,
    /// Raw byte length of every yielded line including its terminator.
    pub bytes_consumed: u64,
}

impl ReadOutcome {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Reads the fully terminated lines appended after a byte offset.
///
/// `from_offset` must sit on a line boundary. A trailing line without a
/// terminator is left in the file for a later read.
#[async_trait]
pub trait LineReader {
    async fn read_new_lines(&self, path: &Path, from_offset: u64)
        -> Result<ReadOutcome, ReadError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsLineReader;

#[async_trait]
impl LineReader for FsLineReader {
    async fn read_new_lines(
        &self,
        path: &Path,
        from_offset: u64,
    ) -> Result<ReadOutcome, ReadError> {
        let to_read_error = |source| ReadError {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).await.map_err(to_read_error)?;
        file.seek(SeekFrom::Start(from_offset))
            .await
            .map_err(to_read_error)?;

        let mut reader = BufReader::new(file);
        let mut outcome = ReadOutcome::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(n) => match terminated_line(&buf) {
                    Some(line) => {
                        outcome.lines.push(line);
                        outcome.bytes_consumed += n as u64;
                    }
                    None => {
                        trace!(
                            "TAIL | Leaving {n} unterminated bytes in {} for a later read",
                            path.display()
                        );
                        break;
                    }
                },
                Err(e) => {
                    // Lines gathered so far are still exact; the rest is read next time.
                    warn!("TAIL | Read of {} stopped early: {e}", path.display());
                    break;
                }
            }
        }

        Ok(outcome)
    }
}

/// Strips the `\n` or `\r\n` terminator, or returns `None` for a partial line.
fn terminated_line(raw: &[u8]) -> Option<String> {
    let without_lf = raw.strip_suffix(b"\n")?;
    let text = without_lf.strip_suffix(b"\r").unwrap_or(without_lf);
    Some(String::from_utf8_lossy(text).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_lines_from_start() {
        let file = file_with(b"line1\nline2\n");
        let outcome = FsLineReader.read_new_lines(file.path(), 0).await.unwrap();
        assert_eq!(outcome.lines, vec!["line1", "line2"]);
        assert_eq!(outcome.bytes_consumed, 12);
    }

    #[tokio::test]
    async fn test_reads_from_offset() {
        let file = file_with(b"line1\nline2\nline3\n");
        let outcome = FsLineReader.read_new_lines(file.path(), 6).await.unwrap();
        assert_eq!(outcome.lines, vec!["line2", "line3"]);
        assert_eq!(outcome.bytes_consumed, 12);
    }

    #[tokio::test]
    async fn test_partial_trailing_line_is_not_yielded() {
        let file = file_with(b"done\npartial");
        let outcome = FsLineReader.read_new_lines(file.path(), 0).await.unwrap();
        assert_eq!(outcome.lines, vec!["done"]);
        assert_eq!(outcome.bytes_consumed, 5);

        let outcome = FsLineReader.read_new_lines(file.path(), 5).await.unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.bytes_consumed, 0);
    }

    #[tokio::test]
    async fn test_crlf_terminators_are_counted() {
        let file = file_with(b"first\r\nsecond\n");
        let outcome = FsLineReader.read_new_lines(file.path(), 0).await.unwrap();
        assert_eq!(outcome.lines, vec!["first", "second"]);
        assert_eq!(outcome.bytes_consumed, 14);
    }

    #[tokio::test]
    async fn test_multibyte_characters_count_utf8_bytes() {
        let content = "ログ出力\nhé\n";
        let file = file_with(content.as_bytes());
        let outcome = FsLineReader.read_new_lines(file.path(), 0).await.unwrap();
        assert_eq!(outcome.lines, vec!["ログ出力", "hé"]);
        assert_eq!(outcome.bytes_consumed, content.len() as u64);
        assert_eq!(outcome.bytes_consumed, 13 + 4);
    }

    #[tokio::test]
    async fn test_empty_lines_are_kept() {
        let file = file_with(b"\n\nx\n");
        let outcome = FsLineReader.read_new_lines(file.path(), 0).await.unwrap();
        assert_eq!(outcome.lines, vec!["", "", "x"]);
        assert_eq!(outcome.bytes_consumed, 4);
    }

    #[tokio::test]
    async fn test_offset_past_end_yields_nothing() {
        let file = file_with(b"short\n");
        let outcome = FsLineReader.read_new_lines(file.path(), 100).await.unwrap();
        assert_eq!(outcome, ReadOutcome::default());
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.log");
        let err = FsLineReader.read_new_lines(&path, 0).await.unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_terminated_line() {
        assert_eq!(terminated_line(b"abc\n").as_deref(), Some("abc"));
        assert_eq!(terminated_line(b"abc\r\n").as_deref(), Some("abc"));
        assert_eq!(terminated_line(b"abc\r"), None);
        assert_eq!(terminated_line(b"abc"), None);
    }
}
