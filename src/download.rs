//! Streaming content downloads with replace-on-success semantics.
//!
//! Bytes are written to `<target>.tmp` and only renamed onto the target once
//! the stream has been fully consumed and flushed. A file at the target path
//! is therefore always complete.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{BaseSpaceClient, Endpoint};
use crate::app::{ProgressEvent, ProgressSink};
use crate::cancel::CancelToken;
use crate::domain::FileId;
use crate::error::BsError;

pub const PARTIAL_SUFFIX: &str = ".tmp";
const CHUNK_SIZE: usize = 64 * 1024;
const REPORT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub file_id: FileId,
    pub name: String,
    pub target_path: Utf8PathBuf,
    /// Only used for progress display.
    pub expected_size: u64,
    pub depth: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    DryRun,
    AlreadyExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DryRun => write!(f, "dry run"),
            SkipReason::AlreadyExists => write!(f, "already exists"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed { bytes: u64 },
    Skipped(SkipReason),
}

impl Outcome {
    pub fn action(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "download",
            Outcome::Skipped(SkipReason::DryRun) => "dry-run",
            Outcome::Skipped(SkipReason::AlreadyExists) => "exists",
        }
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            Outcome::Completed { bytes } => *bytes,
            Outcome::Skipped(_) => 0,
        }
    }
}

pub fn partial_path(target: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{target}{PARTIAL_SUFFIX}"))
}

/// In-progress download. Removed on drop unless promoted.
pub struct PartialFile {
    path: Utf8PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PartialFile {
    pub fn create(target: &Utf8Path) -> Result<Self, BsError> {
        let path = partial_path(target);
        let file = File::create(path.as_std_path())
            .map_err(|err| BsError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(CHUNK_SIZE, file)),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn write_all(&mut self, chunk: &[u8]) -> Result<(), BsError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BsError::Filesystem(format!("{} already closed", self.path)))?;
        writer
            .write_all(chunk)
            .map_err(|err| BsError::Filesystem(format!("write {}: {err}", self.path)))
    }

    /// Flushes, syncs and atomically renames onto `target`.
    pub fn promote(mut self, target: &Utf8Path) -> Result<(), BsError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| BsError::Filesystem(format!("{} already closed", self.path)))?;
        let file = writer
            .into_inner()
            .map_err(|err| BsError::Filesystem(format!("flush {}: {}", self.path, err.error())))?;
        file.sync_all()
            .map_err(|err| BsError::Filesystem(format!("sync {}: {err}", self.path)))?;
        drop(file);
        fs::rename(self.path.as_std_path(), target.as_std_path())
            .map_err(|err| BsError::Filesystem(format!("rename {} -> {target}: {err}", self.path)))
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() || self.path.as_std_path().exists() {
            if let Err(err) = fs::remove_file(self.path.as_std_path()) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path, "failed to remove partial file: {err}");
                }
            }
        }
    }
}

/// Rate limiter for progress reports.
#[derive(Debug)]
struct Throttle {
    interval: Duration,
    last: Instant,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            return true;
        }
        false
    }
}

pub struct Downloader<'a, C: BaseSpaceClient + ?Sized> {
    client: &'a C,
    cancel: CancelToken,
    report_interval: Duration,
}

impl<'a, C: BaseSpaceClient + ?Sized> Downloader<'a, C> {
    pub fn new(client: &'a C, cancel: CancelToken) -> Self {
        Self {
            client,
            cancel,
            report_interval: REPORT_INTERVAL,
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn download(
        &self,
        task: &DownloadTask,
        sink: &dyn ProgressSink,
    ) -> Result<Outcome, BsError> {
        sink.event(ProgressEvent::File {
            id: task.file_id.clone(),
            name: task.name.clone(),
            size: task.expected_size,
            depth: task.depth,
        });

        if task.dry_run {
            return Ok(Outcome::Skipped(SkipReason::DryRun));
        }

        if task.target_path.as_std_path().exists() {
            sink.event(ProgressEvent::Skipped {
                name: task.name.clone(),
                reason: SkipReason::AlreadyExists,
                depth: task.depth,
            });
            return Ok(Outcome::Skipped(SkipReason::AlreadyExists));
        }

        self.cancel.check()?;
        let mut partial = PartialFile::create(&task.target_path)?;
        let mut stream = self
            .client
            .open(&Endpoint::FileContent(task.file_id.clone()))?;
        let bytes = self.copy(&mut stream, &mut partial, task, sink)?;
        partial.promote(&task.target_path)?;

        if bytes != task.expected_size {
            warn!(
                file = %task.name,
                expected = task.expected_size,
                actual = bytes,
                "transferred size differs from listed size"
            );
        }
        info!(file = %task.name, bytes, path = %task.target_path, "download complete");
        sink.event(ProgressEvent::Completed {
            name: task.name.clone(),
            bytes,
            depth: task.depth,
        });
        Ok(Outcome::Completed { bytes })
    }

    fn copy(
        &self,
        stream: &mut dyn Read,
        partial: &mut PartialFile,
        task: &DownloadTask,
        sink: &dyn ProgressSink,
    ) -> Result<u64, BsError> {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut done = 0u64;
        let mut throttle = Throttle::new(self.report_interval);
        sink.event(ProgressEvent::Transfer {
            done,
            total: task.expected_size,
            depth: task.depth,
        });
        loop {
            self.cancel.check()?;
            let read = match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(BsError::Fetch(format!(
                        "reading content of {} after {done} bytes: {err}",
                        task.name
                    )));
                }
            };
            partial.write_all(&buffer[..read])?;
            done += read as u64;
            if throttle.ready() {
                sink.event(ProgressEvent::Transfer {
                    done,
                    total: task.expected_size,
                    depth: task.depth,
                });
            }
        }
        sink.event(ProgressEvent::Transfer {
            done,
            total: task.expected_size,
            depth: task.depth,
        });
        Ok(done)
    }
}
