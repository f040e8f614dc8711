use std::fs;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::info;

use crate::api::BaseSpaceClient;
use crate::cancel::CancelToken;
use crate::domain::{self, DownloadRequest, Entity, FileId, ProjectId, SampleId};
use crate::download::{DownloadTask, Downloader, Outcome, SkipReason};
use crate::error::BsError;
use crate::paginate::{Listing, Paginator};
use crate::resolve::resolve_name;
use crate::schema::{FileItem, SampleItem};

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target: String,
    pub id: String,
    pub name: String,
    pub dry_run: bool,
    pub samples: Vec<SampleSummary>,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub bytes_written: u64,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleSummary {
    pub id: String,
    pub name: String,
    pub files: Vec<FileResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub action: String,
    pub bytes_written: u64,
}

impl RunSummary {
    fn new(target: &str, id: &str, name: String, dry_run: bool) -> Self {
        Self {
            target: target.to_string(),
            id: id.to_string(),
            name,
            dry_run,
            samples: Vec::new(),
            files_downloaded: 0,
            files_skipped: 0,
            bytes_written: 0,
            finished_at: None,
        }
    }

    fn record(&mut self, task: &DownloadTask, outcome: Outcome) {
        match outcome {
            Outcome::Completed { bytes } => {
                self.files_downloaded += 1;
                self.bytes_written += bytes;
            }
            Outcome::Skipped(_) => self.files_skipped += 1,
        }
        if let Some(sample) = self.samples.last_mut() {
            sample.files.push(FileResult {
                id: task.file_id.to_string(),
                name: task.name.clone(),
                path: task.target_path.to_string(),
                size: task.expected_size,
                action: outcome.action().to_string(),
                bytes_written: outcome.bytes_written(),
            });
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ProjectHeader {
        id: ProjectId,
        name: String,
    },
    SampleHeader {
        id: SampleId,
        name: String,
        depth: usize,
    },
    File {
        id: FileId,
        name: String,
        size: u64,
        depth: usize,
    },
    Skipped {
        name: String,
        reason: SkipReason,
        depth: usize,
    },
    Transfer {
        done: u64,
        total: u64,
        depth: usize,
    },
    Completed {
        name: String,
        bytes: u64,
        depth: usize,
    },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Two spaces per nesting level.
pub fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

pub struct App<C: BaseSpaceClient> {
    client: C,
    output_dir: Utf8PathBuf,
    cancel: CancelToken,
}

impl<C: BaseSpaceClient> App<C> {
    pub fn new(client: C, output_dir: Utf8PathBuf) -> Self {
        Self {
            client,
            output_dir,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn run(
        &self,
        request: &DownloadRequest,
        options: DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, BsError> {
        if !options.dry_run {
            fs::create_dir_all(self.output_dir.as_std_path()).map_err(|err| {
                BsError::Filesystem(format!("create {}: {err}", self.output_dir))
            })?;
        }

        let mut summary = match request {
            DownloadRequest::Sample(sample) => {
                let mut summary =
                    RunSummary::new("sample", sample.as_str(), String::new(), options.dry_run);
                let name = self.download_sample(sample, None, 0, &options, sink, &mut summary)?;
                summary.name = name;
                summary
            }
            DownloadRequest::Project(project) => self.download_project(project, &options, sink)?,
        };
        summary.finished_at = Some(chrono::Utc::now().to_rfc3339());
        info!(
            downloaded = summary.files_downloaded,
            skipped = summary.files_skipped,
            bytes = summary.bytes_written,
            "run finished"
        );
        Ok(summary)
    }

    pub fn download_project(
        &self,
        project: &ProjectId,
        options: &DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, BsError> {
        self.cancel.check()?;
        let name = resolve_name(&self.client, &Entity::Project(project.clone()))?;
        sink.event(ProgressEvent::ProjectHeader {
            id: project.clone(),
            name: name.clone(),
        });

        let mut summary = RunSummary::new("project", project.as_str(), name, options.dry_run);
        let samples: Paginator<'_, C, SampleItem> = Paginator::new(
            &self.client,
            Listing::ProjectSamples(project.clone()),
            self.cancel.clone(),
        );
        for sample in samples {
            let sample = sample?;
            self.download_sample(&sample.id, Some(sample.name), 1, options, sink, &mut summary)?;
        }
        Ok(summary)
    }

    /// Returns the sample's display name.
    pub fn download_sample(
        &self,
        sample: &SampleId,
        known_name: Option<String>,
        depth: usize,
        options: &DownloadOptions,
        sink: &dyn ProgressSink,
        summary: &mut RunSummary,
    ) -> Result<String, BsError> {
        self.cancel.check()?;
        let name = match known_name {
            Some(name) => name,
            None => resolve_name(&self.client, &Entity::Sample(sample.clone()))?,
        };
        sink.event(ProgressEvent::SampleHeader {
            id: sample.clone(),
            name: name.clone(),
            depth,
        });
        summary.samples.push(SampleSummary {
            id: sample.to_string(),
            name: name.clone(),
            files: Vec::new(),
        });

        let downloader = Downloader::new(&self.client, self.cancel.clone());
        let files: Paginator<'_, C, FileItem> = Paginator::new(
            &self.client,
            Listing::SampleFiles(sample.clone()),
            self.cancel.clone(),
        );
        for file in files {
            let file = file?;
            let task = self.task_for(file, depth + 1, options)?;
            let outcome = downloader.download(&task, sink)?;
            summary.record(&task, outcome);
        }
        Ok(name)
    }

    fn task_for(
        &self,
        file: FileItem,
        depth: usize,
        options: &DownloadOptions,
    ) -> Result<DownloadTask, BsError> {
        let target_path = self.output_dir.join(domain::local_file_name(&file.name)?);
        Ok(DownloadTask {
            file_id: file.id,
            name: file.name,
            target_path,
            expected_size: file.size,
            depth,
            dry_run: options.dry_run,
        })
    }
}
