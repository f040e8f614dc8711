#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use serde_json::json;

use basespace_download::api::{BaseSpaceClient, ContentStream, Endpoint};
use basespace_download::app::{ProgressEvent, ProgressSink};
use basespace_download::error::BsError;

/// In-memory BaseSpace account that records every request.
#[derive(Default)]
pub struct MockBaseSpace {
    page_size: usize,
    names: HashMap<String, String>,
    sample_files: HashMap<String, Vec<(String, String, u64)>>,
    project_samples: HashMap<String, Vec<(String, String)>>,
    contents: HashMap<String, Vec<u8>>,
    raw_bodies: HashMap<String, Vec<u8>>,
    fail_after: HashMap<String, usize>,
    requests: Mutex<Vec<Endpoint>>,
}

impl MockBaseSpace {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn with_sample(mut self, id: &str, name: &str, files: &[(&str, &str, &[u8])]) -> Self {
        self.names.insert(format!("samples/{id}"), name.to_string());
        let listed = files
            .iter()
            .map(|(file_id, file_name, data)| {
                self.contents.insert(file_id.to_string(), data.to_vec());
                (file_id.to_string(), file_name.to_string(), data.len() as u64)
            })
            .collect();
        self.sample_files.insert(id.to_string(), listed);
        self
    }

    pub fn with_project(mut self, id: &str, name: &str, samples: &[(&str, &str)]) -> Self {
        self.names.insert(format!("projects/{id}"), name.to_string());
        self.project_samples.insert(
            id.to_string(),
            samples
                .iter()
                .map(|(sample_id, sample_name)| (sample_id.to_string(), sample_name.to_string()))
                .collect(),
        );
        self
    }

    /// Serves `body` verbatim for every request to `path`.
    pub fn with_raw_body(mut self, path: &str, body: &str) -> Self {
        self.raw_bodies
            .insert(path.to_string(), body.as_bytes().to_vec());
        self
    }

    /// Breaks the content stream of `file_id` after `bytes` bytes.
    pub fn failing_after(mut self, file_id: &str, bytes: usize) -> Self {
        self.fail_after.insert(file_id.to_string(), bytes);
        self
    }

    pub fn requests(&self) -> Vec<Endpoint> {
        self.requests.lock().unwrap().clone()
    }

    pub fn content_requests(&self) -> usize {
        self.requests().iter().filter(|e| e.is_content()).count()
    }

    pub fn listing_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|e| e.offset().is_some())
            .count()
    }

    pub fn name_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|e| matches!(e, Endpoint::Sample(_) | Endpoint::Project(_)))
            .count()
    }

    fn page<T: Clone>(&self, items: &[T], offset: u64) -> (Vec<T>, usize) {
        let start = (offset as usize).min(items.len());
        let end = (start + self.page_size).min(items.len());
        (items[start..end].to_vec(), items.len())
    }
}

impl BaseSpaceClient for MockBaseSpace {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<u8>, BsError> {
        self.requests.lock().unwrap().push(endpoint.clone());
        let path = endpoint.path();
        if let Some(body) = self.raw_bodies.get(&path) {
            return Ok(body.clone());
        }
        let body = match endpoint {
            Endpoint::Sample(_) | Endpoint::Project(_) => {
                let name = self.names.get(&path).ok_or_else(|| BsError::Status {
                    status: 404,
                    message: format!("{path} not found"),
                })?;
                json!({ "Response": { "Name": name } })
            }
            Endpoint::SampleFiles { sample, offset } => {
                let files = self
                    .sample_files
                    .get(sample.as_str())
                    .cloned()
                    .unwrap_or_default();
                let (page, total) = self.page(&files, *offset);
                let items: Vec<_> = page
                    .iter()
                    .map(|(id, name, size)| json!({ "Id": id, "Name": name, "Size": size }))
                    .collect();
                json!({ "Response": {
                    "Items": items,
                    "TotalCount": total,
                    "DisplayedCount": page.len(),
                    "Offset": offset,
                }})
            }
            Endpoint::ProjectSamples { project, offset } => {
                let samples = self
                    .project_samples
                    .get(project.as_str())
                    .cloned()
                    .unwrap_or_default();
                let (page, total) = self.page(&samples, *offset);
                let items: Vec<_> = page
                    .iter()
                    .map(|(id, name)| json!({ "Id": id, "Name": name }))
                    .collect();
                json!({ "Response": {
                    "Items": items,
                    "TotalCount": total,
                    "DisplayedCount": page.len(),
                }})
            }
            Endpoint::FileContent(_) => {
                return Err(BsError::Fetch("content must be streamed".to_string()));
            }
        };
        Ok(serde_json::to_vec(&body).unwrap())
    }

    fn open(&self, endpoint: &Endpoint) -> Result<ContentStream, BsError> {
        self.requests.lock().unwrap().push(endpoint.clone());
        let Endpoint::FileContent(id) = endpoint else {
            return Err(BsError::Fetch("only content is streamed".to_string()));
        };
        let data = self
            .contents
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BsError::Status {
                status: 404,
                message: format!("file {id} not found"),
            })?;
        match self.fail_after.get(id.as_str()) {
            Some(limit) => Ok(Box::new(BrokenStream {
                inner: Cursor::new(data[..*limit].to_vec()),
            })),
            None => Ok(Box::new(Cursor::new(data))),
        }
    }
}

/// Yields its data, then a connection reset.
struct BrokenStream {
    inner: Cursor<Vec<u8>>,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        Ok(read)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Project and sample headers, rendered as `kind:id:depth`.
    pub fn headers(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::ProjectHeader { id, .. } => Some(format!("project:{id}:0")),
                ProgressEvent::SampleHeader { id, depth, .. } => {
                    Some(format!("sample:{id}:{depth}"))
                }
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn dir_entries(path: &std::path::Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
