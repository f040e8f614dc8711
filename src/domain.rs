use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BsError;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static id pattern"));

fn parse_id(kind: &'static str, value: &str) -> Result<String, BsError> {
    let trimmed = value.trim();
    if !ID_PATTERN.is_match(trimmed) {
        return Err(BsError::InvalidId {
            kind,
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SampleId(String);

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleId {
    type Err = BsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_id("sample", value).map(Self)
    }
}

impl TryFrom<String> for SampleId {
    type Error = BsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SampleId> for String {
    fn from(value: SampleId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = BsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_id("project", value).map(Self)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = BsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectId> for String {
    fn from(value: ProjectId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = BsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_id("file", value).map(Self)
    }
}

impl TryFrom<String> for FileId {
    type Error = BsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileId> for String {
    fn from(value: FileId) -> Self {
        value.0
    }
}

/// A remote resource that carries a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Sample(SampleId),
    Project(ProjectId),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Sample(_) => "sample",
            Entity::Project(_) => "project",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Sample(id) => id.as_str(),
            Entity::Project(id) => id.as_str(),
        }
    }
}

/// What a single run downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadRequest {
    Sample(SampleId),
    Project(ProjectId),
}

impl DownloadRequest {
    /// Exactly one of `sample` / `project` must be given.
    pub fn from_selection(
        sample: Option<&str>,
        project: Option<&str>,
    ) -> Result<Self, BsError> {
        let sample = sample.filter(|value| !value.trim().is_empty());
        let project = project.filter(|value| !value.trim().is_empty());
        match (sample, project) {
            (Some(sample), None) => Ok(DownloadRequest::Sample(sample.parse()?)),
            (None, Some(project)) => Ok(DownloadRequest::Project(project.parse()?)),
            (Some(_), Some(_)) => Err(BsError::Usage(
                "--sample and --project are mutually exclusive".to_string(),
            )),
            (None, None) => Err(BsError::Usage(
                "you must specify either a sample (-s) or project (-p) to download".to_string(),
            )),
        }
    }
}

/// Validates a remote display name for use as a flat local file name.
pub fn local_file_name(name: &str) -> Result<&str, BsError> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if unsafe_name {
        return Err(BsError::UnsafeFileName(name.to_string()));
    }
    Ok(name)
}
