use std::fmt;
use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::config::ResolvedConfig;
use crate::domain::{FileId, ProjectId, SampleId};
use crate::error::BsError;
use crate::schema;

/// Streaming body of a file content request.
pub type ContentStream = Box<dyn Read + Send>;

/// Pre-obtained BaseSpace app token. Sent as the `access_token` query
/// parameter and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Result<Self, BsError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(BsError::MissingToken);
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// The slice of the BaseSpace API this tool consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Sample(SampleId),
    Project(ProjectId),
    SampleFiles { sample: SampleId, offset: u64 },
    ProjectSamples { project: ProjectId, offset: u64 },
    FileContent(FileId),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Sample(id) => format!("samples/{id}"),
            Endpoint::Project(id) => format!("projects/{id}"),
            Endpoint::SampleFiles { sample, .. } => format!("samples/{sample}/files"),
            Endpoint::ProjectSamples { project, .. } => format!("projects/{project}/samples"),
            Endpoint::FileContent(id) => format!("files/{id}/content"),
        }
    }

    pub fn offset(&self) -> Option<u64> {
        match self {
            Endpoint::SampleFiles { offset, .. } | Endpoint::ProjectSamples { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Endpoint::FileContent(_))
    }
}

pub trait BaseSpaceClient: Send + Sync {
    /// Returns the fully drained response body.
    fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<u8>, BsError>;
    /// Returns the response body as a stream.
    fn open(&self, endpoint: &Endpoint) -> Result<ContentStream, BsError>;
}

#[derive(Clone)]
pub struct BaseSpaceHttpClient {
    client: Client,
    base_url: String,
    token: AccessToken,
    max_retries: usize,
    page_limit: Option<u32>,
}

impl BaseSpaceHttpClient {
    pub fn new(token: AccessToken, config: &ResolvedConfig) -> Result<Self, BsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("basespace-download/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BsError::Fetch(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(config.timeout)
            .build()
            .map_err(|err| BsError::Fetch(err.without_url().to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            max_retries: config.max_retries,
            page_limit: config.page_limit,
        })
    }

    /// URL without the query string; safe to log.
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    fn query(&self, endpoint: &Endpoint) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(offset) = endpoint.offset() {
            query.push(("Offset", offset.to_string()));
            if let Some(limit) = self.page_limit {
                query.push(("Limit", limit.to_string()));
            }
        }
        query.push(("access_token", self.token.expose().to_string()));
        query
    }

    fn send(&self, endpoint: &Endpoint) -> Result<Response, BsError> {
        let url = self.url(endpoint);
        let query = self.query(endpoint);
        debug!(url = %url, offset = ?endpoint.offset(), "GET");
        let response = self.send_with_retries(|| self.client.get(&url).query(&query))?;
        Self::handle_status(response)
    }

    fn handle_status(response: Response) -> Result<Response, BsError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .map(|body| schema::error_message(&body))
            .unwrap_or_else(|_| "BaseSpace request failed".to_string());
        Err(BsError::Status { status, message })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, BsError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS << attempt.min(8);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay,
                            "connection failed, retrying: {}",
                            err.without_url()
                        );
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(BsError::Fetch(err.without_url().to_string()));
                }
            }
        }
    }
}

impl BaseSpaceClient for BaseSpaceHttpClient {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<u8>, BsError> {
        let response = self.send(endpoint)?;
        let bytes = response
            .bytes()
            .map_err(|err| BsError::Fetch(err.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }

    fn open(&self, endpoint: &Endpoint) -> Result<ContentStream, BsError> {
        let response = self.send(endpoint)?;
        Ok(Box::new(response))
    }
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(page_limit: Option<u32>) -> BaseSpaceHttpClient {
        let config = ResolvedConfig {
            api_url: "https://api.example.test/v1pre3/".to_string(),
            page_limit,
            ..ResolvedConfig::default()
        };
        BaseSpaceHttpClient::new(AccessToken::new("secret").unwrap(), &config).unwrap()
    }

    #[test]
    fn endpoint_paths() {
        let sample: SampleId = "17".parse().unwrap();
        let project: ProjectId = "42".parse().unwrap();
        let file: FileId = "99".parse().unwrap();
        assert_eq!(Endpoint::Sample(sample.clone()).path(), "samples/17");
        assert_eq!(Endpoint::Project(project.clone()).path(), "projects/42");
        assert_eq!(
            Endpoint::SampleFiles { sample, offset: 0 }.path(),
            "samples/17/files"
        );
        assert_eq!(
            Endpoint::ProjectSamples { project, offset: 0 }.path(),
            "projects/42/samples"
        );
        assert_eq!(Endpoint::FileContent(file).path(), "files/99/content");
    }

    #[test]
    fn token_is_a_query_parameter() {
        let client = client(None);
        let endpoint = Endpoint::SampleFiles {
            sample: "17".parse().unwrap(),
            offset: 20,
        };
        assert_eq!(
            client.url(&endpoint),
            "https://api.example.test/v1pre3/samples/17/files"
        );
        assert_eq!(
            client.query(&endpoint),
            vec![
                ("Offset", "20".to_string()),
                ("access_token", "secret".to_string())
            ]
        );
    }

    #[test]
    fn page_limit_only_on_listings() {
        let client = client(Some(256));
        let listing = Endpoint::ProjectSamples {
            project: "42".parse().unwrap(),
            offset: 0,
        };
        assert!(client.query(&listing).contains(&("Limit", "256".to_string())));

        let content = Endpoint::FileContent("99".parse().unwrap());
        assert_eq!(
            client.query(&content),
            vec![("access_token", "secret".to_string())]
        );
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AccessToken::new("secret").unwrap();
        assert!(!format!("{token:?}").contains("secret"));
        assert!(AccessToken::new("  ").is_err());
    }
}
