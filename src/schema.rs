//! Typed shapes of the BaseSpace v1pre3 JSON responses.
//!
//! Every response wraps its payload in a `Response` object. Decoding is
//! strict: a missing field or wrong type is a [`BsError::Decode`].

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::{FileId, SampleId};
use crate::error::BsError;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "Response")]
    pub response: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedResource {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPage<T> {
    #[serde(rename = "Items")]
    pub items: Vec<T>,
    #[serde(rename = "TotalCount")]
    pub total_count: u64,
    #[serde(rename = "DisplayedCount")]
    pub displayed_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleItem {
    #[serde(rename = "Id")]
    pub id: SampleId,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileItem {
    #[serde(rename = "Id")]
    pub id: FileId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: u64,
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "ResponseStatus")]
    pub status: ResponseStatus,
}

#[derive(Debug, Deserialize)]
pub struct ResponseStatus {
    #[serde(rename = "ErrorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// Best-effort human message for an error body.
pub fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| match (envelope.status.error_code, envelope.status.message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (None, Some(message)) => Some(message),
            (Some(code), None) => Some(code),
            (None, None) => None,
        });
    parsed.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "empty response body".to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}

/// Decodes `{"Response": T}` from a raw body.
pub fn decode_response<T: DeserializeOwned>(context: &str, body: &[u8]) -> Result<T, BsError> {
    serde_json::from_slice::<Envelope<T>>(body)
        .map(|envelope| envelope.response)
        .map_err(|err| BsError::decode(context, err))
}
