//! Response shapes.
//!
//! A `Response`/`BatchResponse`-style pair generalized to also carry the
//! incremental initial/subsequent payload shapes a synchronous-only
//! response never needs.

use serde::Serialize;

use crate::error::ServerError;
use crate::execution::incremental::IncrementalPayloadEntry;
use crate::path::PathValue;

/// The non-incremental response: `{ data?, errors? }`.
/// `errors` is omitted entirely when empty; `data` is `null` when execution
/// failed before producing a value.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,
}

impl Response {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(data: Option<serde_json::Value>, errors: Vec<ServerError>) -> Self {
        Self { data, errors }
    }

    pub fn errors_only(errors: Vec<ServerError>) -> Self {
        Self { data: None, errors }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The first payload of an incremental response: always carries `data` and
/// `hasNext: true`.
#[derive(Debug, Clone, Serialize)]
pub struct InitialIncrementalResponse {
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,
    #[serde(rename = "hasNext")]
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// One later payload: zero or more incremental items plus whether another
/// payload will follow.
#[derive(Debug, Clone, Serialize)]
pub struct SubsequentIncrementalResponse {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incremental: Vec<IncrementalItem>,
    #[serde(rename = "hasNext")]
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// One entry of a subsequent payload's `incremental` array: either a
/// resolved deferred fragment or a batch of stream items.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IncrementalItem {
    Defer {
        data: serde_json::Value,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<ServerError>,
        path: Vec<PathValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Stream {
        items: Vec<serde_json::Value>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<ServerError>,
        path: Vec<PathValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl From<IncrementalPayloadEntry> for IncrementalItem {
    fn from(entry: IncrementalPayloadEntry) -> Self {
        match entry {
            IncrementalPayloadEntry::Defer { data, errors, path, label } => {
                IncrementalItem::Defer { data, errors, path, label }
            }
            IncrementalPayloadEntry::Stream { items, errors, path, label } => {
                IncrementalItem::Stream { items, errors, path, label }
            }
        }
    }
}

impl SubsequentIncrementalResponse {
    pub fn new(entries: Vec<IncrementalPayloadEntry>, has_next: bool) -> Self {
        Self {
            incremental: entries.into_iter().map(IncrementalItem::from).collect(),
            has_next,
            extensions: None,
        }
    }
}

/// What `executeIncrementally` returns when the operation produced
/// deferred/streamed data: the already-available initial payload plus the
/// still-pending tail.
pub struct IncrementalExecutionResult {
    pub initial: InitialIncrementalResponse,
    pub subsequent_results:
        futures::stream::BoxStream<'static, SubsequentIncrementalResponse>,
}
