//! Value completion.
//!
//! A recursive function over the declared return type, dispatching on
//! non-null, list, leaf, abstract and object shapes. Generalized from a
//! resolved-value completion walk to the dynamic schema's closure-based
//! `isTypeOf`/`resolveType` hooks and to `@stream`/`@defer` bookkeeping a
//! purely synchronous completion walk never needed.

use futures::future::BoxFuture;

use crate::abort::AbortController;
use crate::context::{ExecutionContext, LocalErrorBuffer};
use crate::error::{Error, QueryError};
use crate::path::Path;
use crate::schema::{Type as SchemaType, TypeRef};

use super::collect::{DeferUsageSet, FieldDetails};
use super::incremental::{IncrementalDataRecord, StreamItemResult, StreamRecord, WrappedResult};

/// What every recursive completion step returns: the shaped JSON value plus
/// any incremental records it spawned.
pub type CompletionResult = crate::error::Result<WrappedResult<serde_json::Value>>;

struct StreamUsage {
    initial_count: usize,
    label: Option<String>,
}

/// Extracts `@stream`'s arguments from the first field node in the list,
/// once per field-details-list. Inner lists — where the current path
/// already names a list index — never stream.
fn stream_usage(field_details_list: &[FieldDetails], path: &Path) -> Option<StreamUsage> {
    if path.is_list_item() {
        return None;
    }
    let first = field_details_list.first()?;
    let directive = first.node.directives.iter().find(|d| d.name == "stream")?;
    if let Some(if_arg) = directive.get_argument("if") {
        if let crate::ast::Value::Boolean(false) = &if_arg.node {
            return None;
        }
    }
    let initial_count = directive
        .get_argument("initialCount")
        .and_then(|v| match &v.node {
            crate::ast::Value::Int(n) if *n >= 0 => Some(*n as usize),
            _ => None,
        })
        .unwrap_or(0);
    let label = directive.get_argument("label").and_then(|v| match &v.node {
        crate::ast::Value::String(s) => Some(s.clone()),
        _ => None,
    });
    Some(StreamUsage { initial_count, label })
}

/// Recursively completes `result` (already resolved, never a pending
/// future) against `return_type`.
pub fn complete_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    return_type: &'a TypeRef,
    field_details_list: &'a [FieldDetails],
    path: &'a Path,
    parent_defer_usages: &'a DeferUsageSet,
    result: serde_json::Value,
) -> BoxFuture<'a, CompletionResult> {
    Box::pin(async move {
        match return_type {
            TypeRef::NonNull(inner) => {
                let completed = complete_value(
                    ctx,
                    inner,
                    field_details_list,
                    path,
                    parent_defer_usages,
                    result,
                )
                .await?;
                if completed.value.is_null() {
                    let (field_name, parent_type) =
                        path.last_field().unwrap_or(("", ""));
                    return Err(Error::new(
                        field_pos(field_details_list),
                        Some(path.to_vec()),
                        QueryError::NonNullableField {
                            parent_type: parent_type.to_string(),
                            field_name: field_name.to_string(),
                        },
                    ));
                }
                Ok(completed)
            }
            _ if result.is_null() => Ok(WrappedResult::new(serde_json::Value::Null)),
            TypeRef::List(inner) => {
                complete_list_value(ctx, inner, field_details_list, path, parent_defer_usages, result)
                    .await
            }
            TypeRef::Named(name) => {
                complete_named_value(ctx, name, field_details_list, path, parent_defer_usages, result)
                    .await
            }
        }
    })
}

fn field_pos(field_details_list: &[FieldDetails]) -> crate::ast::Pos {
    field_details_list
        .first()
        .map(|d| d.node.position())
        .unwrap_or_default()
}

async fn complete_list_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    item_type: &'a TypeRef,
    field_details_list: &'a [FieldDetails],
    path: &'a Path,
    parent_defer_usages: &'a DeferUsageSet,
    result: serde_json::Value,
) -> CompletionResult {
    let items = match result {
        serde_json::Value::Array(items) => items,
        _ => {
            return Err(Error::new(
                field_pos(field_details_list),
                Some(path.to_vec()),
                QueryError::ExpectedIterable {
                    parent_type: path.last_field().map(|(_, p)| p.to_string()).unwrap_or_default(),
                    field_name: path.last_field().map(|(f, _)| f.to_string()).unwrap_or_default(),
                },
            ));
        }
    };

    let usage = stream_usage(field_details_list, path);
    let mut completed_items = Vec::new();
    let mut records = Vec::new();
    let mut stream_record: Option<std::sync::Arc<StreamRecord>> = None;

    for (index, item) in items.into_iter().enumerate() {
        let streaming = match &usage {
            Some(usage) => index >= usage.initial_count,
            None => false,
        };
        if streaming {
            let usage = usage.as_ref().unwrap();
            let stream_record = stream_record.get_or_insert_with(|| {
                std::sync::Arc::new(StreamRecord::new(
                    usage.label.clone(),
                    path.to_vec(),
                    ctx.abort_signal().map(|_| AbortController::new()),
                ))
            });
            stream_item(
                ctx,
                item_type,
                field_details_list,
                path,
                parent_defer_usages,
                stream_record,
                index,
                item,
            )
            .await;
            continue;
        }

        let item_path = path.push_index(index);
        let wrapped = complete_value(
            ctx,
            item_type,
            field_details_list,
            &item_path,
            parent_defer_usages,
            item,
        )
        .await;
        match wrapped {
            Ok(wrapped) => {
                completed_items.push(wrapped.value);
                records.extend(wrapped.incremental_data_records);
            }
            Err(err) => {
                if item_type.is_non_null() {
                    return Err(err);
                }
                ctx.record_error(err);
                completed_items.push(serde_json::Value::Null);
            }
        }
    }

    if let Some(stream_record) = stream_record {
        stream_record.push_item(StreamItemResult::End);
        records.push(IncrementalDataRecord::Stream(stream_record));
    }

    Ok(WrappedResult::with_records(
        serde_json::Value::Array(completed_items),
        records,
    ))
}

/// Completes one item at or past the `@stream` boundary and pushes it onto
/// `stream_record`. Callers push `StreamItemResult::End` once, after the
/// last item in the remaining sequence has gone through here.
async fn stream_item<'a>(
    ctx: &'a ExecutionContext<'a>,
    item_type: &'a TypeRef,
    field_details_list: &'a [FieldDetails],
    path: &'a Path,
    parent_defer_usages: &'a DeferUsageSet,
    stream_record: &StreamRecord,
    index: usize,
    item: serde_json::Value,
) {
    let local = LocalErrorBuffer::new();
    let local_ctx = ctx.with_local_errors(&local);
    let item_path = path.push_index(index);
    let wrapped = complete_value(
        &local_ctx,
        item_type,
        field_details_list,
        &item_path,
        parent_defer_usages,
        item,
    )
    .await;
    match wrapped {
        Ok(wrapped) => stream_record.push_item(StreamItemResult::Item {
            item: wrapped.value,
            errors: local.into_vec(),
        }),
        Err(err) => {
            let mut errors = local.into_vec();
            errors.push(err);
            stream_record.push_item(StreamItemResult::Item {
                item: serde_json::Value::Null,
                errors,
            });
        }
    }
}

async fn complete_named_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    type_name: &'a str,
    field_details_list: &'a [FieldDetails],
    path: &'a Path,
    parent_defer_usages: &'a DeferUsageSet,
    result: serde_json::Value,
) -> CompletionResult {
    let schema_type = ctx.args.schema.get_type(type_name).ok_or_else(|| {
        Error::new(
            field_pos(field_details_list),
            Some(path.to_vec()),
            QueryError::FieldNotFound {
                field_name: type_name.to_string(),
                object: type_name.to_string(),
            },
        )
    })?;

    match schema_type {
        SchemaType::Scalar(scalar) => {
            let serialized = (scalar.serialize)(&result).ok_or_else(|| {
                Error::new(
                    field_pos(field_details_list),
                    Some(path.to_vec()),
                    QueryError::Other(format!(
                        "value does not serialize as \"{}\"",
                        scalar.name
                    )),
                )
            })?;
            Ok(WrappedResult::new(serialized))
        }
        SchemaType::Enum(en) => {
            let matched = en
                .values
                .values()
                .find(|def| def.value == result)
                .ok_or_else(|| {
                    Error::new(
                        field_pos(field_details_list),
                        Some(path.to_vec()),
                        QueryError::Other(format!("invalid enum value for \"{}\"", type_name)),
                    )
                })?;
            Ok(WrappedResult::new(matched.value.clone()))
        }
        SchemaType::Union(_) | SchemaType::Interface(_) => {
            complete_abstract_value(
                ctx,
                type_name,
                schema_type,
                field_details_list,
                path,
                parent_defer_usages,
                result,
            )
            .await
        }
        SchemaType::Object(_) => {
            complete_object_value(
                ctx,
                type_name,
                field_details_list,
                path,
                parent_defer_usages,
                result,
            )
            .await
        }
        SchemaType::InputObject(_) => Err(Error::new(
            field_pos(field_details_list),
            Some(path.to_vec()),
            QueryError::Other(format!("\"{}\" is not an output type", type_name)),
        )),
    }
}

async fn resolve_abstract_type(
    ctx: &ExecutionContext<'_>,
    abstract_name: &str,
    abstract_type: &SchemaType,
    result: &serde_json::Value,
) -> Option<String> {
    let resolve_type = match abstract_type {
        SchemaType::Interface(t) => t.resolve_type.clone(),
        SchemaType::Union(t) => t.resolve_type.clone(),
        _ => None,
    };
    let resolve_type = resolve_type.or_else(|| ctx.args.resolver_defaults.type_resolver.clone());

    if let Some(resolve_type) = resolve_type {
        return resolve_type(result, &default_data()).await;
    }

    // Default resolveType: __typename, then each possible type's isTypeOf.
    if let Some(typename) = result.get("__typename").and_then(|v| v.as_str()) {
        return Some(typename.to_string());
    }

    let possible_types = abstract_type.possible_types()?;
    for candidate in possible_types {
        if let Some(SchemaType::Object(obj)) = ctx.args.schema.get_type(candidate) {
            if let Some(is_type_of) = &obj.is_type_of {
                if is_type_of(result, &default_data()).await {
                    return Some(candidate.clone());
                }
            }
        }
    }
    let _ = abstract_name;
    None
}

/// A placeholder empty `Data` for default type-resolution hooks invoked
/// outside of a field's own resolver context. Real request-scoped data
/// lives on `ResolverContext` and is threaded through the field executor
/// instead; the default hooks here only need `__typename`/`isTypeOf`, which
/// don't read context data in this crate's built-in behavior.
fn default_data() -> crate::schema::Data {
    crate::schema::Data::new()
}

async fn complete_abstract_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    abstract_name: &'a str,
    abstract_type: &'a SchemaType,
    field_details_list: &'a [FieldDetails],
    path: &'a Path,
    parent_defer_usages: &'a DeferUsageSet,
    result: serde_json::Value,
) -> CompletionResult {
    let runtime_type_name = resolve_abstract_type(ctx, abstract_name, abstract_type, &result).await;

    let runtime_type_name = runtime_type_name.ok_or_else(|| {
        Error::new(
            field_pos(field_details_list),
            Some(path.to_vec()),
            QueryError::AbstractTypeMustResolveToObject {
                type_name: abstract_name.to_string(),
                parent_type: path.last_field().map(|(_, p)| p.to_string()).unwrap_or_default(),
                field_name: path.last_field().map(|(f, _)| f.to_string()).unwrap_or_default(),
            },
        )
    })?;

    match ctx.args.schema.get_type(&runtime_type_name) {
        Some(SchemaType::Object(_)) => {}
        Some(_) => {
            return Err(Error::new(
                field_pos(field_details_list),
                Some(path.to_vec()),
                QueryError::InvalidRuntimeType {
                    runtime_type: runtime_type_name,
                    abstract_type: abstract_name.to_string(),
                },
            ))
        }
        None => {
            return Err(Error::new(
                field_pos(field_details_list),
                Some(path.to_vec()),
                QueryError::UnknownRuntimeType { type_name: runtime_type_name },
            ))
        }
    }

    if !abstract_type.is_possible_type(&runtime_type_name) {
        return Err(Error::new(
            field_pos(field_details_list),
            Some(path.to_vec()),
            QueryError::InvalidRuntimeType {
                runtime_type: runtime_type_name,
                abstract_type: abstract_name.to_string(),
            },
        ));
    }

    complete_object_value(
        ctx,
        &runtime_type_name,
        field_details_list,
        path,
        parent_defer_usages,
        result,
    )
    .await
}

async fn complete_object_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type_name: &'a str,
    field_details_list: &'a [FieldDetails],
    path: &'a Path,
    parent_defer_usages: &'a DeferUsageSet,
    result: serde_json::Value,
) -> CompletionResult {
    ctx.check_not_completed(path)?;

    let object = match ctx.args.schema.get_type(object_type_name) {
        Some(SchemaType::Object(obj)) => obj,
        _ => {
            return Err(Error::new(
                field_pos(field_details_list),
                Some(path.to_vec()),
                QueryError::UnknownRuntimeType {
                    type_name: object_type_name.to_string(),
                },
            ))
        }
    };

    if let Some(is_type_of) = &object.is_type_of {
        if !is_type_of(&result, &default_data()).await {
            return Err(Error::new(
                field_pos(field_details_list),
                Some(path.to_vec()),
                QueryError::InvalidRuntimeType {
                    runtime_type: object_type_name.to_string(),
                    abstract_type: object_type_name.to_string(),
                },
            ));
        }
    }

    let collected = super::collect::collect_fields(
        ctx,
        object_type_name,
        merged_selection_set(field_details_list),
        field_details_list.first().and_then(|d| d.defer_usage.clone()),
        field_details_list.first().and_then(|d| d.fragment_variable_values.clone()),
    );

    let plan = super::plan::build_execution_plan(&collected.grouped_field_set, parent_defer_usages);

    let mut wrapped = super::field::execute_grouped_field_set(
        ctx,
        &plan.grouped_field_set,
        object_type_name,
        &result,
        path,
        false,
    )
    .await?;

    for (_defer_set, bucket) in plan.new_grouped_field_sets {
        let record = super::orchestrate::run_deferred_bucket(ctx, object_type_name, &result, path, bucket).await;
        wrapped.incremental_data_records.push(record);
    }

    Ok(wrapped)
}

fn merged_selection_set(field_details_list: &[FieldDetails]) -> &crate::ast::SelectionSet {
    // All merged occurrences share structurally-equivalent selections in a
    // validated document; the first is representative.
    &field_details_list[0].node.selection_set.node
}
