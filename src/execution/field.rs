//! Field executor and root dispatch.
//!
//! Generalized from static-trait `ObjectType::resolve_field` dispatch to
//! invoking a `FieldDefinition`'s closure hooks directly, and carrying the
//! non-null error-propagation-vs-absorb branch a fixed-behavior resolver
//! dispatch never needed to make configurable.

use futures::future::join_all;

use crate::context::ExecutionContext;
use crate::error::{Error, QueryError};
use crate::path::Path;
use crate::schema::{FieldDefinition, ResolverContext};

use super::collect::GroupedFieldSet;
use super::complete::{complete_value, CompletionResult};
use super::incremental::WrappedResult;

/// Runs one merged field-details-list: coerces its arguments, invokes the
/// resolver (or the context's default), and completes the result against
/// the field's declared return type.
async fn execute_field<'a>(
    ctx: &'a ExecutionContext<'a>,
    parent_type: &'a str,
    field_def: &'a FieldDefinition,
    details_list: &'a [super::collect::FieldDetails],
    source_value: &'a serde_json::Value,
    path: &'a Path,
) -> CompletionResult {
    let first_node = &details_list[0].node;

    let variables = details_list[0]
        .fragment_variable_values
        .as_deref()
        .unwrap_or(&ctx.args.variable_values);

    let args = match crate::schema::coerce::coerce_argument_values(
        ctx.args.schema,
        &field_def.arguments,
        &first_node.arguments,
        variables,
    ) {
        Ok(args) => args,
        Err(errors) => {
            let message = errors.into_iter().map(|e| e.0).collect::<Vec<_>>().join("; ");
            return Err(Error::new(
                first_node.position(),
                Some(path.to_vec()),
                QueryError::ArgumentCoercion(message),
            ));
        }
    };

    ctx.check_aborted(path, first_node.position())?;

    let span = tracing::trace_span!("resolve_field", parent_type, field = %field_def.name, path = %path_display(path));
    let _enter = span.enter();

    let resolver = field_def
        .resolve
        .clone()
        .or_else(|| ctx.args.resolver_defaults.field_resolver.clone());

    let resolved = match resolver {
        Some(resolve) => {
            let resolver_ctx = ResolverContext {
                source: source_value,
                args: &args,
                field_name: &field_def.name,
                parent_type,
                return_type: &field_def.return_type,
                path,
                context_data: &EMPTY_DATA,
                root_value: &ctx.args.root_value,
                abort_signal: ctx.abort_signal(),
            };
            resolve(resolver_ctx).await
        }
        None => Ok(default_resolve(source_value, &field_def.name)),
    };

    if let Err(field_err) = &resolved {
        tracing::debug!(error = %field_err.message, "resolver returned an error");
    }

    let value = match resolved {
        Ok(value) => value.unwrap_or(serde_json::Value::Null),
        Err(field_err) => {
            let located = Error::new(
                first_node.position(),
                Some(path.to_vec()),
                QueryError::Other(field_err.message),
            );
            if ctx.args.error_propagation && field_def.return_type.is_non_null() {
                return Err(located);
            }
            ctx.record_error(located);
            return Ok(WrappedResult::new(serde_json::Value::Null));
        }
    };

    let parent_defer_usages = details_list
        .iter()
        .filter_map(|d| d.defer_usage.clone())
        .fold(Vec::new(), |mut acc, usage| {
            if !acc.iter().any(|existing| std::sync::Arc::ptr_eq(existing, &usage)) {
                acc.push(usage);
            }
            acc
        });

    match complete_value(ctx, &field_def.return_type, details_list, path, &parent_defer_usages, value).await {
        Ok(wrapped) => Ok(wrapped),
        Err(err) => {
            if ctx.args.error_propagation && field_def.return_type.is_non_null() {
                Err(err)
            } else {
                ctx.record_error(err);
                Ok(WrappedResult::new(serde_json::Value::Null))
            }
        }
    }
}

// Request-scoped `Data` isn't reachable from nested object/list completion
// in this crate's API (it lives only on the top-level validated args in a
// fuller integration); field resolvers that need it read it off
// `ResolverContext::context_data`, which the orchestrator populates at the
// root. Nested calls reuse an empty bag rather than threading a borrow of
// the orchestrator's through every completion frame.
static EMPTY_DATA: once_cell::sync::Lazy<crate::schema::Data> =
    once_cell::sync::Lazy::new(crate::schema::Data::new);

fn default_resolve(source: &serde_json::Value, field_name: &str) -> Option<serde_json::Value> {
    source.get(field_name).cloned()
}

/// A dotted rendering of a response path for tracing fields (`a.b.2.c`).
fn path_display(path: &Path) -> String {
    path.to_vec()
        .into_iter()
        .map(|segment| match segment {
            crate::path::PathValue::Key(k) => k,
            crate::path::PathValue::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Executes a grouped field set against `parent_type`/`source_value`,
/// either serially (mutations) or with siblings interleaved (queries,
/// subscriptions, and object sub-selections).
pub async fn execute_grouped_field_set<'a>(
    ctx: &'a ExecutionContext<'a>,
    grouped_field_set: &'a GroupedFieldSet,
    parent_type: &'a str,
    source_value: &'a serde_json::Value,
    path: &'a Path,
    serial: bool,
) -> CompletionResult {
    if serial {
        execute_serially(ctx, grouped_field_set, parent_type, source_value, path).await
    } else {
        execute_in_parallel(ctx, grouped_field_set, parent_type, source_value, path).await
    }
}

async fn execute_serially<'a>(
    ctx: &'a ExecutionContext<'a>,
    grouped_field_set: &'a GroupedFieldSet,
    parent_type: &'a str,
    source_value: &'a serde_json::Value,
    path: &'a Path,
) -> CompletionResult {
    let mut out = serde_json::Map::new();
    let mut records = Vec::new();

    for (response_key, details_list) in &grouped_field_set.0 {
        let field_name = &details_list[0].node.name.node;
        let field_def = match ctx.args.schema.get_field(parent_type, field_name) {
            Some(def) => def,
            None => continue,
        };
        let field_path = path.push_field(response_key.clone(), parent_type.to_string());

        if ctx.is_completed() {
            out.insert(response_key.clone(), serde_json::Value::Null);
            continue;
        }

        match execute_field(ctx, parent_type, field_def, details_list, source_value, &field_path).await {
            Ok(wrapped) => {
                out.insert(response_key.clone(), wrapped.value);
                records.extend(wrapped.incremental_data_records);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(WrappedResult::with_records(serde_json::Value::Object(out), records))
}

async fn execute_in_parallel<'a>(
    ctx: &'a ExecutionContext<'a>,
    grouped_field_set: &'a GroupedFieldSet,
    parent_type: &'a str,
    source_value: &'a serde_json::Value,
    path: &'a Path,
) -> CompletionResult {
    let mut entries = Vec::with_capacity(grouped_field_set.0.len());

    for (response_key, details_list) in &grouped_field_set.0 {
        let field_name = &details_list[0].node.name.node;
        let field_def = match ctx.args.schema.get_field(parent_type, field_name) {
            Some(def) => def,
            None => continue,
        };
        let field_path = path.push_field(response_key.clone(), parent_type.to_string());
        entries.push((response_key.clone(), field_path, field_def, details_list));
    }

    let futures = entries.iter().map(|(_, field_path, field_def, details_list)| {
        let field_def: &FieldDefinition = field_def;
        let details_list: &[super::collect::FieldDetails] = details_list;
        execute_field(ctx, parent_type, field_def, details_list, source_value, field_path)
    });

    let results = join_all(futures).await;

    let mut out = serde_json::Map::new();
    let mut records = Vec::new();
    for ((response_key, _, _, _), result) in entries.iter().zip(results) {
        match result {
            Ok(wrapped) => {
                out.insert(response_key.clone(), wrapped.value);
                records.extend(wrapped.incremental_data_records);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(WrappedResult::with_records(serde_json::Value::Object(out), records))
}

