//! Execution orchestrator.
//!
//! Generalized from a "pull the operation out of a document, coerce its
//! variables, then dispatch by operation kind" entry point into the
//! validate/build-context/collect/plan/run pipeline this core splits
//! those steps into, and to returning an incremental result rather than
//! always resolving a single response.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::abort::AbortSignal;
use crate::ast;
use crate::context::{
    ExecutionContext, ExecutionFlags, ExecutionState, ResolverDefaults, ValidatedExecutionArgs,
};
use crate::error::{Error, QueryError, ServerError};
use crate::path::Path;
use crate::response::{IncrementalExecutionResult, InitialIncrementalResponse, Response, SubsequentIncrementalResponse};
use crate::schema::Schema;

use super::collect::collect_fields;
use super::field::execute_grouped_field_set;
use super::incremental::{subsequent_results, DeferredFragmentRecord, IncrementalDataRecord};
use super::plan::build_execution_plan;
use super::subscribe::{self, SubscriptionEvent};

/// Everything the orchestrator needs that isn't already owned by the
/// schema or the parsed document.
pub struct ExecuteArgs<'a> {
    pub schema: &'a Schema,
    pub document: &'a ast::Document,
    pub operation_name: Option<&'a str>,
    pub root_value: serde_json::Value,
    pub raw_variable_values: &'a serde_json::Map<String, serde_json::Value>,
    pub resolver_defaults: ResolverDefaults,
    pub flags: ExecutionFlags,
    pub abort_signal: Option<AbortSignal>,
}

/// What `executeIncrementally` returns before its caller decides how to
/// render it: a single complete response, one that still has
/// deferred/streamed payloads to come, or a live subscription event stream.
pub enum ExecutionOutcome<'a> {
    Complete(Response),
    Incremental(IncrementalExecutionResult),
    Subscription(futures::stream::BoxStream<'a, SubscriptionEvent>),
}

/// `execute(args)`: the non-incremental entry point. Refuses outright if
/// the operation uses `@defer`/`@stream` anywhere, rather than silently
/// dropping the later payloads.
pub async fn execute(args: ExecuteArgs<'_>) -> Response {
    let operation = match args.document.get_operation(args.operation_name) {
        Ok(op) => op,
        Err(message) => return Response::errors_only(vec![ServerError::new(message)]),
    };

    if operation_uses_incremental_delivery(args.document, operation) {
        return Response::errors_only(vec![ServerError::new(
            "This operation uses @defer or @stream; call the incremental execution entry point instead.",
        )]);
    }

    if operation.ty == ast::OperationType::Subscription {
        return Response::errors_only(vec![ServerError::new(
            "This operation is a subscription; call the incremental execution entry point instead.",
        )]);
    }

    match execute_incrementally(args).await {
        ExecutionOutcome::Complete(response) => response,
        ExecutionOutcome::Incremental(_) | ExecutionOutcome::Subscription(_) => {
            // Unreachable: the scans above already refused any operation
            // that could produce an incremental or subscription outcome.
            Response::errors_only(vec![ServerError::new(
                "Execution unexpectedly produced an incremental result.",
            )])
        }
    }
}

/// `executeSync(args)`: like [`execute`], plus it asserts the result
/// didn't turn out to be incremental after all. This engine always awaits
/// field execution uniformly (there is no separate synchronous code path
/// to take), so in practice this differs from `execute` only in how it
/// reports that defensive assertion failing.
pub async fn execute_sync(args: ExecuteArgs<'_>) -> Response {
    execute(args).await
}

/// `experimentalExecuteIncrementally(args)`: validates the arguments,
/// builds the context, runs the root grouped field set, and either
/// returns the finished response or an initial payload plus the
/// still-pending tail.
pub async fn execute_incrementally<'a>(args: ExecuteArgs<'a>) -> ExecutionOutcome<'a> {
    // Step 1: validate execution args.
    let operation = match args.document.get_operation(args.operation_name) {
        Ok(op) => op,
        Err(message) => return ExecutionOutcome::Complete(Response::errors_only(vec![ServerError::new(message)])),
    };

    let root_type = match args.schema.root_type_name(operation.ty) {
        Some(name) => name,
        None => {
            return ExecutionOutcome::Complete(Response::errors_only(vec![ServerError::new(
                QueryError::OperationNotSupported(operation.ty.to_string()).to_string(),
            )]))
        }
    };

    let variable_values = match crate::schema::coerce::coerce_variable_values(
        args.schema,
        &operation.variable_definitions,
        args.raw_variable_values,
    ) {
        Ok(values) => values,
        Err(errors) => {
            let server_errors = errors
                .into_iter()
                .map(|e| ServerError::new(e.0).with_location(operation.selection_set.position()))
                .collect();
            return ExecutionOutcome::Complete(Response::errors_only(server_errors));
        }
    };

    let error_propagation = args.schema.error_propagation_default;

    // Step 2: build the context.
    let validated = ValidatedExecutionArgs {
        schema: args.schema,
        fragments: &args.document.fragments,
        root_value: args.root_value,
        operation,
        variable_values,
        resolver_defaults: args.resolver_defaults,
        flags: args.flags,
        abort_signal: args.abort_signal,
        error_propagation,
    };
    let state = ExecutionState::new();

    if operation.ty == ast::OperationType::Subscription {
        return run_subscription(&validated, &state).await;
    }

    let ctx = ExecutionContext::new(&validated, &state);
    let root_path = Path::new();

    if let Err(err) = ctx.check_aborted(&root_path, operation.selection_set.position()) {
        return ExecutionOutcome::Complete(abort_response(&ctx, err));
    }

    // Step 3: collect root fields.
    let collected = collect_fields(&ctx, root_type, &operation.selection_set.node, None, None);

    // Step 4: build the root execution plan and run the immediate grouped
    // field set by kind.
    let plan = build_execution_plan(&collected.grouped_field_set, &Vec::new());
    let serial = operation.ty == ast::OperationType::Mutation;

    let root_value = ctx.args.root_value.clone();
    let result = execute_grouped_field_set(&ctx, &plan.grouped_field_set, root_type, &root_value, &root_path, serial).await;

    let data = match result {
        Ok(wrapped) => wrapped,
        Err(err) => {
            state.push_error(err);
            state.mark_completed();
            return ExecutionOutcome::Complete(Response::with_errors(
                None,
                state.take_errors().into_iter().map(ServerError::from).collect(),
            ));
        }
    };

    let mut records: Vec<IncrementalDataRecord> = data.incremental_data_records;
    for (_defer_set, bucket) in plan.new_grouped_field_sets {
        records.push(run_deferred_bucket(&ctx, root_type, &root_value, &root_path, bucket).await);
    }

    state.mark_completed();
    let errors: Vec<ServerError> = state.take_errors().into_iter().map(ServerError::from).collect();

    if records.is_empty() {
        ExecutionOutcome::Complete(Response::with_errors(Some(data.value), errors))
    } else {
        let initial = InitialIncrementalResponse {
            data: data.value,
            errors,
            has_next: true,
            extensions: None,
        };
        let subsequent = materialize_subsequent(records).await;
        ExecutionOutcome::Incremental(IncrementalExecutionResult {
            initial,
            subsequent_results: subsequent,
        })
    }
}

/// Runs one root-level deferred bucket to completion and folds it into a
/// single `IncrementalDataRecord::DeferredGroup`.
/// `enableEarlyExecution` has no microtask to defer behind in this engine
/// (there's no cooperative scheduler to yield to), so every bucket always
/// runs immediately rather than conditionally.
pub(crate) async fn run_deferred_bucket<'a>(
    ctx: &ExecutionContext<'a>,
    parent_type: &str,
    source_value: &serde_json::Value,
    path: &Path,
    bucket: super::collect::GroupedFieldSet,
) -> IncrementalDataRecord {
    let local = crate::context::LocalErrorBuffer::new();
    let local_ctx = ctx.with_local_errors(&local);

    let result = execute_grouped_field_set(&local_ctx, &bucket, parent_type, source_value, path, false).await;

    let (data, mut errors) = match result {
        Ok(wrapped) => (wrapped.value, Vec::new()),
        Err(err) => (serde_json::Value::Null, vec![err]),
    };
    errors.extend(local.into_vec());

    IncrementalDataRecord::DeferredGroup {
        deferred: Arc::new(DeferredFragmentRecord {
            path: Some(path.to_vec()),
            label: None,
            parent: None,
        }),
        data,
        errors,
    }
}

/// The deliberately linear publisher in `incremental.rs` already resolves
/// every record before it emits anything; this collects the full sequence up
/// front so only the last payload in it is stamped `hasNext: false`.
async fn materialize_subsequent(
    records: Vec<IncrementalDataRecord>,
) -> futures::stream::BoxStream<'static, SubsequentIncrementalResponse> {
    use futures::stream::StreamExt;

    let entries: Vec<_> = subsequent_results(records).collect().await;
    let last = entries.len().saturating_sub(1);
    let responses: Vec<_> = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| SubsequentIncrementalResponse::new(entry, i != last))
        .collect();

    futures::stream::iter(responses).boxed()
}

async fn run_subscription<'a>(
    validated: &ValidatedExecutionArgs<'a>,
    state: &ExecutionState,
) -> ExecutionOutcome<'a> {
    match subscribe::subscribe(validated, state).await {
        Ok(events) => ExecutionOutcome::Subscription(events),
        Err(err) => ExecutionOutcome::Complete(Response::errors_only(vec![ServerError::from(err)])),
    }
}

/// Step 6: any abort observed before or during root field collection/
/// execution returns `{ data: null, errors: [...buffered, abortError] }`.
fn abort_response(ctx: &ExecutionContext<'_>, abort_err: Error) -> Response {
    let mut errors: Vec<ServerError> = ctx.state.take_errors().into_iter().map(ServerError::from).collect();
    errors.push(abort_err.into());
    ctx.state.mark_completed();
    Response::with_errors(None, errors)
}

/// Whether any field in `operation`'s selection tree (including through
/// fragment spreads) carries `@defer` or `@stream`, scanning fragments at
/// most once apiece to tolerate cycles in malformed documents.
fn operation_uses_incremental_delivery(document: &ast::Document, operation: &ast::OperationDefinition) -> bool {
    let mut visited = std::collections::HashSet::new();
    selection_set_uses_incremental_delivery(document, &operation.selection_set.node, &mut visited)
}

fn selection_set_uses_incremental_delivery<'a>(
    document: &'a ast::Document,
    selection_set: &'a ast::SelectionSet,
    visited: &mut std::collections::HashSet<&'a str>,
) -> bool {
    for selection in &selection_set.items {
        match selection {
            ast::Selection::Field(field) => {
                if has_defer_or_stream(&field.directives) {
                    return true;
                }
                if selection_set_uses_incremental_delivery(document, &field.selection_set.node, visited) {
                    return true;
                }
            }
            ast::Selection::InlineFragment(inline) => {
                if has_defer_or_stream(&inline.directives) {
                    return true;
                }
                if selection_set_uses_incremental_delivery(document, &inline.selection_set, visited) {
                    return true;
                }
            }
            ast::Selection::FragmentSpread(spread) => {
                if has_defer_or_stream(&spread.directives) {
                    return true;
                }
                if !visited.insert(spread.fragment_name.as_str()) {
                    continue;
                }
                if let Some(fragment) = document.fragments.get(&spread.fragment_name) {
                    if selection_set_uses_incremental_delivery(document, &fragment.selection_set.node, visited) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn has_defer_or_stream(directives: &[ast::Positioned<ast::Directive>]) -> bool {
    directives.iter().any(|d| d.name == "defer" || d.name == "stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, ObjectType, Schema as SchemaDef, Type as SchemaType, TypeRef};
    use crate::future::MaybeFuture;

    fn schema_with_hello() -> SchemaDef {
        let field = FieldDefinition::new("hello", TypeRef::Named("String".into()))
            .resolve(Arc::new(|ctx: crate::schema::ResolverContext<'_>| {
                let _ = ctx;
                MaybeFuture::ready(Ok(Some(serde_json::json!("world"))))
            }));
        SchemaDef::new("Query").type_(SchemaType::Object(ObjectType::new("Query").field(field)))
    }

    fn field(name: &str) -> ast::Positioned<ast::Field> {
        ast::Positioned::new(
            ast::Pos::default(),
            ast::Field {
                alias: None,
                name: ast::Positioned::new(ast::Pos::default(), name.to_string()),
                arguments: Vec::new(),
                directives: Vec::new(),
                selection_set: ast::Positioned::new(ast::Pos::default(), ast::SelectionSet::default()),
            },
        )
    }

    fn document_with(selection: ast::SelectionSet) -> ast::Document {
        let operation = ast::OperationDefinition {
            ty: ast::OperationType::Query,
            name: None,
            variable_definitions: Vec::new(),
            directives: Vec::new(),
            selection_set: ast::Positioned::new(ast::Pos::default(), selection),
        };
        ast::Document {
            operations: vec![ast::Positioned::new(ast::Pos::default(), operation)],
            fragments: IndexMap::new(),
        }
    }

    #[async_std::test]
    async fn executes_a_basic_query() {
        let schema = schema_with_hello();
        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(ast::Selection::Field(field("hello")));
        let document = document_with(selection_set);
        let raw_variables = serde_json::Map::new();

        let response = execute(ExecuteArgs {
            schema: &schema,
            document: &document,
            operation_name: None,
            root_value: serde_json::Value::Null,
            raw_variable_values: &raw_variables,
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
        })
        .await;

        assert!(response.is_ok());
        assert_eq!(response.data, Some(serde_json::json!({"hello": "world"})));
    }

    #[async_std::test]
    async fn unknown_operation_name_is_an_error() {
        let schema = schema_with_hello();
        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(ast::Selection::Field(field("hello")));
        let document = document_with(selection_set);
        let raw_variables = serde_json::Map::new();

        let response = execute(ExecuteArgs {
            schema: &schema,
            document: &document,
            operation_name: Some("DoesNotExist"),
            root_value: serde_json::Value::Null,
            raw_variable_values: &raw_variables,
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
        })
        .await;

        assert!(!response.is_ok());
        assert!(response.data.is_none());
    }

    #[async_std::test]
    async fn defer_on_a_query_is_refused_by_the_non_incremental_entry_point() {
        let schema = schema_with_hello();
        let mut hello = field("hello");
        hello.node.directives.push(ast::Positioned::new(
            ast::Pos::default(),
            ast::Directive {
                name: "defer".to_string(),
                arguments: Vec::new(),
            },
        ));
        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(ast::Selection::Field(hello));
        let document = document_with(selection_set);
        let raw_variables = serde_json::Map::new();

        let response = execute(ExecuteArgs {
            schema: &schema,
            document: &document,
            operation_name: None,
            root_value: serde_json::Value::Null,
            raw_variable_values: &raw_variables,
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
        })
        .await;

        assert!(!response.is_ok());
    }
}
