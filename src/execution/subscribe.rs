//! Subscription driver.
//!
//! Generalized from a `SubscriptionType::create_field_stream`-style
//! "resolve one root field to an event source" shape onto a runtime
//! schema that carries its own `subscribe` hook per field instead of a
//! derive-macro trait impl.

use futures::stream::{BoxStream, StreamExt};

use crate::ast;
use crate::context::{ExecutionContext, ExecutionState, ValidatedExecutionArgs};
use crate::error::{Error, FieldError, QueryError, ServerError};
use crate::path::Path;
use crate::schema::ResolverContext;

use super::collect::collect_fields;
use super::field::execute_grouped_field_set;
use super::plan::build_execution_plan;

/// One event's worth of the mapped event-stream sequence — the same
/// `{ data, errors? }` shape a single-result query execution would
/// produce.
pub struct SubscriptionEvent {
    pub data: serde_json::Value,
    pub errors: Vec<ServerError>,
}

/// Drives one subscription operation: resolves its root field to an event
/// source, then maps every event into its own query-style execution.
///
/// `validated` must already carry a subscription-typed operation; the
/// caller (the orchestrator) is responsible for step 1, "validate
/// arguments." Takes `validated`/`state` rather than a borrowed
/// `ExecutionContext` so the returned stream can outlive the function's
/// local `ExecutionState` — only `validated`'s own `'a` needs to survive.
pub async fn subscribe<'a>(
    validated: &ValidatedExecutionArgs<'a>,
    state: &ExecutionState,
) -> Result<BoxStream<'a, SubscriptionEvent>, Error> {
    let ctx = ExecutionContext::new(validated, state);
    let root_type = ctx.args.schema.subscription_type.as_deref().ok_or_else(|| {
        Error::new(
            ast::Pos::default(),
            None,
            QueryError::OperationNotSupported("subscription".to_string()),
        )
    })?;

    let collected = collect_fields(
        &ctx,
        root_type,
        &ctx.args.operation.selection_set.node,
        None,
        None,
    );

    // Validation upstream guarantees a subscription operation selects
    // exactly one root field; re-checking here is defensive.
    let (_response_key, details_list) = collected
        .grouped_field_set
        .0
        .iter()
        .next()
        .ok_or_else(|| {
            Error::new(
                ast::Pos::default(),
                None,
                QueryError::MustHaveSubFields {
                    parent_type: root_type.to_string(),
                },
            )
        })?;

    let first_node = &details_list[0].node;
    if first_node.directives.iter().any(|d| d.name == "defer" || d.name == "stream") {
        return Err(Error::new(
            first_node.position(),
            None,
            QueryError::DeferStreamOnSubscription,
        ));
    }

    let field_def = ctx
        .args
        .schema
        .get_field(root_type, &first_node.name.node)
        .ok_or_else(|| {
            Error::new(
                first_node.position(),
                None,
                QueryError::FieldNotFound {
                    field_name: first_node.name.node.clone(),
                    object: root_type.to_string(),
                },
            )
        })?;

    let variables = details_list[0]
        .fragment_variable_values
        .as_deref()
        .unwrap_or(&ctx.args.variable_values);

    let args = crate::schema::coerce::coerce_argument_values(
        ctx.args.schema,
        &field_def.arguments,
        &first_node.arguments,
        variables,
    )
    .map_err(|errors| {
        let message = errors.into_iter().map(|e| e.0).collect::<Vec<_>>().join("; ");
        Error::new(first_node.position(), None, QueryError::ArgumentCoercion(message))
    })?;

    let subscribe_fn = field_def
        .subscribe
        .clone()
        .or_else(|| ctx.args.resolver_defaults.subscribe_field_resolver.clone())
        .ok_or_else(|| {
            Error::new(
                first_node.position(),
                None,
                QueryError::SubscriptionFieldNotAsyncIterable {
                    received: "no subscribe resolver configured".to_string(),
                },
            )
        })?;

    let root_path = Path::new();
    let context_data = crate::schema::Data::new();
    let resolver_ctx = ResolverContext {
        source: &ctx.args.root_value,
        args: &args,
        field_name: &field_def.name,
        parent_type: root_type,
        return_type: &field_def.return_type,
        path: &root_path,
        context_data: &context_data,
        root_value: &ctx.args.root_value,
        abort_signal: ctx.abort_signal(),
    };

    let event_source = subscribe_fn(resolver_ctx).await.map_err(|field_err: FieldError| {
        Error::new(
            first_node.position(),
            None,
            QueryError::Other(field_err.message),
        )
    })?;

    let root_type = root_type.to_string();
    let base_args: ValidatedExecutionArgs<'a> = validated.clone();

    let events = event_source.then(move |payload| {
        let event_args = with_root_value(&base_args, payload);
        let root_type = root_type.clone();
        async move { run_one_event(event_args, &root_type).await }
    });

    Ok(events.boxed())
}

/// Shallow-clones the validated args, replacing `rootValue`.
fn with_root_value<'a>(
    args: &ValidatedExecutionArgs<'a>,
    root_value: serde_json::Value,
) -> ValidatedExecutionArgs<'a> {
    let mut cloned = args.clone();
    cloned.root_value = root_value;
    cloned
}

/// Runs the subscription's selection set once for a single event payload
/// (query-style: siblings, if any, execute in parallel rather than
/// serially) and collapses the result into `{ data, errors }`.
async fn run_one_event<'a>(event_args: ValidatedExecutionArgs<'a>, root_type: &str) -> SubscriptionEvent {
    let state = ExecutionState::new();
    let ctx = ExecutionContext::new(&event_args, &state);

    let collected = collect_fields(&ctx, root_type, &ctx.args.operation.selection_set.node, None, None);
    let plan = build_execution_plan(&collected.grouped_field_set, &Vec::new());

    let root_value = ctx.args.root_value.clone();
    let result = execute_grouped_field_set(
        &ctx,
        &plan.grouped_field_set,
        root_type,
        &root_value,
        &Path::new(),
        false,
    )
    .await;

    state.mark_completed();
    let mut errors: Vec<ServerError> = state.take_errors().into_iter().map(ServerError::from).collect();

    match result {
        Ok(wrapped) => SubscriptionEvent {
            data: wrapped.value,
            errors,
        },
        Err(err) => {
            errors.push(err.into());
            SubscriptionEvent {
                data: serde_json::Value::Null,
                errors,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionFlags, ResolverDefaults};
    use crate::future::MaybeFuture;
    use crate::schema::{FieldDefinition, ObjectType, Schema, Type as SchemaType, TypeRef};
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn schema_with_counter() -> Schema {
        let field = FieldDefinition::new("counter", TypeRef::Named("Int".into()))
            .resolve(Arc::new(|ctx: ResolverContext<'_>| {
                MaybeFuture::ready(Ok(ctx.source.as_i64().map(serde_json::Value::from)))
            }))
            .subscribe(Arc::new(|_ctx: ResolverContext<'_>| {
                Box::pin(async move {
                    Ok(futures::stream::iter(vec![
                        serde_json::json!(1),
                        serde_json::json!(2),
                    ])
                    .boxed())
                })
            }));

        Schema::new("Query")
            .subscription_type("Subscription")
            .type_(SchemaType::Scalar(crate::schema::scalars::int()))
            .type_(SchemaType::Object(ObjectType::new("Query")))
            .type_(SchemaType::Object(ObjectType::new("Subscription").field(field)))
    }

    fn operation(selection: ast::SelectionSet) -> ast::OperationDefinition {
        ast::OperationDefinition {
            ty: ast::OperationType::Subscription,
            name: None,
            variable_definitions: Vec::new(),
            directives: Vec::new(),
            selection_set: ast::Positioned::new(ast::Pos::default(), selection),
        }
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

    #[async_std::test]
    async fn maps_each_event_into_its_own_result() {
        let schema = schema_with_counter();
        let fragments = IndexMap::new();
        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(ast::Selection::Field(field("counter")));
        let operation = operation(selection_set);

        let args = ValidatedExecutionArgs {
            schema: &schema,
            fragments: &fragments,
            root_value: serde_json::Value::Null,
            operation: &operation,
            variable_values: IndexMap::new(),
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
            error_propagation: true,
        };
        let state = ExecutionState::new();

        let mut events = subscribe(&args, &state).await.expect("subscribe succeeds");
        let first = events.next().await.expect("first event");
        assert_eq!(first.data, serde_json::json!({"counter": 1}));
        let second = events.next().await.expect("second event");
        assert_eq!(second.data, serde_json::json!({"counter": 2}));
        assert!(events.next().await.is_none());
    }

    #[async_std::test]
    async fn missing_subscription_type_is_an_error() {
        let schema = Schema::new("Query").type_(SchemaType::Object(ObjectType::new("Query")));
        let fragments = IndexMap::new();
        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(ast::Selection::Field(field("counter")));
        let operation = operation(selection_set);

        let args = ValidatedExecutionArgs {
            schema: &schema,
            fragments: &fragments,
            root_value: serde_json::Value::Null,
            operation: &operation,
            variable_values: IndexMap::new(),
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
            error_propagation: true,
        };
        let state = ExecutionState::new();

        assert!(subscribe(&args, &state).await.is_err());
    }
}
