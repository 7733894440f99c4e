//! End-to-end execution scenarios: build a runtime schema and an AST
//! document by hand (this crate doesn't parse query text), then drive it
//! through the orchestrator and check the response shape.

use std::sync::{Arc, Mutex};

use async_graphql_core::context::{ExecutionFlags, ResolverDefaults};
use async_graphql_core::execution::orchestrate::{execute, execute_incrementally, ExecuteArgs, ExecutionOutcome};
use async_graphql_core::future::MaybeFuture;
use async_graphql_core::schema::{
    FieldDefinition, InterfaceType, ObjectType, ResolverContext, Schema, Type as SchemaType, TypeRef,
};
use async_graphql_core::ast;

use indexmap::IndexMap;
use futures::stream::StreamExt;

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

fn field_with_selection(name: &str, selection: ast::SelectionSet) -> ast::Positioned<ast::Field> {
    let mut f = field(name);
    f.node.selection_set = ast::Positioned::new(ast::Pos::default(), selection);
    f
}

fn selection_set_of(fields: Vec<ast::Positioned<ast::Field>>) -> ast::SelectionSet {
    let mut set = ast::SelectionSet::default();
    for f in fields {
        set.items.push(ast::Selection::Field(f));
    }
    set
}

fn query_document(selection: ast::SelectionSet) -> ast::Document {
    operation_document(ast::OperationType::Query, selection)
}

fn operation_document(ty: ast::OperationType, selection: ast::SelectionSet) -> ast::Document {
    let operation = ast::OperationDefinition {
        ty,
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

fn execute_args<'a>(schema: &'a Schema, document: &'a ast::Document, raw_variables: &'a serde_json::Map<String, serde_json::Value>) -> ExecuteArgs<'a> {
    ExecuteArgs {
        schema,
        document,
        operation_name: None,
        root_value: serde_json::Value::Null,
        raw_variable_values: raw_variables,
        resolver_defaults: ResolverDefaults::default(),
        flags: ExecutionFlags::default(),
        abort_signal: None,
    }
}

/// S1: a basic query resolves one scalar field.
#[async_std::test]
async fn basic_query_resolves_a_scalar_field() {
    let field_def = FieldDefinition::new("hello", TypeRef::Named("String".into())).resolve(Arc::new(
        |_ctx: ResolverContext<'_>| MaybeFuture::ready(Ok(Some(serde_json::json!("world")))),
    ));
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::string()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(field_def)));

    let document = query_document(selection_set_of(vec![field("hello")]));
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"hello": "world"})));
}

/// S2: a resolver error under a non-null field bubbles to the root, and
/// the whole response's `data` becomes absent rather than partially null.
#[async_std::test]
async fn non_null_field_error_bubbles_to_the_root() {
    let field_def = FieldDefinition::new("mustExist", TypeRef::NonNull(Box::new(TypeRef::Named("String".into()))))
        .resolve(Arc::new(|_ctx: ResolverContext<'_>| {
            MaybeFuture::ready(Err(async_graphql_core::FieldError::new("boom")))
        }));
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::string()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(field_def)));

    let document = query_document(selection_set_of(vec![field("mustExist")]));
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(!response.is_ok());
    assert!(response.data.is_none());
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("boom"));
}

/// S3: sibling fields execute concurrently but still merge into the
/// response in their declared order.
#[async_std::test]
async fn sibling_fields_execute_in_parallel_and_merge_in_order() {
    let a = FieldDefinition::new("a", TypeRef::Named("Int".into())).resolve(Arc::new(
        |_ctx: ResolverContext<'_>| MaybeFuture::ready(Ok(Some(serde_json::json!(1)))),
    ));
    let b = FieldDefinition::new("b", TypeRef::Named("Int".into())).resolve(Arc::new(
        |_ctx: ResolverContext<'_>| MaybeFuture::ready(Ok(Some(serde_json::json!(2)))),
    ));
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(a).field(b)));

    let document = query_document(selection_set_of(vec![field("a"), field("b")]));
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"a": 1, "b": 2})));
}

/// S4: mutation root fields execute serially, in document order.
#[async_std::test]
async fn mutation_fields_execute_serially_in_document_order() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let log_first = log.clone();
    let first = FieldDefinition::new("first", TypeRef::Named("Boolean".into())).resolve(Arc::new(
        move |_ctx: ResolverContext<'_>| {
            log_first.lock().unwrap().push("first");
            MaybeFuture::ready(Ok(Some(serde_json::json!(true))))
        },
    ));
    let log_second = log.clone();
    let second = FieldDefinition::new("second", TypeRef::Named("Boolean".into())).resolve(Arc::new(
        move |_ctx: ResolverContext<'_>| {
            log_second.lock().unwrap().push("second");
            MaybeFuture::ready(Ok(Some(serde_json::json!(true))))
        },
    ));

    let schema = Schema::new("Query")
        .mutation_type("Mutation")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::boolean()))
        .type_(SchemaType::Object(ObjectType::new("Query")))
        .type_(SchemaType::Object(ObjectType::new("Mutation").field(first).field(second)));

    let document = operation_document(
        ast::OperationType::Mutation,
        selection_set_of(vec![field("first"), field("second")]),
    );
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

/// S5: an interface-typed field resolves its concrete runtime type from
/// the resolved value's own `__typename`, without a `resolveType` hook.
#[async_std::test]
async fn abstract_type_resolves_via_typename_on_the_value() {
    let node_id = FieldDefinition::new("id", TypeRef::NonNull(Box::new(TypeRef::Named("String".into()))));
    let dog_id = FieldDefinition::new("id", TypeRef::NonNull(Box::new(TypeRef::Named("String".into()))));
    let dog_name = FieldDefinition::new("name", TypeRef::Named("String".into()));

    let node_field = FieldDefinition::new("node", TypeRef::Named("Node".into())).resolve(Arc::new(
        |_ctx: ResolverContext<'_>| {
            MaybeFuture::ready(Ok(Some(serde_json::json!({
                "__typename": "Dog",
                "id": "1",
                "name": "Rex",
            }))))
        },
    ));

    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::string()))
        .type_(SchemaType::Interface(InterfaceType::new("Node").field(node_id).possible_type("Dog")))
        .type_(SchemaType::Object(ObjectType::new("Dog").field(dog_id).field(dog_name).implements("Node")))
        .type_(SchemaType::Object(ObjectType::new("Query").field(node_field)));

    let mut dog_fragment_fields = ast::SelectionSet::default();
    dog_fragment_fields.items.push(ast::Selection::Field(field("name")));
    let inline = ast::Positioned::new(
        ast::Pos::default(),
        ast::InlineFragment {
            type_condition: Some(ast::Positioned::new(
                ast::Pos::default(),
                ast::TypeCondition { on: "Dog".to_string() },
            )),
            directives: Vec::new(),
            selection_set: ast::Positioned::new(ast::Pos::default(), dog_fragment_fields),
        },
    );
    let mut node_selection = ast::SelectionSet::default();
    node_selection.items.push(ast::Selection::Field(field("id")));
    node_selection.items.push(ast::Selection::InlineFragment(inline));

    let document = query_document(selection_set_of(vec![field_with_selection("node", node_selection)]));
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(
        response.data,
        Some(serde_json::json!({"node": {"id": "1", "name": "Rex"}}))
    );
}

/// S6: a list field under `@stream` hands its later items to the
/// incremental publisher instead of the initial payload.
#[async_std::test]
async fn stream_directive_defers_later_list_items() {
    let xs = FieldDefinition::new("xs", TypeRef::List(Box::new(TypeRef::Named("Int".into()))))
        .resolve(Arc::new(|_ctx: ResolverContext<'_>| {
            MaybeFuture::ready(Ok(Some(serde_json::json!([10, 20]))))
        }));
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(xs)));

    let mut streamed_xs = field("xs");
    streamed_xs.node.directives.push(ast::Positioned::new(
        ast::Pos::default(),
        ast::Directive {
            name: "stream".to_string(),
            arguments: vec![(
                ast::Positioned::new(ast::Pos::default(), "initialCount".to_string()),
                ast::Positioned::new(ast::Pos::default(), ast::Value::Int(1)),
            )],
        },
    ));

    let document = query_document(selection_set_of(vec![streamed_xs]));
    let raw_variables = serde_json::Map::new();

    let outcome = execute_incrementally(execute_args(&schema, &document, &raw_variables)).await;

    match outcome {
        ExecutionOutcome::Incremental(mut result) => {
            assert_eq!(result.initial.data, serde_json::json!({"xs": [10]}));
            assert!(result.initial.has_next);
            let subsequent = result.subsequent_results.next().await.expect("one payload");
            assert_eq!(subsequent.incremental.len(), 1);
        }
        ExecutionOutcome::Complete(_) => panic!("expected an incremental result"),
        ExecutionOutcome::Subscription(_) => panic!("expected an incremental result"),
    }
}
