//! Variable coercion exercised end to end through the orchestrator: a
//! field argument wired to `$var`, driven by raw JSON variable input built
//! by hand (this crate doesn't parse query text or `$var` references from
//! source).

use std::sync::Arc;

use async_graphql_core::context::{ExecutionFlags, ResolverDefaults};
use async_graphql_core::execution::orchestrate::{execute, ExecuteArgs};
use async_graphql_core::future::MaybeFuture;
use async_graphql_core::schema::{
    FieldDefinition, InputObjectType, InputValueDefinition, ObjectType, ResolverContext, Schema,
    Type as SchemaType, TypeRef,
};
use async_graphql_core::ast;

use indexmap::IndexMap;

fn int_val_field() -> FieldDefinition {
    FieldDefinition::new("intVal", TypeRef::NonNull(Box::new(TypeRef::Named("Int".into()))))
        .argument(InputValueDefinition::new(
            "value",
            TypeRef::NonNull(Box::new(TypeRef::Named("Int".into()))),
        ))
        .resolve(Arc::new(|ctx: ResolverContext<'_>| {
            let value = ctx.args.get("value").cloned().unwrap_or(serde_json::Value::Null);
            MaybeFuture::ready(Ok(Some(value)))
        }))
}

fn nullable_int_val_field() -> FieldDefinition {
    FieldDefinition::new("intVal", TypeRef::Named("Int".into()))
        .argument(InputValueDefinition::new("value", TypeRef::Named("Int".into())))
        .resolve(Arc::new(|ctx: ResolverContext<'_>| {
            let value = ctx.args.get("value").cloned().unwrap_or(serde_json::Value::Null);
            MaybeFuture::ready(Ok(Some(value)))
        }))
}

fn field_with_variable_argument(field_name: &str, arg_name: &str, var_name: &str) -> ast::Positioned<ast::Field> {
    ast::Positioned::new(
        ast::Pos::default(),
        ast::Field {
            alias: None,
            name: ast::Positioned::new(ast::Pos::default(), field_name.to_string()),
            arguments: vec![(
                ast::Positioned::new(ast::Pos::default(), arg_name.to_string()),
                ast::Positioned::new(ast::Pos::default(), ast::Value::Variable(var_name.to_string())),
            )],
            directives: Vec::new(),
            selection_set: ast::Positioned::new(ast::Pos::default(), ast::SelectionSet::default()),
        },
    )
}

fn document_with_variable(
    field: ast::Positioned<ast::Field>,
    var_name: &str,
    var_type: ast::Type,
    default_value: Option<ast::Value>,
) -> ast::Document {
    let mut selection = ast::SelectionSet::default();
    selection.items.push(ast::Selection::Field(field));

    let operation = ast::OperationDefinition {
        ty: ast::OperationType::Query,
        name: None,
        variable_definitions: vec![ast::Positioned::new(
            ast::Pos::default(),
            ast::VariableDefinition {
                name: ast::Positioned::new(ast::Pos::default(), var_name.to_string()),
                var_type: ast::Positioned::new(ast::Pos::default(), var_type),
                default_value: default_value.map(|v| ast::Positioned::new(ast::Pos::default(), v)),
            },
        )],
        directives: Vec::new(),
        selection_set: ast::Positioned::new(ast::Pos::default(), selection),
    };
    ast::Document {
        operations: vec![ast::Positioned::new(ast::Pos::default(), operation)],
        fragments: IndexMap::new(),
    }
}

fn execute_args<'a>(
    schema: &'a Schema,
    document: &'a ast::Document,
    raw_variables: &'a serde_json::Map<String, serde_json::Value>,
) -> ExecuteArgs<'a> {
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

#[async_std::test]
async fn supplied_variable_value_flows_to_the_argument() {
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(int_val_field())));

    let document = document_with_variable(
        field_with_variable_argument("intVal", "value", "intVal"),
        "intVal",
        ast::Type::NonNull(Box::new(ast::Type::Named("Int".into()))),
        None,
    );
    let mut raw_variables = serde_json::Map::new();
    raw_variables.insert("intVal".to_string(), serde_json::json!(10));

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"intVal": 10})));
}

#[async_std::test]
async fn omitted_variable_falls_back_to_its_declared_default() {
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(int_val_field())));

    let document = document_with_variable(
        field_with_variable_argument("intVal", "value", "intVal"),
        "intVal",
        ast::Type::Named("Int".into()),
        Some(ast::Value::Int(10)),
    );
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"intVal": 10})));
}

#[async_std::test]
async fn omitted_nullable_variable_with_no_default_resolves_to_null() {
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(nullable_int_val_field())));

    let document = document_with_variable(
        field_with_variable_argument("intVal", "value", "intVal"),
        "intVal",
        ast::Type::Named("Int".into()),
        None,
    );
    let raw_variables = serde_json::Map::new();

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"intVal": null})));
}

#[async_std::test]
async fn explicit_null_overrides_the_declared_default() {
    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::Object(ObjectType::new("Query").field(nullable_int_val_field())));

    let document = document_with_variable(
        field_with_variable_argument("intVal", "value", "intVal"),
        "intVal",
        ast::Type::Named("Int".into()),
        Some(ast::Value::Int(10)),
    );
    let mut raw_variables = serde_json::Map::new();
    raw_variables.insert("intVal".to_string(), serde_json::Value::Null);

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"intVal": null})));
}

#[async_std::test]
async fn variable_reference_resolves_inside_an_input_object_field() {
    let test_field = FieldDefinition::new("test", TypeRef::NonNull(Box::new(TypeRef::Named("Int".into()))))
        .argument(InputValueDefinition::new("input", TypeRef::Named("PointInput".into())))
        .resolve(Arc::new(|ctx: ResolverContext<'_>| {
            let x = ctx
                .args
                .get("input")
                .and_then(|v| v.get("x"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            MaybeFuture::ready(Ok(Some(serde_json::json!(x))))
        }));

    let schema = Schema::new("Query")
        .type_(SchemaType::Scalar(async_graphql_core::schema::scalars::int()))
        .type_(SchemaType::InputObject(
            InputObjectType::new("PointInput").field(InputValueDefinition::new(
                "x",
                TypeRef::NonNull(Box::new(TypeRef::Named("Int".into()))),
            )),
        ))
        .type_(SchemaType::Object(ObjectType::new("Query").field(test_field)));

    let mut input_fields = IndexMap::new();
    input_fields.insert("x".to_string(), ast::Value::Variable("value".to_string()));

    let field = ast::Positioned::new(
        ast::Pos::default(),
        ast::Field {
            alias: None,
            name: ast::Positioned::new(ast::Pos::default(), "test".to_string()),
            arguments: vec![(
                ast::Positioned::new(ast::Pos::default(), "input".to_string()),
                ast::Positioned::new(ast::Pos::default(), ast::Value::Object(input_fields)),
            )],
            directives: Vec::new(),
            selection_set: ast::Positioned::new(ast::Pos::default(), ast::SelectionSet::default()),
        },
    );

    let document = document_with_variable(
        field,
        "value",
        ast::Type::NonNull(Box::new(ast::Type::Named("Int".into()))),
        None,
    );
    let mut raw_variables = serde_json::Map::new();
    raw_variables.insert("value".to_string(), serde_json::json!(10));

    let response = execute(execute_args(&schema, &document, &raw_variables)).await;

    assert!(response.is_ok());
    assert_eq!(response.data, Some(serde_json::json!({"test": 10})));
}
