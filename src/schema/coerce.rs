//! Argument and variable coercion: turns AST literals and raw JSON
//! variable input into the coerced values a resolver actually receives.
//!
//! Built around a recursive input-value walk, generalized from a boolean
//! validity check into a value-producing coercion that also applies
//! defaults and unwraps variable references.

use indexmap::IndexMap;

use crate::ast::{self, Type as TypeRef};
use crate::error::{InputValueError, InputValueResult};

use super::{InputValueDefinition, Schema};

/// Coerce a single literal/variable AST value against a type reference.
///
/// `variables` holds the already-coerced, already-defaulted variable
/// values for the current operation; a bare `ast::Value::Variable` looks
/// itself up there rather than being coerced again.
pub fn coerce_value(
    schema: &Schema,
    ty: &TypeRef,
    value: &ast::Value,
    variables: &IndexMap<String, serde_json::Value>,
) -> InputValueResult<serde_json::Value> {
    if let ast::Value::Variable(name) = value {
        return match variables.get(name) {
            Some(v) => Ok(v.clone()),
            None => match ty {
                TypeRef::NonNull(_) => Err(InputValueError(format!(
                    "variable \"${}\" is not defined",
                    name
                ))),
                _ => Ok(serde_json::Value::Null),
            },
        };
    }

    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(InputValueError("expected a non-null value".to_string()));
            }
            coerce_value(schema, inner, value, variables)
        }
        TypeRef::List(inner) => {
            if value.is_null() {
                return Ok(serde_json::Value::Null);
            }
            match value {
                ast::Value::List(items) => items
                    .iter()
                    .map(|item| coerce_value(schema, inner, item, variables))
                    .collect::<InputValueResult<Vec<_>>>()
                    .map(serde_json::Value::Array),
                // A bare value coerced against a list type is wrapped in a
                // singleton list, per the GraphQL spec's input coercion rules.
                _ => coerce_value(schema, inner, value, variables)
                    .map(|v| serde_json::Value::Array(vec![v])),
            }
        }
        TypeRef::Named(name) => {
            if value.is_null() {
                return Ok(serde_json::Value::Null);
            }
            coerce_named(schema, name, value, variables)
        }
    }
}

fn coerce_named(
    schema: &Schema,
    type_name: &str,
    value: &ast::Value,
    variables: &IndexMap<String, serde_json::Value>,
) -> InputValueResult<serde_json::Value> {
    let ty = schema
        .get_type(type_name)
        .ok_or_else(|| InputValueError(format!("unknown type \"{}\"", type_name)))?;

    match ty {
        super::Type::Scalar(scalar) => (scalar.parse_literal)(value),
        super::Type::Enum(en) => match value {
            ast::Value::Enum(name) => en
                .values
                .get(name)
                .map(|def| def.value.clone())
                .ok_or_else(|| InputValueError(format!("invalid enum value \"{}\"", name))),
            _ => Err(InputValueError::expected_type(type_name)),
        },
        super::Type::InputObject(input) => match value {
            ast::Value::Object(fields) => {
                coerce_input_object(schema, &input.fields, fields, variables)
            }
            _ => Err(InputValueError::expected_type(type_name)),
        },
        _ => Err(InputValueError(format!(
            "\"{}\" is not an input type",
            type_name
        ))),
    }
}

/// Coerces a supplied literal/variable value, falling back to `default`
/// (the argument's or input field's own declared default) when the literal
/// is a variable reference that has no runtime value — rather than to
/// `coerce_value`'s own null-for-nullable fallback.
fn coerce_supplied_value(
    schema: &Schema,
    ty: &TypeRef,
    value: &ast::Value,
    default: Option<&ast::Value>,
    variables: &IndexMap<String, serde_json::Value>,
) -> InputValueResult<serde_json::Value> {
    if let (ast::Value::Variable(name), Some(default)) = (value, default) {
        if !variables.contains_key(name) {
            return coerce_value(schema, ty, default, variables);
        }
    }
    coerce_value(schema, ty, value, variables)
}

fn coerce_input_object(
    schema: &Schema,
    defs: &IndexMap<String, InputValueDefinition>,
    literal_fields: &IndexMap<String, ast::Value>,
    variables: &IndexMap<String, serde_json::Value>,
) -> InputValueResult<serde_json::Value> {
    let mut out = serde_json::Map::new();
    for (name, def) in defs {
        match literal_fields.get(name) {
            Some(value) => {
                out.insert(
                    name.clone(),
                    coerce_supplied_value(schema, &def.input_type, value, def.default_value.as_ref(), variables)?,
                );
            }
            None => match &def.default_value {
                Some(default) => {
                    out.insert(
                        name.clone(),
                        coerce_value(schema, &def.input_type, default, variables)?,
                    );
                }
                None if def.input_type.is_non_null() => {
                    return Err(InputValueError(format!(
                        "missing required field \"{}\"",
                        name
                    )));
                }
                None => {}
            },
        }
    }
    for name in literal_fields.keys() {
        if !defs.contains_key(name) {
            return Err(InputValueError(format!("unknown input field \"{}\"", name)));
        }
    }
    Ok(serde_json::Value::Object(out))
}

/// Caps how many distinct coercion errors `coerce_variable_values`/
/// `coerce_argument_values` collect before giving up outright, rather than
/// reporting every invalid variable or argument in an operation that
/// supplies many at once.
const MAX_COERCION_ERRORS: usize = 5;

/// Coerce an operation's `VariableDefinition`s against the raw JSON
/// variables supplied with the request.
///
/// Accumulates one error per invalid variable rather than stopping at the
/// first; once `MAX_COERCION_ERRORS` is reached, stops early and appends a
/// terminal "too many errors" entry.
pub fn coerce_variable_values(
    schema: &Schema,
    variable_definitions: &[ast::Positioned<ast::VariableDefinition>],
    raw_variables: &serde_json::Map<String, serde_json::Value>,
) -> Result<IndexMap<String, serde_json::Value>, Vec<InputValueError>> {
    let mut coerced = IndexMap::new();
    let mut errors = Vec::new();

    for def in variable_definitions {
        let def: &ast::VariableDefinition = def;
        let provided = raw_variables.get(&def.name.node);
        let result = match provided {
            Some(value) => coerce_variable_input(schema, &def.var_type, value)
                .map(|value| Some((def.name.node.clone(), value))),
            None => match &def.default_value {
                Some(default) => coerce_value(schema, &def.var_type, &default.node, &coerced)
                    .map(|value| Some((def.name.node.clone(), value))),
                None if def.var_type.is_non_null() => Err(InputValueError(format!(
                    "missing value for required variable \"${}\"",
                    def.name.node
                ))),
                None => Ok(None),
            },
        };

        match result {
            Ok(Some((name, value))) => {
                coerced.insert(name, value);
            }
            Ok(None) => {}
            Err(err) => {
                errors.push(err);
                if errors.len() >= MAX_COERCION_ERRORS {
                    errors.push(InputValueError("too many errors coercing variable values".to_string()));
                    return Err(errors);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

/// Coerce a raw JSON variable value (as supplied over the wire) against its
/// declared type. Unlike AST literal coercion, there's no `Variable` case
/// and list values are already JSON arrays rather than `ast::Value::List`.
fn coerce_variable_input(
    schema: &Schema,
    ty: &TypeRef,
    value: &serde_json::Value,
) -> InputValueResult<serde_json::Value> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(InputValueError("expected a non-null value".to_string()));
            }
            coerce_variable_input(schema, inner, value)
        }
        TypeRef::List(inner) => match value {
            serde_json::Value::Null => Ok(serde_json::Value::Null),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| coerce_variable_input(schema, inner, item))
                .collect::<InputValueResult<Vec<_>>>()
                .map(serde_json::Value::Array),
            _ => coerce_variable_input(schema, inner, value).map(|v| serde_json::Value::Array(vec![v])),
        },
        TypeRef::Named(name) => {
            if value.is_null() {
                return Ok(serde_json::Value::Null);
            }
            let ty = schema
                .get_type(name)
                .ok_or_else(|| InputValueError(format!("unknown type \"{}\"", name)))?;
            match ty {
                super::Type::Scalar(scalar) => (scalar.parse_value)(value),
                super::Type::Enum(en) => {
                    let name_str = value
                        .as_str()
                        .ok_or_else(|| InputValueError::expected_type(name))?;
                    en.values
                        .get(name_str)
                        .map(|def| def.value.clone())
                        .ok_or_else(|| InputValueError(format!("invalid enum value \"{}\"", name_str)))
                }
                super::Type::InputObject(input) => {
                    let obj = value
                        .as_object()
                        .ok_or_else(|| InputValueError::expected_type(name))?;
                    let mut out = serde_json::Map::new();
                    for (field_name, def) in &input.fields {
                        match obj.get(field_name) {
                            Some(v) => {
                                out.insert(
                                    field_name.clone(),
                                    coerce_variable_input(schema, &def.input_type, v)?,
                                );
                            }
                            None => match &def.default_value {
                                Some(default) => {
                                    out.insert(
                                        field_name.clone(),
                                        coerce_value(schema, &def.input_type, default, &IndexMap::new())?,
                                    );
                                }
                                None if def.input_type.is_non_null() => {
                                    return Err(InputValueError(format!(
                                        "missing required field \"{}\"",
                                        field_name
                                    )));
                                }
                                None => {}
                            },
                        }
                    }
                    for key in obj.keys() {
                        if !input.fields.contains_key(key) {
                            return Err(InputValueError(format!("unknown input field \"{}\"", key)));
                        }
                    }
                    Ok(serde_json::Value::Object(out))
                }
                _ => Err(InputValueError(format!("\"{}\" is not an input type", name))),
            }
        }
    }
}

/// Coerce a field's or directive's argument list: literal arguments are
/// resolved against `variables`,
/// missing arguments fall back to their schema default, and missing
/// required arguments are an error.
///
/// Accumulates one error per invalid argument rather than stopping at the
/// first; once `MAX_COERCION_ERRORS` is reached, stops early and appends a
/// terminal "too many errors" entry.
pub fn coerce_argument_values(
    schema: &Schema,
    arg_defs: &IndexMap<String, InputValueDefinition>,
    supplied: &[(ast::Positioned<String>, ast::Positioned<ast::Value>)],
    variables: &IndexMap<String, serde_json::Value>,
) -> Result<IndexMap<String, serde_json::Value>, Vec<InputValueError>> {
    let mut out = IndexMap::new();
    let mut errors = Vec::new();

    for (name, def) in arg_defs {
        let literal = supplied.iter().find(|(arg_name, _)| arg_name.node == *name);
        let result: InputValueResult<Option<serde_json::Value>> = match literal {
            Some((_, value)) if !value.node.is_null() || def.input_type.is_non_null() => coerce_supplied_value(
                schema,
                &def.input_type,
                &value.node,
                def.default_value.as_ref(),
                variables,
            )
            .map(Some),
            Some(_) => Ok(Some(serde_json::Value::Null)),
            None => match &def.default_value {
                Some(default) => coerce_value(schema, &def.input_type, default, variables).map(Some),
                None if def.input_type.is_non_null() => Err(InputValueError(format!(
                    "missing required argument \"{}\"",
                    name
                ))),
                None => Ok(None),
            },
        };

        match result {
            Ok(Some(value)) => {
                out.insert(name.clone(), value);
            }
            Ok(None) => {}
            Err(err) => {
                errors.push(err);
                if errors.len() >= MAX_COERCION_ERRORS {
                    errors.push(InputValueError("too many errors coercing argument values".to_string()));
                    return Err(errors);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}
