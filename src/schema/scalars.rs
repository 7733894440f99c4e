//! Built-in scalar types (`Int`, `Float`, `String`, `Boolean`, `ID`),
//! expressed against the dynamic `ScalarType` contract.

use std::sync::Arc;

use crate::ast;
use crate::error::InputValueError;

use super::ScalarType;

fn literal_to_json(value: &ast::Value) -> Option<serde_json::Value> {
    match value {
        ast::Value::Variable(_) => None,
        ast::Value::Int(n) => Some(serde_json::Value::from(*n)),
        ast::Value::Float(n) => Some(serde_json::Value::from(*n)),
        ast::Value::String(s) => Some(serde_json::Value::from(s.clone())),
        ast::Value::Boolean(b) => Some(serde_json::Value::from(*b)),
        ast::Value::Null => Some(serde_json::Value::Null),
        ast::Value::Enum(name) => Some(serde_json::Value::from(name.clone())),
        ast::Value::List(items) => items
            .iter()
            .map(literal_to_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
        ast::Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| literal_to_json(v).map(|v| (k.clone(), v)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(serde_json::Value::Object),
    }
}

pub fn int() -> ScalarType {
    ScalarType {
        name: "Int".to_string(),
        parse_value: Arc::new(|value| match value {
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            _ => Err(InputValueError::expected_type("Int")),
        }),
        parse_literal: Arc::new(|value| match value {
            ast::Value::Int(n) => Ok(serde_json::Value::from(*n)),
            _ => Err(InputValueError::expected_type("Int")),
        }),
        serialize: Arc::new(|value| match value {
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            _ => None,
        }),
    }
}

pub fn float() -> ScalarType {
    ScalarType {
        name: "Float".to_string(),
        parse_value: Arc::new(|value| match value {
            serde_json::Value::Number(_) => Ok(value.clone()),
            _ => Err(InputValueError::expected_type("Float")),
        }),
        parse_literal: Arc::new(|value| match value {
            ast::Value::Int(n) => Ok(serde_json::Value::from(*n as f64)),
            ast::Value::Float(n) => Ok(serde_json::Value::from(*n)),
            _ => Err(InputValueError::expected_type("Float")),
        }),
        serialize: Arc::new(|value| match value {
            serde_json::Value::Number(_) => Some(value.clone()),
            _ => None,
        }),
    }
}

pub fn string() -> ScalarType {
    ScalarType {
        name: "String".to_string(),
        parse_value: Arc::new(|value| match value {
            serde_json::Value::String(_) => Ok(value.clone()),
            _ => Err(InputValueError::expected_type("String")),
        }),
        parse_literal: Arc::new(|value| match value {
            ast::Value::String(s) => Ok(serde_json::Value::from(s.clone())),
            _ => Err(InputValueError::expected_type("String")),
        }),
        serialize: Arc::new(|value| match value {
            serde_json::Value::String(_) => Some(value.clone()),
            _ => None,
        }),
    }
}

pub fn boolean() -> ScalarType {
    ScalarType {
        name: "Boolean".to_string(),
        parse_value: Arc::new(|value| match value {
            serde_json::Value::Bool(_) => Ok(value.clone()),
            _ => Err(InputValueError::expected_type("Boolean")),
        }),
        parse_literal: Arc::new(|value| match value {
            ast::Value::Boolean(b) => Ok(serde_json::Value::from(*b)),
            _ => Err(InputValueError::expected_type("Boolean")),
        }),
        serialize: Arc::new(|value| match value {
            serde_json::Value::Bool(_) => Some(value.clone()),
            _ => None,
        }),
    }
}

/// `ID` serializes like a string but also accepts integer literals/inputs,
/// coercing them to their string representation — the usual GraphQL `ID`
/// leniency.
pub fn id() -> ScalarType {
    ScalarType {
        name: "ID".to_string(),
        parse_value: Arc::new(|value| match value {
            serde_json::Value::String(_) => Ok(value.clone()),
            serde_json::Value::Number(n) => Ok(serde_json::Value::from(n.to_string())),
            _ => Err(InputValueError::expected_type("ID")),
        }),
        parse_literal: Arc::new(|value| match value {
            ast::Value::String(s) => Ok(serde_json::Value::from(s.clone())),
            ast::Value::Int(n) => Ok(serde_json::Value::from(n.to_string())),
            _ => Err(InputValueError::expected_type("ID")),
        }),
        serialize: Arc::new(|value| match value {
            serde_json::Value::String(_) => Some(value.clone()),
            serde_json::Value::Number(n) => Some(serde_json::Value::from(n.to_string())),
            _ => None,
        }),
    }
}

#[allow(dead_code)]
fn accepts_any_literal(value: &ast::Value) -> Option<serde_json::Value> {
    literal_to_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_rejects_string_literal() {
        let scalar = int();
        assert!((scalar.parse_literal)(&ast::Value::String("1".into())).is_err());
        assert!((scalar.parse_literal)(&ast::Value::Int(1)).is_ok());
    }

    #[test]
    fn id_accepts_int_and_normalizes_to_string() {
        let scalar = id();
        let coerced = (scalar.parse_literal)(&ast::Value::Int(42)).unwrap();
        assert_eq!(coerced, serde_json::Value::from("42"));
    }
}
