//! Error taxonomy.
//!
//! `QueryError` enumerates the shape/fatal errors the execution core itself
//! raises. `FieldError` is what a user resolver returns. Both get funneled,
//! with path and AST-node location attached, into `ServerError` — the only
//! error shape that ever reaches a response.

use std::fmt;
use std::sync::Arc;

use crate::ast::Pos;
use crate::path::PathValue;

/// Errors raised by the execution core itself, before a resolver is even
/// reached, or while shaping a resolver's result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("Field \"{field_name}\" not found on type \"{object}\"")]
    FieldNotFound { field_name: String, object: String },

    #[error("Cannot return null for non-nullable field {parent_type}.{field_name}")]
    NonNullableField {
        parent_type: String,
        field_name: String,
    },

    #[error("Expected Iterable, but did not find one for field {parent_type}.{field_name}")]
    ExpectedIterable {
        parent_type: String,
        field_name: String,
    },

    #[error("Abstract type \"{type_name}\" must resolve to an Object type at runtime for field {parent_type}.{field_name}. Either the \"{type_name}\" type should provide a \"resolveType\" function or each possible type should provide an \"isTypeOf\" function.")]
    AbstractTypeMustResolveToObject {
        type_name: String,
        parent_type: String,
        field_name: String,
    },

    #[error("Runtime Object type \"{runtime_type}\" is not a possible type for \"{abstract_type}\"")]
    InvalidRuntimeType {
        runtime_type: String,
        abstract_type: String,
    },

    #[error("\"{type_name}\" is not a possible type.")]
    UnknownRuntimeType { type_name: String },

    #[error("Must provide a query string.")]
    MissingQuery,

    #[error("{0}")]
    VariableCoercion(String),

    #[error("{0}")]
    ArgumentCoercion(String),

    #[error("Schema is not configured for {0}s.")]
    OperationNotSupported(String),

    #[error("\"{parent_type}\" must have subfields.")]
    MustHaveSubFields { parent_type: String },

    #[error("Subscription field must return Async Iterable. Received: {received}")]
    SubscriptionFieldNotAsyncIterable { received: String },

    #[error("The defer and stream directives are not supported on subscription operations.")]
    DeferStreamOnSubscription,

    #[error("Completed, aborting.")]
    CompletedAborting,

    #[error("{0}")]
    Other(String),
}

/// A located, internal error: a `QueryError` plus the path and AST position
/// where execution was when it happened.
#[derive(Debug, Clone)]
pub struct Error {
    pub pos: Pos,
    pub path: Option<Vec<PathValue>>,
    pub err: QueryError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.err, self.pos)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(pos: Pos, path: Option<Vec<PathValue>>, err: QueryError) -> Self {
        Self { pos, path, err }
    }
}

/// The error a user resolver returns. Carries an optional `extensions`
/// object that survives into the response's `errors[].extensions`.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub message: String,
    pub extensions: Option<serde_json::Value>,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldError {}

impl FieldError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            extensions: None,
        }
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// Lets a resolver attach structured `extensions` to whatever error it
/// returns, the way `?` normally just loses that information.
pub trait ErrorExtensions {
    fn extend(&self) -> FieldError;
}

impl ErrorExtensions for FieldError {
    fn extend(&self) -> FieldError {
        self.clone()
    }
}

pub trait ResultExt<T, E> {
    fn extend_err(self, cb: impl FnOnce(&E) -> serde_json::Value) -> FieldResult<T>;
}

impl<T, E: fmt::Display> ResultExt<T, E> for std::result::Result<T, E> {
    fn extend_err(self, cb: impl FnOnce(&E) -> serde_json::Value) -> FieldResult<T> {
        self.map_err(|err| {
            let extensions = cb(&err);
            FieldError {
                message: err.to_string(),
                extensions: Some(extensions),
            }
        })
    }
}

/// An error produced while coercing a single input value (argument,
/// variable, or a field of an input object).
#[derive(Debug, Clone)]
pub struct InputValueError(pub String);

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl InputValueError {
    pub fn expected_type(type_name: &str) -> Self {
        Self(format!("expected type \"{}\"", type_name))
    }
}

pub type InputValueResult<T> = std::result::Result<T, InputValueError>;

/// A `{ line, column }` pair as it appears in `ServerError.locations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

/// The only error shape that ever reaches a response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
    /// Kept for programmatic inspection; never serialized.
    #[serde(skip)]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
            source: None,
        }
    }

    pub fn with_location(mut self, pos: Pos) -> Self {
        self.locations.push(pos.into());
        self
    }

    pub fn with_path(mut self, path: Vec<PathValue>) -> Self {
        self.path = Some(path);
        self
    }
}

impl From<Error> for ServerError {
    fn from(err: Error) -> Self {
        ServerError::new(err.err.to_string())
            .with_location(err.pos)
            .with_path(err.path.unwrap_or_default())
    }
}

impl From<FieldError> for ServerError {
    fn from(err: FieldError) -> Self {
        Self {
            message: err.message,
            locations: Vec::new(),
            path: None,
            extensions: err.extensions,
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
