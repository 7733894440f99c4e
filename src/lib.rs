//! The query execution core of a GraphQL engine.
//!
//! This crate owns the part of a GraphQL engine that runs once a query
//! document has already been parsed and validated: coercing arguments and
//! variables, collecting a selection set into a grouped field set, building
//! an execution plan around `@defer`/`@stream`, dispatching to resolvers,
//! completing their results against the schema's type shapes, and
//! publishing deferred/streamed payloads after the initial response.
//!
//! Parsing, validation and transport (HTTP, WebSocket, multipart uploads)
//! are all out of scope; [`ast`] fixes the parsed-document contract this
//! crate consumes, and [`schema`] fixes the schema contract it dispatches
//! against.

pub mod abort;
pub mod ast;
pub mod context;
pub mod error;
pub mod execution;
pub mod future;
pub mod path;
pub mod response;
pub mod schema;

pub use context::{ExecutionFlags, ResolverDefaults};
pub use error::{Error, FieldError, FieldResult, QueryError, ServerError};
pub use execution::orchestrate::{execute, execute_incrementally, execute_sync, ExecuteArgs, ExecutionOutcome};
pub use execution::subscribe::SubscriptionEvent;
pub use response::{IncrementalExecutionResult, InitialIncrementalResponse, Response, SubsequentIncrementalResponse};
pub use schema::Schema;
