//! Execution context: the data every in-flight field execution shares.
//!
//! Splits into an immutable validated-arguments bundle, built once per
//! request by the orchestrator, and a small amount of mutable per-request
//! state (the error buffer, the `completed` latch) that every concurrent
//! field execution shares by reference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::abort::AbortSignal;
use crate::ast;
use crate::error::{Error, QueryError};
use crate::path::Path;
use crate::schema::{ResolverFn, ResolveTypeFn, Schema, SubscribeFn};

/// Resolver overrides and feature flags a caller may supply.
#[derive(Clone, Default)]
pub struct ResolverDefaults {
    pub field_resolver: Option<ResolverFn>,
    pub type_resolver: Option<ResolveTypeFn>,
    pub subscribe_field_resolver: Option<SubscribeFn>,
}

/// Feature flags carried on validated args.
#[derive(Clone, Copy, Debug)]
pub struct ExecutionFlags {
    pub enable_early_execution: bool,
    pub hide_suggestions: bool,
}

impl Default for ExecutionFlags {
    fn default() -> Self {
        Self {
            enable_early_execution: false,
            hide_suggestions: false,
        }
    }
}

/// The immutable half of an execution context: everything computed once by
/// the orchestrator's "validate execution args" step.
///
/// `Clone` backs the subscription driver's "shallow-clone the validated
/// args, replace `rootValue`" step — every field here is either a shared
/// reference or cheap to duplicate.
#[derive(Clone)]
pub struct ValidatedExecutionArgs<'a> {
    pub schema: &'a Schema,
    pub fragments: &'a IndexMap<String, ast::FragmentDefinition>,
    pub root_value: serde_json::Value,
    pub operation: &'a ast::OperationDefinition,
    pub variable_values: IndexMap<String, serde_json::Value>,
    pub resolver_defaults: ResolverDefaults,
    pub flags: ExecutionFlags,
    pub abort_signal: Option<AbortSignal>,
    /// Whether the operation's `@errorPropagation` directive (or schema
    /// default) keeps a resolver error bubbling past a non-null ancestor.
    pub error_propagation: bool,
}

/// The mutable, shared-by-reference half: the error buffer and the
/// `completed` latch every field execution under one request observes.
#[derive(Default)]
pub struct ExecutionState {
    errors: Mutex<Vec<Error>>,
    completed: AtomicBool,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a located error to the buffer. Race-free under the
    /// cooperative single-threaded model even though multiple field
    /// executions hold a reference to the same state.
    pub fn push_error(&self, err: Error) {
        self.errors.lock().unwrap().push(err);
    }

    pub fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut self.errors.lock().unwrap())
    }

    pub fn errors_snapshot(&self) -> Vec<Error> {
        self.errors.lock().unwrap().clone()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }
}

/// A private error sub-buffer for a deferred group or stream item: errors
/// raised while producing one incremental payload entry stay local until
/// that entry is emitted, then merge into the buffer the caller
/// designates.
#[derive(Default)]
pub struct LocalErrorBuffer(Mutex<Vec<Error>>);

impl LocalErrorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, err: Error) {
        self.0.lock().unwrap().push(err);
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0.into_inner().unwrap()
    }
}

/// What every field-level operation (collection, plan building, execution)
/// actually threads through: the validated args, the shared mutable state,
/// and whichever error buffer is "effective" for the call in progress — the
/// root buffer normally, or a deferred group's/stream item's local buffer
/// when executing inside one.
pub struct ExecutionContext<'a> {
    pub args: &'a ValidatedExecutionArgs<'a>,
    pub state: &'a ExecutionState,
    effective_errors: EffectiveErrors<'a>,
}

enum EffectiveErrors<'a> {
    Root,
    Local(&'a LocalErrorBuffer),
}

impl<'a> ExecutionContext<'a> {
    pub fn new(args: &'a ValidatedExecutionArgs<'a>, state: &'a ExecutionState) -> Self {
        Self {
            args,
            state,
            effective_errors: EffectiveErrors::Root,
        }
    }

    /// A context that records into `local` instead of the root buffer, used
    /// while executing a deferred group or stream item.
    pub fn with_local_errors(&self, local: &'a LocalErrorBuffer) -> Self {
        Self {
            args: self.args,
            state: self.state,
            effective_errors: EffectiveErrors::Local(local),
        }
    }

    pub fn record_error(&self, err: Error) {
        match &self.effective_errors {
            EffectiveErrors::Root => self.state.push_error(err),
            EffectiveErrors::Local(buf) => buf.push(err),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// The "Completed, aborting" check every object-value resolution makes
    /// first.
    pub fn check_not_completed(&self, path: &Path) -> crate::error::Result<()> {
        if self.is_completed() {
            return Err(Error::new(
                ast::Pos::default(),
                Some(path.to_vec()),
                QueryError::CompletedAborting,
            ));
        }
        Ok(())
    }

    pub fn abort_signal(&self) -> Option<&AbortSignal> {
        self.args.abort_signal.as_ref()
    }

    /// Whether the current abort signal (if any) is tripped, surfaced as a
    /// located error the way a resolver failure would be.
    pub fn check_aborted(&self, path: &Path, pos: ast::Pos) -> crate::error::Result<()> {
        if let Some(signal) = self.abort_signal() {
            if signal.is_aborted() {
                let reason = signal.reason().unwrap_or_else(|| "aborted".to_string());
                return Err(Error::new(
                    pos,
                    Some(path.to_vec()),
                    QueryError::Other(reason),
                ));
            }
        }
        Ok(())
    }
}
