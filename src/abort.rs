//! Cooperative cancellation.
//!
//! A single-threaded, run-to-completion engine doesn't need the ceremony of
//! a runtime-specific cancellation token; an `AtomicBool` plus a stashed
//! reason is enough for resolvers to observe mid-flight and for the
//! executor to short-circuit on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap().clone()
    }
}

/// Owned by whoever can decide to cancel a request (e.g. the transport
/// layer, on client disconnect). Not otherwise used inside this crate.
#[derive(Clone, Default)]
pub struct AbortController {
    aborted: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            aborted: self.aborted.clone(),
            reason: self.reason.clone(),
        }
    }

    pub fn abort(&self, reason: impl Into<String>) {
        *self.reason.lock().unwrap() = Some(reason.into());
        self.aborted.store(true, Ordering::SeqCst);
    }
}
