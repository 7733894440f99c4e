//! Promise-or-value fusion.
//!
//! Every internal result is "value or deferred value" so a purely
//! synchronous query never allocates a boxed future. `MaybeFuture::Ready`
//! polls to completion immediately on first poll; only `Pending` goes
//! through the executor.

use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub type BoxFieldFuture<'a, T> = BoxFuture<'a, T>;

pub enum MaybeFuture<'a, T> {
    Ready(T),
    Pending(BoxFieldFuture<'a, T>),
}

impl<'a, T> MaybeFuture<'a, T> {
    pub fn ready(value: T) -> Self {
        MaybeFuture::Ready(value)
    }

    pub fn pending(fut: BoxFieldFuture<'a, T>) -> Self {
        MaybeFuture::Pending(fut)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, MaybeFuture::Ready(_))
    }

    /// Transform the eventual value. On `Ready` this is a direct call, no
    /// boxing.
    pub fn map<U>(self, f: impl FnOnce(T) -> U + Send + 'a) -> MaybeFuture<'a, U>
    where
        T: Send + 'a,
        U: Send + 'a,
    {
        match self {
            MaybeFuture::Ready(v) => MaybeFuture::Ready(f(v)),
            MaybeFuture::Pending(fut) => MaybeFuture::Pending(Box::pin(async move { f(fut.await) })),
        }
    }
}

impl<'a, T: Unpin> Future for MaybeFuture<'a, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match &mut *self {
            MaybeFuture::Pending(fut) => fut.as_mut().poll(cx),
            MaybeFuture::Ready(_) => {
                let placeholder = MaybeFuture::Pending(Box::pin(futures::future::pending()));
                match std::mem::replace(&mut *self, placeholder) {
                    MaybeFuture::Ready(v) => Poll::Ready(v),
                    MaybeFuture::Pending(_) => unreachable!(),
                }
            }
        }
    }
}
