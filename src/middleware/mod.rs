//! Onion-model middleware.
//!
//! Every middleware receives the request [`Context`] and a [`Next`]
//! continuation. Work done before awaiting `next.run(ctx)` happens on the way
//! in, work after it happens on the way out. Not calling `next` at all
//! short-circuits the chain: later middleware and the handler never run.
//!
//! ```text
//! Request → A.before → B.before → Handler
//!                                    ↓
//! Response ← A.after ← B.after ←─────┘
//! ```
//!
//! `Next` is consumed by [`Next::run`], so a middleware cannot invoke the
//! downstream chain twice.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use tokio_onion::middleware::{Middleware, Next};
//! use tokio_onion::{Context, Result};
//!
//! struct Timing;
//!
//! #[async_trait]
//! impl<V: Send + 'static> Middleware<V> for Timing {
//!     fn name(&self) -> &'static str { "timing" }
//!
//!     async fn handle(&self, ctx: &mut Context<V>, next: Next<'_, V>) -> Result<()> {
//!         let result = next.run(ctx).await;
//!         let ms = ctx.elapsed().as_millis().to_string();
//!         ctx.set_header("x-response-time", ms)?;
//!         result
//!     }
//! }
//! ```

mod chain;

pub use chain::MiddlewareChain;
pub use futures_util::future::BoxFuture;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Context, Error, Result};

/// Terminal request handler.
#[async_trait]
pub trait Handler<V>: Send + Sync {
    async fn call(&self, ctx: &mut Context<V>) -> Result<()>;
}

/// A layer of the onion.
#[async_trait]
pub trait Middleware<V>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Process the request, optionally delegating to `next`.
    async fn handle(&self, ctx: &mut Context<V>, next: Next<'_, V>) -> Result<()>;
}

/// Turns a failure from the chain into a response.
///
/// Called at most once per request, with whatever response was being built
/// already discarded.
#[async_trait]
pub trait ErrorHandler<V>: Send + Sync {
    async fn handle(&self, err: Error, ctx: &mut Context<V>) -> Result<()>;
}

/// Continuation to the rest of the chain.
pub struct Next<'a, V> {
    middleware: &'a [Arc<dyn Middleware<V>>],
    endpoint: &'a dyn Handler<V>,
}

impl<'a, V: Send + 'static> Next<'a, V> {
    pub(crate) fn new(
        middleware: &'a [Arc<dyn Middleware<V>>],
        endpoint: &'a dyn Handler<V>,
    ) -> Self {
        Self {
            middleware,
            endpoint,
        }
    }

    /// Run the remaining middleware and then the handler.
    pub fn run<'b>(self, ctx: &'b mut Context<V>) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
    {
        match self.middleware.split_first() {
            Some((head, rest)) => {
                tracing::trace!(middleware = head.name(), "middleware executing");
                let next = Next {
                    middleware: rest,
                    endpoint: self.endpoint,
                };
                head.handle(ctx, next)
            }
            None => self.endpoint.call(ctx),
        }
    }

    /// Number of middleware still ahead of the handler.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.middleware.len()
    }
}

impl<V> fmt::Debug for Next<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.middleware.len())
            .finish()
    }
}

// Closure adapters.
//
// Closures take the context (and continuation) for some lifetime 'a and
// return a boxed future borrowing them:
//
//     handler_fn(|ctx: &mut Context| Box::pin(async move { ctx.text("ok") }))

/// Handler backed by a closure. See [`handler_fn`].
pub struct HandlerFn<V, F> {
    f: F,
    _vars: PhantomData<fn() -> V>,
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<V, F>(f: F) -> HandlerFn<V, F>
where
    F: for<'a> Fn(&'a mut Context<V>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    HandlerFn {
        f,
        _vars: PhantomData,
    }
}

#[async_trait]
impl<V, F> Handler<V> for HandlerFn<V, F>
where
    V: Send + 'static,
    F: for<'a> Fn(&'a mut Context<V>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut Context<V>) -> Result<()> {
        (self.f)(ctx).await
    }
}

/// Middleware backed by a closure. See [`middleware_fn`].
pub struct MiddlewareFn<V, F> {
    name: &'static str,
    f: F,
    _vars: PhantomData<fn() -> V>,
}

/// Wrap a closure as a [`Middleware`].
pub fn middleware_fn<V, F>(f: F) -> MiddlewareFn<V, F>
where
    F: for<'a> Fn(&'a mut Context<V>, Next<'a, V>) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    MiddlewareFn {
        name: "middleware_fn",
        f,
        _vars: PhantomData,
    }
}

impl<V, F> MiddlewareFn<V, F> {
    /// Set the name reported in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl<V, F> Middleware<V> for MiddlewareFn<V, F>
where
    V: Send + 'static,
    F: for<'a> Fn(&'a mut Context<V>, Next<'a, V>) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, ctx: &mut Context<V>, next: Next<'_, V>) -> Result<()> {
        (self.f)(ctx, next).await
    }
}

/// Error handler backed by a closure. See [`error_handler_fn`].
pub struct ErrorHandlerFn<V, F> {
    f: F,
    _vars: PhantomData<fn() -> V>,
}

/// Wrap a closure as an [`ErrorHandler`].
pub fn error_handler_fn<V, F>(f: F) -> ErrorHandlerFn<V, F>
where
    F: for<'a> Fn(Error, &'a mut Context<V>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    ErrorHandlerFn {
        f,
        _vars: PhantomData,
    }
}

#[async_trait]
impl<V, F> ErrorHandler<V> for ErrorHandlerFn<V, F>
where
    V: Send + 'static,
    F: for<'a> Fn(Error, &'a mut Context<V>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    async fn handle(&self, err: Error, ctx: &mut Context<V>) -> Result<()> {
        (self.f)(err, ctx).await
    }
}
