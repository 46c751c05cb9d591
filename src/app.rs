//! Application dispatcher.
//!
//! [`App`] owns the route table, the global middleware chain and the
//! not-found / error slots. It is configured once through [`AppBuilder`] and
//! is read-only afterwards, so a single instance is shared by every
//! connection without locking.
//!
//! ```rust,ignore
//! use tokio_onion::{App, Context};
//! use tokio_onion::middleware::handler_fn;
//!
//! let app = App::builder()
//!     .get("/ping", handler_fn(|ctx: &mut Context| Box::pin(async move { ctx.text("pong") })))
//!     .build();
//!
//! let res = app.handle(request).await;
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use http::Method;
use tracing::{debug, error, trace, warn};

use crate::core::{Context, EnvFactory, Error, Request, Response, Result, Variables};
use crate::middleware::{
    middleware_fn, BoxFuture, ErrorHandler, Handler, Middleware, MiddlewareChain, Next,
};
use crate::routing::{Params, Router};

/// Per-request dispatch stages, reported at `trace` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    RouteResolved,
    Unresolved,
    MiddlewareExecuting,
    HandlerExecuted,
    ErrorCaught,
    ResponseFinalized,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::RouteResolved => "route_resolved",
            Stage::Unresolved => "unresolved",
            Stage::MiddlewareExecuting => "middleware_executing",
            Stage::HandlerExecuted => "handler_executed",
            Stage::ErrorCaught => "error_caught",
            Stage::ResponseFinalized => "response_finalized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default not-found handler: plain `404 Not Found`.
pub struct NotFound;

#[async_trait]
impl<V: Send + 'static> Handler<V> for NotFound {
    async fn call(&self, ctx: &mut Context<V>) -> Result<()> {
        ctx.respond(Response::not_found())
    }
}

/// Default error handler.
///
/// Logs the error and answers with a generic body: 400 for malformed input,
/// 504 for timeouts, 500 for everything else. Error details never reach the
/// client.
pub struct DefaultErrorHandler;

#[async_trait]
impl<V: Send + 'static> ErrorHandler<V> for DefaultErrorHandler {
    async fn handle(&self, err: Error, ctx: &mut Context<V>) -> Result<()> {
        error!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            error = %err,
            "request failed"
        );

        match err {
            Error::InvalidRequest(_) => ctx.respond(Response::bad_request()),
            Error::Timeout { .. } => ctx.respond(Response::gateway_timeout()),
            _ => ctx.respond(Response::internal_error()),
        }
    }
}

type BoxHandler<V> = Box<dyn Handler<V>>;

struct AppInner<V> {
    router: Router<BoxHandler<V>>,
    middleware: MiddlewareChain<V>,
    not_found: BoxHandler<V>,
    on_error: Box<dyn ErrorHandler<V>>,
    env: EnvFactory<V>,
    request_timeout: Option<Duration>,
}

/// Configured application. Cheap to clone.
pub struct App<V = Variables> {
    inner: Arc<AppInner<V>>,
}

impl App<Variables> {
    /// Start configuring an app with the default [`Variables`] container.
    pub fn builder() -> AppBuilder<Variables> {
        AppBuilder::new(EnvFactory::default())
    }
}

impl<V: Send + 'static> App<V> {
    /// Start configuring an app whose per-request container comes from `make`.
    pub fn with_env<F>(make: F) -> AppBuilder<V>
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        AppBuilder::new(EnvFactory::new(make))
    }

    /// Dispatch one request.
    ///
    /// This is the only entry point, shared by the network server and the
    /// in-process [`TestClient`](crate::testing::TestClient). Streamed
    /// bodies come back as [`Body::Stream`](crate::Body::Stream) and are
    /// pulled by the caller.
    pub async fn handle(&self, request: Request) -> Response {
        let inner = &*self.inner;

        let (endpoint, params, pattern): (&dyn Handler<V>, Params, Option<&str>) =
            match inner.router.resolve(request.method(), request.path()) {
                Some(m) => (
                    &**m.handler(),
                    m.params,
                    Some(m.route.pattern().as_str()),
                ),
                None => (&*inner.not_found, Params::new(), None),
            };

        let mut ctx = Context::new(request, params, inner.env.create());
        trace!(
            stage = %Stage::Created,
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path()
        );

        match pattern {
            Some(pattern) => {
                trace!(stage = %Stage::RouteResolved, request_id = %ctx.request_id(), pattern)
            }
            None => trace!(stage = %Stage::Unresolved, request_id = %ctx.request_id()),
        }

        trace!(
            stage = %Stage::MiddlewareExecuting,
            request_id = %ctx.request_id(),
            middleware = inner.middleware.len()
        );

        match self.run_chain(&mut ctx, endpoint).await {
            Ok(()) => {
                trace!(stage = %Stage::HandlerExecuted, request_id = %ctx.request_id());
            }
            Err(err) if err.is_transport() => {
                // Nobody is left to read a response
                debug!(
                    request_id = %ctx.request_id(),
                    error = %err,
                    "transport error, request abandoned"
                );
                ctx.reset_response();
                return ctx.into_response();
            }
            Err(err) => {
                trace!(stage = %Stage::ErrorCaught, request_id = %ctx.request_id(), error = %err);
                if let Err(handler_err) = self.run_error_handler(err, &mut ctx).await {
                    error!(
                        request_id = %ctx.request_id(),
                        error = %handler_err,
                        "error handler failed, using built-in response"
                    );
                    return Response::internal_error();
                }
            }
        }

        trace!(
            stage = %Stage::ResponseFinalized,
            request_id = %ctx.request_id(),
            status = ctx.status().as_u16(),
            elapsed_us = ctx.elapsed().as_micros() as u64
        );
        ctx.into_response()
    }

    async fn run_chain(&self, ctx: &mut Context<V>, endpoint: &dyn Handler<V>) -> Result<()> {
        let fut = AssertUnwindSafe(self.inner.middleware.run(ctx, endpoint)).catch_unwind();

        let outcome = match self.inner.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(Error::Timeout {
                        duration_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => fut.await,
        };

        outcome.unwrap_or_else(|panic| Err(Error::Panic(panic_message(panic.as_ref()))))
    }

    async fn run_error_handler(&self, err: Error, ctx: &mut Context<V>) -> Result<()> {
        ctx.reset_response();
        let outcome = AssertUnwindSafe(self.inner.on_error.handle(err, ctx))
            .catch_unwind()
            .await;

        outcome.unwrap_or_else(|panic| Err(Error::Panic(panic_message(panic.as_ref()))))
    }

    /// Registered routes as `(method, pattern)` pairs.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.inner
            .router
            .routes()
            .map(|r| (r.method(), r.pattern().as_str()))
    }

    /// Global middleware names in execution order.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.inner.middleware.names()
    }

    /// Configured dispatch timeout.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.inner.request_timeout
    }
}

impl<V> Clone for App<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for App<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.inner.router.len())
            .field("middleware", &self.inner.middleware.len())
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`App`].
///
/// Registration order matters: middleware run in the order added, and for
/// overlapping routes the first registered wins. The not-found and error
/// slots keep the last value set.
pub struct AppBuilder<V> {
    router: Router<BoxHandler<V>>,
    middleware: MiddlewareChain<V>,
    not_found: Option<BoxHandler<V>>,
    on_error: Option<Box<dyn ErrorHandler<V>>>,
    env: EnvFactory<V>,
    request_timeout: Option<Duration>,
}

impl<V: Send + 'static> AppBuilder<V> {
    fn new(env: EnvFactory<V>) -> Self {
        Self {
            router: Router::new(),
            middleware: MiddlewareChain::new(),
            not_found: None,
            on_error: None,
            env,
            request_timeout: None,
        }
    }

    /// Register a handler for `method` and `pattern`.
    pub fn route<H>(mut self, method: Method, pattern: &str, handler: H) -> Self
    where
        H: Handler<V> + 'static,
    {
        self.router.register(method, pattern, Box::new(handler));
        self
    }

    pub fn get<H: Handler<V> + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<H: Handler<V> + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<H: Handler<V> + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch<H: Handler<V> + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete<H: Handler<V> + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn options<H: Handler<V> + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::OPTIONS, pattern, handler)
    }

    /// Append a global middleware.
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<V> + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append a global middleware written as a closure.
    pub fn use_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context<V>, Next<'a, V>) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.with(middleware_fn(f))
    }

    /// Handler for requests that match no route.
    pub fn not_found<H: Handler<V> + 'static>(mut self, handler: H) -> Self {
        if self.not_found.is_some() {
            debug!("replacing not-found handler");
        }
        self.not_found = Some(Box::new(handler));
        self
    }

    /// Handler for errors escaping the chain.
    pub fn on_error<E: ErrorHandler<V> + 'static>(mut self, handler: E) -> Self {
        if self.on_error.is_some() {
            debug!("replacing error handler");
        }
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Bound on a single dispatch. `None` disables it.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Freeze the configuration.
    pub fn build(self) -> App<V> {
        if self.router.is_empty() {
            warn!("app built without routes, every request will hit the not-found handler");
        }

        App {
            inner: Arc::new(AppInner {
                router: self.router,
                middleware: self.middleware,
                not_found: self.not_found.unwrap_or_else(|| Box::new(NotFound)),
                on_error: self
                    .on_error
                    .unwrap_or_else(|| Box::new(DefaultErrorHandler)),
                env: self.env,
                request_timeout: self.request_timeout,
            }),
        }
    }
}
