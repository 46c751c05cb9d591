//! tokio_onion - onion-model middleware dispatcher on Rust and Tokio.
//!
//! Requests are matched against a per-method route table, wrapped by an
//! ordered list of global middleware (each of which may run code before and
//! after the rest of the chain, or answer on its own), and finished by a
//! terminal handler. Failures anywhere in the chain end up in a single error
//! handler.
//!
//! # Features
//!
//! - **Path patterns**: literal segments, `:name` parameters and `*`
//! - **Onion middleware**: async continuations called at most once
//! - **Typed per-request variables**: built by a factory for every request
//! - **Streaming responses**: channel-, reader- and stream-backed bodies
//! - **HTTP/1.1 and HTTP/2**: hyper server with body limits and graceful shutdown
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_onion::middleware::{handler_fn, middleware_fn};
//! use tokio_onion::{App, Context};
//!
//! let app = App::builder()
//!     .use_fn(|ctx: &mut Context, next| Box::pin(async move {
//!         let result = next.run(ctx).await;
//!         ctx.set_header("x-powered-by", "tokio_onion")?;
//!         result
//!     }))
//!     .get("/users/:id", handler_fn(|ctx: &mut Context| Box::pin(async move {
//!         let id = ctx.param("id").unwrap_or_default().to_string();
//!         ctx.json(&serde_json::json!({ "id": id }))
//!     })))
//!     .build();
//!
//! let response = app.handle(request).await;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod app;
pub mod config;
pub mod core;
pub mod logging;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod testing;

// Re-exports for convenience
pub use app::{App, AppBuilder, Stage};
pub use config::{Config, ServerConfig};
pub use core::{
    Body, Context, EnvFactory, Error, HasVariables, Request, Response, Result, Variables,
};
pub use server::Server;
