//! Core types for HTTP request/response handling.
//!
//! - [`Request`] - buffered HTTP request
//! - [`Response`] - HTTP response with builder pattern
//! - [`Body`] - full or streamed response body
//! - [`Context`] - per-request state shared by middleware and handlers
//! - [`Variables`] / [`EnvFactory`] - per-request variables and their constructor
//! - [`Error`] - core error types
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_onion::core::Context;
//!
//! async fn show_user(ctx: &mut Context) -> tokio_onion::Result<()> {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     ctx.set_header("X-Custom", "value")?;
//!     ctx.json(&serde_json::json!({ "id": id }))
//! }
//! ```

mod body;
mod context;
mod error;
mod request;
mod response;
mod vars;

pub use body::{Body, BodySender, BodyStream, StreamChunk, DEFAULT_STREAM_BUFFER_SIZE};
pub use context::{generate_request_id, parse_query_string, Context};
pub use error::{BoxError, Error, Result};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
pub use vars::{EnvFactory, HasVariables, Variables};
