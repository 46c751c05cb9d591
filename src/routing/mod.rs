//! Route patterns and the per-method route table.
//!
//! ```rust,ignore
//! use tokio_onion::routing::Router;
//!
//! let mut router = Router::new();
//! router.register(Method::GET, "/users/:id", handler);
//!
//! if let Some(m) = router.resolve(&Method::GET, "/users/42") {
//!     assert_eq!(m.params.get("id"), Some("42"));
//! }
//! ```

mod pattern;
mod router;

pub use pattern::{Params, Pattern, Segment, PARAM_MARKER, WILDCARD};
pub use router::{Route, RouteMatch, Router};
