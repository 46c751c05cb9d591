//! Middleware chain for composing multiple middleware.

use std::sync::Arc;

use super::{Handler, Middleware, Next};
use crate::core::{Context, Result};

/// Ordered list of middleware wrapped around a handler.
///
/// Middleware run in registration order on the way in and in reverse order
/// on the way out. The first one added is the outermost layer.
pub struct MiddlewareChain<V> {
    middlewares: Vec<Arc<dyn Middleware<V>>>,
}

impl<V: Send + 'static> MiddlewareChain<V> {
    /// Create a new empty middleware chain.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the end of the chain.
    pub fn add<M: Middleware<V> + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Add a middleware wrapped in Arc to the chain.
    pub fn add_arc(mut self, middleware: Arc<dyn Middleware<V>>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub(crate) fn push(&mut self, middleware: Arc<dyn Middleware<V>>) {
        self.middlewares.push(middleware);
    }

    /// Run the chain with `endpoint` at its centre.
    pub async fn run(&self, ctx: &mut Context<V>, endpoint: &dyn Handler<V>) -> Result<()> {
        Next::new(&self.middlewares, endpoint).run(ctx).await
    }
}

impl<V> MiddlewareChain<V> {
    /// Get the number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Get middleware names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }
}

impl<V: Send + 'static> Default for MiddlewareChain<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for MiddlewareChain<V> {
    fn clone(&self) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
        }
    }
}
