//! Per-request variables and the factory that creates them.
//!
//! Every request gets a fresh container from the application's
//! [`EnvFactory`] before any middleware runs. It is the channel for state
//! produced by one middleware and consumed by later ones or by the handler
//! (an authenticated principal, decoded token claims, ...).
//!
//! The default container is [`Variables`]. Applications that want typed
//! fields supply their own type and a factory:
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct AppVars {
//!     user: Option<String>,
//! }
//!
//! let app = App::with_env(AppVars::default)
//!     .get("/me", handler_fn(|ctx: &mut Context<AppVars>| Box::pin(async move {
//!         let user = ctx.vars().user.clone().unwrap_or_default();
//!         ctx.text(user)
//!     })))
//!     .build();
//! ```
//!
//! Middleware that needs a particular field should be generic over a
//! capability trait the container implements, so a mismatch is a compile
//! error when the middleware is registered.

use std::any::Any;
use std::sync::Arc;

/// Default variables container: an empty base with a typed extension map.
#[derive(Debug, Default)]
pub struct Variables {
    extensions: http::Extensions,
}

impl Variables {
    /// Create an empty container.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value of the same type.
    #[inline]
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    /// Get a value by type.
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Get a mutable reference to a value by type.
    #[inline]
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut::<T>()
    }

    /// Remove a value by type.
    #[inline]
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove::<T>()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Capability: containers that expose a typed extension map.
///
/// Generic middleware that only needs to stash a value for later layers can
/// bound on this instead of a concrete container type.
pub trait HasVariables {
    fn variables(&self) -> &Variables;
    fn variables_mut(&mut self) -> &mut Variables;

    /// Convenience lookup through the extension map.
    fn extension<T: Send + Sync + 'static>(&self) -> Option<&T>
    where
        Self: Sized,
    {
        self.variables().get::<T>()
    }
}

impl HasVariables for Variables {
    #[inline]
    fn variables(&self) -> &Variables {
        self
    }

    #[inline]
    fn variables_mut(&mut self) -> &mut Variables {
        self
    }
}

/// Constructor invoked once per request to produce the variables container.
pub struct EnvFactory<V> {
    make: Arc<dyn Fn() -> V + Send + Sync>,
}

impl<V: Send + 'static> EnvFactory<V> {
    /// Wrap a constructor closure.
    pub fn new<F>(make: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            make: Arc::new(make),
        }
    }

    /// Build a fresh container.
    #[inline]
    pub fn create(&self) -> V {
        (self.make)()
    }
}

impl<V: Default + Send + 'static> Default for EnvFactory<V> {
    fn default() -> Self {
        Self::new(V::default)
    }
}

impl<V> Clone for EnvFactory<V> {
    fn clone(&self) -> Self {
        Self {
            make: Arc::clone(&self.make),
        }
    }
}

impl<V: Any> std::fmt::Debug for EnvFactory<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvFactory")
            .field("type", &std::any::type_name::<V>())
            .finish()
    }
}
