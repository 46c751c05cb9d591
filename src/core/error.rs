//! Core error types.

use std::fmt;

/// Boxed error produced by user code (handlers, middleware, collaborators).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while dispatching a request.
///
/// Anything that escapes a middleware or handler ends up at the single
/// error handler configured on the [`App`](crate::App). Expected failures
/// (bad credentials, invalid input) should be turned into 4xx responses at
/// the point of detection instead of being returned.
#[derive(Debug)]
pub enum Error {
    /// Request could not be interpreted (bad encoding, invalid JSON, ...).
    InvalidRequest(String),

    /// Header name or value rejected by the HTTP layer.
    InvalidHeader(String),

    /// A body-producing helper was called on a context that already has a body.
    ResponseAlreadySet,

    /// Dispatch did not finish within the configured timeout.
    Timeout {
        duration_ms: u64,
    },

    /// A middleware or handler panicked.
    Panic(String),

    /// The client went away while the response was being produced.
    Transport(String),

    /// JSON encoding or decoding failed.
    Json(serde_json::Error),

    /// I/O error.
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),

    /// Error raised by application code.
    Handler(BoxError),

    /// Custom error with message.
    Custom(String),
}

impl Error {
    /// Wrap an arbitrary application error.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Handler(err.into())
    }

    /// Check if this error came from a broken client connection.
    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this error describes a malformed request.
    #[inline]
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            Error::InvalidHeader(msg) => write!(f, "invalid header: {}", msg),
            Error::ResponseAlreadySet => write!(f, "response body already set for this request"),
            Error::Timeout { duration_ms } => write!(f, "request timeout after {}ms", duration_ms),
            Error::Panic(msg) => write!(f, "handler panicked: {}", msg),
            Error::Transport(msg) => write!(f, "transport error: {}", msg),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Handler(e) => write!(f, "{}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Handler(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<BoxError> for Error {
    fn from(e: BoxError) -> Self {
        Error::Handler(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Custom(msg.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
