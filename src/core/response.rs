//! HTTP response handed back to the transport.

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

use super::body::Body;

/// Pre-allocated static header values for common content types.
pub(crate) mod content_types {
    use super::*;
    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
    pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
    pub static OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");
}

/// Pre-allocated static bodies for common responses.
mod static_bodies {
    use super::*;
    pub static NOT_FOUND: Bytes = Bytes::from_static(b"404 Not Found");
    pub static INTERNAL_ERROR: Bytes = Bytes::from_static(b"Internal Server Error");
    pub static GATEWAY_TIMEOUT: Bytes = Bytes::from_static(b"Gateway Timeout");
    pub static PAYLOAD_TOO_LARGE: Bytes = Bytes::from_static(b"Payload Too Large");
    pub static BAD_REQUEST: Bytes = Bytes::from_static(b"Bad Request");
}

/// HTTP response.
///
/// Headers may repeat (several `Set-Cookie` lines, for example). The body is
/// either buffered or a stream the transport pulls incrementally.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Create a response from parts.
    #[inline]
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a new response builder.
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create a plain-text response with the given status.
    #[inline]
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(header::CONTENT_TYPE, content_types::TEXT_PLAIN.clone());
        Self {
            status,
            headers,
            body: Body::Full(body.into()),
        }
    }

    /// Default not-found response.
    #[inline]
    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, static_bodies::NOT_FOUND.clone())
    }

    /// Default error response (generic message, no details leaked).
    #[inline]
    pub fn internal_error() -> Self {
        Self::text(
            StatusCode::INTERNAL_SERVER_ERROR,
            static_bodies::INTERNAL_ERROR.clone(),
        )
    }

    /// 400 with a generic body. Parsing details stay in the logs.
    #[inline]
    pub fn bad_request() -> Self {
        Self::text(StatusCode::BAD_REQUEST, static_bodies::BAD_REQUEST.clone())
    }

    /// Create a 413 Payload Too Large response.
    #[inline]
    pub fn payload_too_large() -> Self {
        Self::text(
            StatusCode::PAYLOAD_TOO_LARGE,
            static_bodies::PAYLOAD_TOO_LARGE.clone(),
        )
    }

    /// Create a 504 Gateway Timeout response.
    #[inline]
    pub fn gateway_timeout() -> Self {
        Self::text(
            StatusCode::GATEWAY_TIMEOUT,
            static_bodies::GATEWAY_TIMEOUT.clone(),
        )
    }

    /// Create an empty response with given status.
    #[inline]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    // Getters

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the body.
    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get all values of a repeated header.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get Content-Type header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Body length, if known without consuming a stream.
    #[inline]
    pub fn body_len(&self) -> Option<usize> {
        self.body.size_hint()
    }

    /// Split into status, headers and body.
    #[inline]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Body) {
        (self.status, self.headers, self.body)
    }

    /// Take the body, leaving the rest of the response.
    #[inline]
    pub fn into_body(self) -> Body {
        self.body
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(StatusCode::OK)
    }
}

/// Builder for creating HTTP responses.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Option<HeaderMap>, // Lazy allocation
    body: Body,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    /// Create a new response builder.
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: None,
            body: Body::Empty,
        }
    }

    /// Set the status code.
    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Append header with typed HeaderName and HeaderValue.
    #[inline]
    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .append(name, value);
        self
    }

    /// Append header by strings.
    #[inline]
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => self.header_value(name, value),
            _ => self,
        }
    }

    /// Set the body.
    #[inline]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Set Content-Type to text/html.
    #[inline]
    pub fn html(self) -> Self {
        self.header_value(header::CONTENT_TYPE, content_types::TEXT_HTML.clone())
    }

    /// Set Content-Type to application/json.
    #[inline]
    pub fn json(self) -> Self {
        self.header_value(header::CONTENT_TYPE, content_types::APPLICATION_JSON.clone())
    }

    /// Set Content-Type to text/plain.
    #[inline]
    pub fn text(self) -> Self {
        self.header_value(header::CONTENT_TYPE, content_types::TEXT_PLAIN.clone())
    }

    /// Build the response.
    #[inline]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.unwrap_or_default(),
            body: self.body,
        }
    }
}
