//! Per-request context: request accessors, response builder and variables.

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::body::Body;
use super::error::{Error, Result};
use super::request::Request;
use super::response::{content_types, Response};
use super::vars::Variables;
use crate::routing::Params;

/// Request context shared by the middleware chain and the handler.
///
/// One context exists per request and is exclusively owned by that
/// request's execution. Middleware and handlers read the request through
/// it, build the response in place, and pass typed state forward through
/// [`vars`](Context::vars). The dispatcher reads the response off it once
/// the chain completes.
///
/// Only one body-producing helper may be called per request. A second call
/// returns [`Error::ResponseAlreadySet`] instead of overwriting the first.
pub struct Context<V = Variables> {
    request: Request,
    params: Params,
    query: Vec<(String, String)>,
    request_id: String,
    started_at: Instant,

    status: StatusCode,
    headers: HeaderMap,
    body: Option<Body>,

    vars: V,
}

impl<V> Context<V> {
    /// Create a context for a resolved (or unresolved) request.
    pub fn new(request: Request, params: Params, vars: V) -> Self {
        let query = request.query().map(parse_query_string).unwrap_or_default();
        let request_id = request
            .request_id()
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        Self {
            request,
            params,
            query,
            request_id,
            started_at: Instant::now(),
            status: StatusCode::OK,
            headers: HeaderMap::with_capacity(4),
            body: None,
            vars,
        }
    }

    // Request accessors

    /// The underlying request.
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Request header by name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Path parameter bound by the matched route.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// All path parameters in pattern order.
    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Decoded query parameter (first occurrence).
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeated query parameter.
    pub fn query_all(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// All decoded query pairs.
    #[inline]
    pub fn queries(&self) -> &[(String, String)] {
        &self.query
    }

    /// Raw request body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Request body as UTF-8 text.
    pub fn body_text(&self) -> Result<&str> {
        std::str::from_utf8(self.request.body())
            .map_err(|e| Error::InvalidRequest(format!("body is not valid UTF-8: {}", e)))
    }

    /// Request body decoded as JSON.
    ///
    /// Decoding failures are reported as [`Error::InvalidRequest`]; handlers
    /// usually turn that into a 400 themselves.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(self.request.body())
            .map_err(|e| Error::InvalidRequest(format!("invalid JSON body: {}", e)))
    }

    /// Peer address, if the transport supplied one.
    #[inline]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.request.remote_addr()
    }

    /// Request ID (from `X-Request-ID` or generated).
    #[inline]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Time since the context was created.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    // Variables

    #[inline]
    pub fn vars(&self) -> &V {
        &self.vars
    }

    #[inline]
    pub fn vars_mut(&mut self) -> &mut V {
        &mut self.vars
    }

    // Response mutators

    /// Current response status (200 unless changed).
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the response status.
    #[inline]
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Response headers set so far.
    #[inline]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Append a response header. Repeated names are kept (e.g. `Set-Cookie`).
    pub fn set_header<K, T>(&mut self, name: K, value: T) -> Result<()>
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        T: TryInto<HeaderValue>,
        T::Error: fmt::Display,
    {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Set a response header, replacing any existing values.
    pub fn insert_header<K, T>(&mut self, name: K, value: T) -> Result<()>
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        T: TryInto<HeaderValue>,
        T::Error: fmt::Display,
    {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Remove a response header, returning its first value.
    pub fn remove_header(&mut self, name: &str) -> Option<HeaderValue> {
        self.headers.remove(name)
    }

    /// Check if a body-producing helper has already run.
    #[inline]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    // Body helpers

    /// Respond with JSON using the current status.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.ensure_no_body()?;
        let bytes = serde_json::to_vec(value)?;
        self.write_body(Some(&content_types::APPLICATION_JSON), Body::Full(bytes.into()))
    }

    /// Respond with plain text using the current status.
    pub fn text(&mut self, value: impl Into<Bytes>) -> Result<()> {
        self.write_body(Some(&content_types::TEXT_PLAIN), Body::Full(value.into()))
    }

    /// Respond with HTML using the current status.
    pub fn html(&mut self, value: impl Into<Bytes>) -> Result<()> {
        self.write_body(Some(&content_types::TEXT_HTML), Body::Full(value.into()))
    }

    /// Redirect with 302 Found.
    pub fn redirect(&mut self, location: &str) -> Result<()> {
        self.redirect_with(location, StatusCode::FOUND)
    }

    /// Redirect with an explicit 3xx status.
    pub fn redirect_with(&mut self, location: &str, status: StatusCode) -> Result<()> {
        self.ensure_no_body()?;
        let value = HeaderValue::try_from(location)
            .map_err(|e| Error::InvalidHeader(format!("location: {}", e)))?;
        self.headers.insert(header::LOCATION, value);
        self.status = status;
        self.write_body(None, Body::Empty)
    }

    /// Respond with an incrementally produced body.
    ///
    /// Content-Type defaults to `application/octet-stream` unless a header
    /// was set earlier.
    pub fn stream(&mut self, body: Body) -> Result<()> {
        self.ensure_no_body()?;
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, content_types::OCTET_STREAM.clone());
        }
        self.write_body(None, body)
    }

    /// Respond with a streamed body and extra headers (replacing same-named ones).
    pub fn stream_with<I>(&mut self, body: Body, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = (HeaderName, HeaderValue)>,
    {
        self.ensure_no_body()?;
        for (name, value) in headers {
            self.headers.insert(name, value);
        }
        self.stream(body)
    }

    /// Finish with an empty body and the given status.
    pub fn empty(&mut self, status: StatusCode) -> Result<()> {
        self.ensure_no_body()?;
        self.status = status;
        self.write_body(None, Body::Empty)
    }

    /// Respond with a prebuilt [`Response`], such as one of the canned ones.
    ///
    /// Its headers are added to those already set on the context.
    pub fn respond(&mut self, response: Response) -> Result<()> {
        self.ensure_no_body()?;
        let (status, headers, body) = response.into_parts();
        let mut last = None;
        for (name, value) in headers {
            // `None` names continue the previous header's values
            if let Some(name) = name {
                last = Some(name);
            }
            if let Some(name) = &last {
                self.headers.append(name.clone(), value);
            }
        }
        self.status = status;
        self.write_body(None, body)
    }

    /// Consume the context and produce the final response.
    pub fn into_response(self) -> Response {
        Response::from_parts(self.status, self.headers, self.body.unwrap_or_default())
    }

    /// Drop whatever response has been built so far.
    pub(crate) fn reset_response(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body = None;
    }

    fn ensure_no_body(&self) -> Result<()> {
        if self.body.is_some() {
            warn!(
                request_id = %self.request_id,
                path = %self.request.path(),
                "response body written twice"
            );
            return Err(Error::ResponseAlreadySet);
        }
        Ok(())
    }

    fn write_body(&mut self, content_type: Option<&HeaderValue>, body: Body) -> Result<()> {
        self.ensure_no_body()?;
        if let Some(ct) = content_type {
            self.headers.insert(header::CONTENT_TYPE, ct.clone());
        }
        self.body = Some(body);
        Ok(())
    }
}

impl<V> fmt::Debug for Context<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.method())
            .field("path", &self.path())
            .field("request_id", &self.request_id)
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

fn header_pair<K, T>(name: K, value: T) -> Result<(HeaderName, HeaderValue)>
where
    K: TryInto<HeaderName>,
    K::Error: fmt::Display,
    T: TryInto<HeaderValue>,
    T::Error: fmt::Display,
{
    let name = name
        .try_into()
        .map_err(|e| Error::InvalidHeader(format!("name: {}", e)))?;
    let value = value
        .try_into()
        .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
    Ok((name, value))
}

/// Decode one form-urlencoded component (`+` is a space).
#[inline]
fn decode_component(s: &str) -> String {
    let s: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };
    if s.contains('%') {
        percent_encoding::percent_decode_str(&s)
            .decode_utf8_lossy()
            .into_owned()
    } else {
        s.into_owned()
    }
}

/// Parse a query string into decoded key-value pairs.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    let pair_count = query.matches('&').count() + 1;
    let mut params = Vec::with_capacity(pair_count.min(16));

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        if !key.is_empty() {
            params.push((decode_component(key), decode_component(value)));
        }
    }

    params
}

/// Generate a request ID (UUID v4, simple format).
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
