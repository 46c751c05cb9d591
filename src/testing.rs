//! In-process test harness.
//!
//! [`TestClient`] feeds requests straight into [`App::handle`], the same
//! entry point the network server uses, so tests exercise the served
//! behaviour without opening a socket.
//!
//! ```rust,ignore
//! let client = TestClient::new(app);
//! let res = client.get("/ping").await?;
//! assert_eq!(res.status(), StatusCode::OK);
//! assert_eq!(res.text(), "pong");
//! ```

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::App;
use crate::core::{Error, Request, Response, Result, Variables};

/// Drives an [`App`] in process.
pub struct TestClient<V = Variables> {
    app: App<V>,
}

impl<V: Send + 'static> TestClient<V> {
    pub fn new(app: App<V>) -> Self {
        Self { app }
    }

    /// The app under test.
    pub fn app(&self) -> &App<V> {
        &self.app
    }

    /// Start building a request.
    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_, V> {
        TestRequest {
            client: self,
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    pub async fn get(&self, path: &str) -> Result<TestResponse> {
        self.request(Method::GET, path).send().await
    }

    pub async fn delete(&self, path: &str) -> Result<TestResponse> {
        self.request(Method::DELETE, path).send().await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<TestResponse> {
        self.request(Method::POST, path).json(value).send().await
    }

    /// Dispatch a prepared request and buffer the response body.
    pub async fn send(&self, request: Request) -> Result<TestResponse> {
        TestResponse::from_response(self.app.handle(request).await).await
    }

    /// Dispatch a prepared request, leaving a streamed body unread.
    pub async fn send_streaming(&self, request: Request) -> Response {
        self.app.handle(request).await
    }
}

/// Request under construction. See [`TestClient::request`].
pub struct TestRequest<'a, V> {
    client: &'a TestClient<V>,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    error: Option<Error>,
}

impl<'a, V: Send + 'static> TestRequest<'a, V> {
    /// Append a request header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => {
                self.error
                    .get_or_insert_with(|| Error::InvalidHeader(format!("{}: {}", name, value)));
            }
        }
        self
    }

    /// Raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON request body with a matching Content-Type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = bytes.into();
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Err(e) => {
                self.error.get_or_insert(Error::Json(e));
            }
        }
        self
    }

    /// Build the request without sending it.
    pub fn build(self) -> Result<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let uri: Uri = self
            .path
            .parse()
            .map_err(|e| Error::InvalidRequest(format!("uri {}: {}", self.path, e)))?;
        Ok(Request::new(self.method, uri, self.headers, self.body))
    }

    /// Dispatch and buffer the response.
    pub async fn send(self) -> Result<TestResponse> {
        let client = self.client;
        let request = self.build()?;
        client.send(request).await
    }

    /// Dispatch, leaving a streamed body unread.
    pub async fn send_streaming(self) -> Result<Response> {
        let client = self.client;
        let request = self.build()?;
        Ok(client.send_streaming(request).await)
    }
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Buffer a dispatcher response, draining streamed bodies.
    pub async fn from_response(response: Response) -> Result<Self> {
        let (status, headers, body) = response.into_parts();
        let body = body.collect().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header, in order.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
