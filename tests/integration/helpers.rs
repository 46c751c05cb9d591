//! Test helpers and utilities

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tokio_onion::{App, Server, ServerConfig};

/// Server running on an ephemeral loopback port for one test.
pub struct TestServer<V = tokio_onion::Variables> {
    pub base_url: String,
    pub client: Client,
    pub server: Arc<Server<V>>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

#[allow(dead_code)]
impl<V: Send + 'static> TestServer<V> {
    /// Start `app` with the default local configuration.
    pub async fn start(app: App<V>) -> Self {
        Self::start_with(ServerConfig::local(), app).await
    }

    /// Start `app` with a custom configuration (the listen address is ignored).
    pub async fn start_with(config: ServerConfig, app: App<V>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");

        let server = Arc::new(Server::new(config, app));
        let runner = Arc::clone(&server);
        let handle = tokio::spawn(async move { runner.run_with_listener(listener).await });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            server,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Make a POST request with JSON body
    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, json: &T) -> Response {
        self.client
            .post(self.url(path))
            .json(json)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a POST request with a raw body
    pub async fn post_raw(&self, path: &str, body: impl Into<reqwest::Body>) -> Response {
        self.client
            .post(self.url(path))
            .body(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Stop accepting, then wait for the accept loop to exit.
    pub async fn stop(&mut self) {
        self.server.trigger_shutdown();
        if let Some(handle) = self.handle.take() {
            let result = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("accept loop did not stop")
                .expect("server task panicked");
            assert!(result.is_ok(), "server returned error: {:?}", result);
        }
    }
}

impl<V> Drop for TestServer<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Assert that response contains header with prefix
#[allow(dead_code)]
pub fn assert_header_starts_with(response: &Response, name: &str, prefix: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert!(
        value.starts_with(prefix),
        "Header '{}' expected to start with '{}', got '{}'",
        name,
        prefix,
        value
    );
}

/// Assert that response body contains substring
#[allow(dead_code)]
pub async fn assert_body_contains(response: Response, substring: &str) {
    let body = response.text().await.expect("Failed to read body");
    assert!(
        body.contains(substring),
        "Body does not contain '{}'. Body: {}",
        substring,
        &body[..body.len().min(500)]
    );
}
