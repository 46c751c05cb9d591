//! Per-connection serving: protocol detection, body limits, access log.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

use super::response::{canned, from_http_parts, into_http_response, HttpBody};
use crate::app::App;
use crate::core::Response;
use crate::logging::ACCESS_TARGET;

/// Errors that only mean the peer went away or stalled.
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("deadline has elapsed")
        || err_str.contains("HeaderTimeout")
}

/// Keeps the active connection count honest on every exit path.
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// State shared by every connection of one server.
pub(crate) struct ConnectionContext<V> {
    pub app: App<V>,
    pub max_body_size: usize,
    pub header_timeout: Duration,
    pub access_log: bool,
    pub active_connections: Arc<AtomicUsize>,
}

impl<V: Send + 'static> ConnectionContext<V> {
    /// Serve one accepted TCP connection until it closes.
    ///
    /// When `shutdown_rx` fires, in-flight requests finish and the
    /// connection is closed instead of kept alive.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let _guard = ConnectionGuard::new(Arc::clone(&self.active_connections));

        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, remote_addr).await }
        });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Some(self.header_timeout))
            .keep_alive(true)
            .http2()
            .max_concurrent_streams(250);

        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            res = conn.as_mut() => res,
            _ = shutdown_rx.changed() => {
                debug!(ip = %remote_addr, "Closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(err) = result {
            let err_str = format!("{:?}", err);
            if is_connection_error(&err_str) {
                debug!(ip = %remote_addr, error = %err_str, "Transport error");
            } else {
                debug!("Connection error: {}", err_str);
            }
        }
    }

    async fn handle_request(
        &self,
        req: hyper::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<hyper::Response<HttpBody>, Infallible> {
        let start = Instant::now();
        let (parts, body) = req.into_parts();

        let declared = parts
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_size) {
            debug!(ip = %remote_addr, limit = self.max_body_size, "Request body over limit");
            return canned(Response::payload_too_large());
        }

        let bytes = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                debug!(ip = %remote_addr, limit = self.max_body_size, "Request body over limit");
                return canned(Response::payload_too_large());
            }
            Err(err) => {
                debug!(ip = %remote_addr, error = %err, "Failed to read request body");
                return canned(Response::bad_request());
            }
        };

        let request = from_http_parts(parts, bytes, remote_addr);

        // Captured before the request moves into the dispatcher
        let access = self.access_log.then(|| AccessFields {
            method: request.method().to_string(),
            path: request.path().to_string(),
            request_id: request.request_id().unwrap_or("-").to_string(),
            user_agent: request.user_agent().unwrap_or("-").to_string(),
            version: request.version(),
        });

        let response = self.app.handle(request).await;

        if let Some(access) = access {
            info!(
                target: ACCESS_TARGET,
                method = %access.method,
                path = %access.path,
                status = response.status().as_u16() as u64,
                bytes = response.body_len().unwrap_or(0) as u64,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                request_id = %access.request_id,
                ip = %remote_addr.ip(),
                ua = %access.user_agent,
                http = ?access.version,
            );
        }

        Ok(into_http_response(response))
    }
}

struct AccessFields {
    method: String,
    path: String,
    request_id: String,
    user_agent: String,
    version: http::Version,
}
