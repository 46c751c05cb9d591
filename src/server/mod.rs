//! HTTP server driving an [`App`].
//!
//! Each accepted connection is served on its own task with HTTP/1.1 and
//! HTTP/2 auto-detection. Requests are collected under the configured body
//! limit, dispatched through [`App::handle`] and written back, streamed
//! bodies frame by frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_onion::{App, Server, ServerConfig};
//!
//! let app = App::builder().get("/ping", ping).build();
//! let server = Arc::new(Server::new(ServerConfig::from_env()?, app));
//!
//! let runner = Arc::clone(&server);
//! tokio::spawn(async move { runner.run().await });
//!
//! tokio::signal::ctrl_c().await?;
//! server.trigger_shutdown();
//! server.wait_for_drain(server.drain_timeout()).await;
//! ```
//!
//! # Graceful Shutdown
//!
//! [`Server::trigger_shutdown`] stops the accept loop and asks every open
//! connection to finish its in-flight requests and close.
//! [`Server::wait_for_drain`] then waits for the connection count to reach
//! zero, bounded by a timeout.

mod connection;
pub mod response;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::config::ServerConfig;
use connection::ConnectionContext;

pub use response::{FrameStream, HttpBody};

/// Network front end for an [`App`].
pub struct Server<V = crate::core::Variables> {
    config: ServerConfig,
    ctx: Arc<ConnectionContext<V>>,
    active_connections: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: AtomicBool,
}

impl<V: Send + 'static> Server<V> {
    pub fn new(config: ServerConfig, app: App<V>) -> Self {
        let active_connections = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ctx = Arc::new(ConnectionContext {
            app,
            max_body_size: config.max_body_size,
            header_timeout: config.header_timeout,
            access_log: config.access_log,
            active_connections: Arc::clone(&active_connections),
        });

        Self {
            config,
            ctx,
            active_connections,
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    /// Bind the configured address and serve until shutdown is triggered.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown is triggered.
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            routes = self.ctx.app.routes().count() as u64,
            max_body_size = self.config.max_body_size as u64,
            "Server listening"
        );

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow_and_update() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);

                    let ctx = Arc::clone(&self.ctx);
                    let conn_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Trigger graceful shutdown. Later calls are no-ops.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutdown initiated");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Get the configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout
    }

    /// Number of connections currently open.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Configured listen address (the port may be 0).
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }

    pub fn app(&self) -> &App<V> {
        &self.ctx.app
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_connections();
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}
