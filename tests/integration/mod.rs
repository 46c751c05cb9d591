//! Integration tests for tokio_onion
//!
//! Each test starts a real server on an ephemeral loopback port and talks to
//! it over HTTP with reqwest.
//!
//! Run with: cargo test --test integration

mod helpers;

mod http_basic;
mod middleware;
mod streaming;
mod shutdown;
