//! Graceful shutdown: in-flight requests finish, new connections are refused.

use std::time::Duration;

use crate::helpers::*;
use reqwest::StatusCode;
use tokio_onion::middleware::handler_fn;
use tokio_onion::{App, Context};

fn app() -> App {
    App::builder()
        .get(
            "/slow",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    ctx.text("finished")
                })
            }),
        )
        .get(
            "/ping",
            handler_fn(|ctx: &mut Context| Box::pin(async move { ctx.text("pong") })),
        )
        .build()
}

#[tokio::test]
async fn test_in_flight_request_completes() {
    let mut server = TestServer::start(app()).await;

    let client = server.client.clone();
    let url = server.url("/slow");
    let in_flight = tokio::spawn(async move { client.get(url).send().await });

    // Let the request reach the handler
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.server.active_connections(), 1);

    server.stop().await;

    let resp = in_flight.await.unwrap().expect("in-flight request failed");
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "finished");

    assert!(server.server.wait_for_drain(Duration::from_secs(2)).await);
    assert_eq!(server.server.active_connections(), 0);
}

#[tokio::test]
async fn test_new_connections_refused_after_shutdown() {
    let mut server = TestServer::start(app()).await;

    let resp = server.get("/ping").await;
    assert_status(&resp, StatusCode::OK);

    server.stop().await;

    // Fresh client so no pooled connection is reused
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let result = client.get(server.url("/ping")).send().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_idle_keep_alive_connection_drains() {
    let mut server = TestServer::start(app()).await;

    // Leaves an idle pooled connection behind
    let resp = server.get("/ping").await;
    assert_eq!(resp.text().await.unwrap(), "pong");

    server.stop().await;
    assert!(server.server.wait_for_drain(Duration::from_secs(2)).await);
}
