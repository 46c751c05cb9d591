//! Onion middleware over the network: ordering, short-circuit, typed
//! variables, error handling and timeouts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::helpers::*;
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_onion::middleware::{error_handler_fn, handler_fn, Middleware, Next};
use tokio_onion::{App, Context, Error, Result};

#[derive(Default)]
struct AuthVars {
    user: Option<String>,
}

struct Auth;

#[async_trait]
impl Middleware<AuthVars> for Auth {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(&self, ctx: &mut Context<AuthVars>, next: Next<'_, AuthVars>) -> Result<()> {
        match ctx.header("authorization").map(str::to_string) {
            Some(token) => {
                ctx.vars_mut().user = Some(token);
                next.run(ctx).await
            }
            None => ctx.set_status(StatusCode::UNAUTHORIZED).text("Unauthorized"),
        }
    }
}

fn auth_app(handled: Arc<AtomicUsize>) -> App<AuthVars> {
    App::with_env(AuthVars::default)
        .with(Auth)
        .get(
            "/me",
            handler_fn(move |ctx: &mut Context<AuthVars>| {
                let handled = Arc::clone(&handled);
                Box::pin(async move {
                    handled.fetch_add(1, Ordering::SeqCst);
                    let user = ctx.vars().user.clone().unwrap_or_default();
                    ctx.text(user)
                })
            }),
        )
        .build()
}

#[tokio::test]
async fn test_auth_short_circuit() {
    let handled = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(auth_app(Arc::clone(&handled))).await;

    let resp = server.get("/me").await;
    assert_status(&resp, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.text().await.unwrap(), "Unauthorized");
    assert_eq!(handled.load(Ordering::SeqCst), 0);

    let resp = server.get_with_headers("/me", &[("authorization", "alice")]).await;
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "alice");
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_variables_do_not_leak_between_requests() {
    let handled = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(auth_app(handled)).await;

    let first = server.get_with_headers("/me", &[("authorization", "bob")]).await;
    assert_eq!(first.text().await.unwrap(), "bob");

    let second = server.get("/me").await;
    assert_status(&second, StatusCode::UNAUTHORIZED);
}

fn layered_app() -> App {
    App::builder()
        .use_fn(|ctx: &mut Context, next| {
            Box::pin(async move {
                ctx.set_header("x-trace", "outer-in")?;
                let result = next.run(ctx).await;
                ctx.set_header("x-trace", "outer-out")?;
                result
            })
        })
        .use_fn(|ctx: &mut Context, next| {
            Box::pin(async move {
                ctx.set_header("x-trace", "inner-in")?;
                let result = next.run(ctx).await;
                ctx.set_header("x-trace", "inner-out")?;
                result
            })
        })
        .get(
            "/",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    ctx.set_header("x-trace", "handler")?;
                    ctx.text("ok")
                })
            }),
        )
        .build()
}

#[tokio::test]
async fn test_onion_order() {
    let server = TestServer::start(layered_app()).await;
    let resp = server.get("/").await;

    assert_status(&resp, StatusCode::OK);
    let trace: Vec<_> = resp
        .headers()
        .get_all("x-trace")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        trace,
        vec!["outer-in", "inner-in", "handler", "inner-out", "outer-out"]
    );
}

#[tokio::test]
async fn test_middleware_wraps_not_found() {
    let server = TestServer::start(layered_app()).await;
    let resp = server.get("/missing").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get_all("x-trace").iter().count(), 4);
}

#[tokio::test]
async fn test_custom_error_handler() {
    let app = App::builder()
        .get(
            "/fail",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    ctx.set_header("x-partial", "yes")?;
                    Err(Error::Custom("database unavailable".into()))
                })
            }),
        )
        .on_error(error_handler_fn(|err: Error, ctx: &mut Context| {
            Box::pin(async move {
                ctx.set_status(StatusCode::SERVICE_UNAVAILABLE)
                    .json(&serde_json::json!({ "error": err.to_string() }))
            })
        }))
        .build();
    let server = TestServer::start(app).await;

    let resp = server.get("/fail").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.headers().get("x-partial").is_none());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "database unavailable");
}

#[tokio::test]
async fn test_panic_becomes_500_and_server_survives() {
    let app = App::builder()
        .get(
            "/panic",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    if ctx.path() == "/panic" {
                        panic!("handler exploded");
                    }
                    ctx.text("unreachable")
                })
            }),
        )
        .get(
            "/ping",
            handler_fn(|ctx: &mut Context| Box::pin(async move { ctx.text("pong") })),
        )
        .build();
    let server = TestServer::start(app).await;

    let resp = server.get("/panic").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);

    let resp = server.get("/ping").await;
    assert_status(&resp, StatusCode::OK);
}

#[tokio::test]
async fn test_request_timeout_is_504() {
    let app = App::builder()
        .request_timeout(Some(Duration::from_millis(100)))
        .get(
            "/slow",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    ctx.text("late")
                })
            }),
        )
        .build();
    let server = TestServer::start(app).await;

    let resp = server.get("/slow").await;
    assert_status(&resp, StatusCode::GATEWAY_TIMEOUT);
}
