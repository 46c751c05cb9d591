//! Basic HTTP tests: routing, params, JSON bodies, 404, headers.

use crate::helpers::*;
use reqwest::StatusCode;
use tokio_onion::middleware::handler_fn;
use tokio_onion::{App, Context};

fn app() -> App {
    App::builder()
        .get(
            "/ping",
            handler_fn(|ctx: &mut Context| Box::pin(async move { ctx.text("pong") })),
        )
        .post(
            "/users",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    let mut user: serde_json::Value = ctx.body_json()?;
                    user["id"] = serde_json::json!(7);
                    ctx.set_status(StatusCode::CREATED).json(&user)
                })
            }),
        )
        .get(
            "/users/:id/posts/:post",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    let id = ctx.param("id").unwrap_or_default().to_string();
                    let post = ctx.param("post").unwrap_or_default().to_string();
                    ctx.text(format!("{}|{}", id, post))
                })
            }),
        )
        .get(
            "/search",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    let q = ctx.query("q").unwrap_or_default().to_string();
                    let tags = ctx.query_all("tag").join(",");
                    ctx.text(format!("{};{}", q, tags))
                })
            }),
        )
        .get(
            "/cookies",
            handler_fn(|ctx: &mut Context| {
                Box::pin(async move {
                    ctx.set_header("set-cookie", "a=1")?;
                    ctx.set_header("set-cookie", "b=2")?;
                    ctx.empty(StatusCode::NO_CONTENT)
                })
            }),
        )
        .get(
            "/old",
            handler_fn(|ctx: &mut Context| Box::pin(async move { ctx.redirect("/ping") })),
        )
        .build()
}

#[tokio::test]
async fn test_get_ping() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/ping").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "text/plain; charset=utf-8");
    assert_eq!(resp.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_post_json_created() {
    let server = TestServer::start(app()).await;
    let resp = server
        .post_json("/users", &serde_json::json!({"name": "ada"}))
        .await;

    assert_status(&resp, StatusCode::CREATED);
    assert_header_starts_with(&resp, "content-type", "application/json");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "ada");
    assert_eq!(body["id"], 7);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = TestServer::start(app()).await;
    let resp = server.post_raw("/users", "{not json").await;

    assert_status(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_route_params_are_decoded() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/users/a%20b/posts/9").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "a b|9");
}

#[tokio::test]
async fn test_query_parameters() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/search?q=rust+lang&tag=a&tag=b").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "rust lang;a,b");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/nope").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_body_contains(resp, "Not Found").await;
}

#[tokio::test]
async fn test_method_mismatch_is_404() {
    let server = TestServer::start(app()).await;
    let resp = server
        .client
        .delete(server.url("/ping"))
        .send()
        .await
        .unwrap();

    assert_status(&resp, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_repeated_headers_survive() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/cookies").await;

    assert_status(&resp, StatusCode::NO_CONTENT);
    let cookies: Vec<_> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn test_redirect() {
    let server = TestServer::start(app()).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client.get(server.url("/old")).send().await.unwrap();

    assert_status(&resp, StatusCode::FOUND);
    assert_header(&resp, "location", "/ping");
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let config = tokio_onion::ServerConfig {
        max_body_size: 1024,
        ..tokio_onion::ServerConfig::local()
    };
    let server = TestServer::start_with(config, app()).await;

    let resp = server.post_raw("/users", vec![b'x'; 4096]).await;
    assert_status(&resp, StatusCode::PAYLOAD_TOO_LARGE);

    // Under the limit still reaches the dispatcher
    let resp = server
        .post_json("/users", &serde_json::json!({"name": "small"}))
        .await;
    assert_status(&resp, StatusCode::CREATED);
}

#[tokio::test]
async fn test_keep_alive_serves_many_requests() {
    let server = TestServer::start(app()).await;
    for _ in 0..20 {
        let resp = server.get("/ping").await;
        assert_status(&resp, StatusCode::OK);
    }
}
