use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::Deserialize;
use tracing::{error, info};

use tokio_onion::middleware::{handler_fn, Middleware, Next};
use tokio_onion::{logging, App, Body, Config, Context, HasVariables, Result, Server, Variables};

/// Per-request state of the demo application.
#[derive(Default)]
struct AppVars {
    principal: Option<String>,
    base: Variables,
}

impl HasVariables for AppVars {
    fn variables(&self) -> &Variables {
        &self.base
    }

    fn variables_mut(&mut self) -> &mut Variables {
        &mut self.base
    }
}

/// Containers that can carry an authenticated principal.
trait HasPrincipal {
    fn principal(&self) -> Option<&str>;
    fn set_principal(&mut self, principal: String);
}

impl HasPrincipal for AppVars {
    fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    fn set_principal(&mut self, principal: String) {
        self.principal = Some(principal);
    }
}

/// Guards every path whose first segment is `area` with a bearer token.
///
/// Segments are split the way the router splits them, so `//admin/x` and
/// `/admin//x` are guarded too.
struct RequireAuth {
    area: &'static str,
}

impl RequireAuth {
    fn guards(&self, path: &str) -> bool {
        path.split('/').find(|s| !s.is_empty()) == Some(self.area)
    }
}

#[async_trait]
impl<V: HasPrincipal + Send + 'static> Middleware<V> for RequireAuth {
    fn name(&self) -> &'static str {
        "require_auth"
    }

    async fn handle(&self, ctx: &mut Context<V>, next: Next<'_, V>) -> Result<()> {
        if !self.guards(ctx.path()) {
            return next.run(ctx).await;
        }

        let token = ctx
            .header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        match token {
            Some(token) => {
                ctx.vars_mut().set_principal(token);
                next.run(ctx).await
            }
            None => {
                ctx.set_header("www-authenticate", "Bearer")?;
                ctx.set_status(StatusCode::UNAUTHORIZED).text("Unauthorized")
            }
        }
    }
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

fn build_app(request_timeout: Option<Duration>) -> App<AppVars> {
    App::with_env(AppVars::default)
        .request_timeout(request_timeout)
        .with(RequireAuth { area: "admin" })
        .get(
            "/ping",
            handler_fn(|ctx: &mut Context<AppVars>| Box::pin(async move { ctx.text("pong") })),
        )
        .post(
            "/users",
            handler_fn(|ctx: &mut Context<AppVars>| {
                Box::pin(async move {
                    let user: NewUser = ctx.body_json()?;
                    let id = uuid::Uuid::new_v4().simple().to_string();
                    ctx.set_status(StatusCode::CREATED)
                        .json(&serde_json::json!({ "id": id, "name": user.name }))
                })
            }),
        )
        .get(
            "/users/:id",
            handler_fn(|ctx: &mut Context<AppVars>| {
                Box::pin(async move {
                    let id = ctx.param("id").unwrap_or_default().to_string();
                    ctx.json(&serde_json::json!({ "id": id }))
                })
            }),
        )
        .get(
            "/stream",
            handler_fn(|ctx: &mut Context<AppVars>| {
                Box::pin(async move {
                    let (tx, body) = Body::channel(8);
                    tokio::spawn(async move {
                        for i in 0..5 {
                            if tx.send(format!("tick {}\n", i)).await.is_err() {
                                break;
                            }
                            tokio::time::sleep(Duration::from_millis(200)).await;
                        }
                    });
                    ctx.insert_header("content-type", "text/plain; charset=utf-8")?;
                    ctx.stream(body)
                })
            }),
        )
        .get(
            "/admin/*",
            handler_fn(|ctx: &mut Context<AppVars>| {
                Box::pin(async move {
                    let who = ctx.vars().principal().unwrap_or("anonymous").to_string();
                    let path = ctx.path().to_string();
                    ctx.json(&serde_json::json!({ "principal": who, "path": path }))
                })
            }),
        )
        .build()
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    info!("Starting tokio_onion {}...", tokio_onion::PKG_VERSION);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(
    config: Config,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_app(config.server.request_timeout);
    let server = Arc::new(Server::new(config.server, app));

    let runner = Arc::clone(&server);
    let mut serve = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        result = &mut serve => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    server.trigger_shutdown();
    let _ = serve.await;

    if server.wait_for_drain(server.drain_timeout()).await {
        info!("All connections drained");
    }

    Ok(())
}
