//! Small demo server
//!
//! ```text
//! SPRIG_PORT=9999 RUST_LOG=sprig_core=debug cargo run -p sprig-core --example demo
//! curl localhost:9999/v1/hello?name=sprig
//! curl localhost:9999/v2/hello/sprig
//! curl localhost:9999/assets/css/site.css
//! curl -d 'username=alice&password=secret' localhost:9999/v2/login
//! ```

use serde_json::json;
use sprig_core::{middleware, Context, Engine, ServerConfig, StatusCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprig_core=debug,demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine = Engine::new();
    engine.use_middleware(middleware::logger());

    engine.get("/index", |ctx: &mut Context| {
        ctx.html(StatusCode::OK, "<h1>Index Page</h1>");
    })?;

    engine.get("/assets/*filepath", |ctx: &mut Context| {
        let filepath = ctx.param("filepath").unwrap_or_default().to_string();
        ctx.json(StatusCode::OK, &json!({ "filepath": filepath }));
    })?;

    let v1 = engine.group("/v1");
    v1.get("/", |ctx: &mut Context| {
        ctx.html(StatusCode::OK, "<h1>Hello v1!</h1>");
    })?;
    v1.get("/hello", |ctx: &mut Context| {
        let body = format!("hello {}, you're at {}\n", ctx.query("name"), ctx.path());
        ctx.string(StatusCode::OK, body);
    })?;

    let v2 = engine.group("/v2");
    v2.get("/hello/:name", |ctx: &mut Context| {
        let body = format!("hello {}, you're at {}\n", ctx.param("name").unwrap_or_default(), ctx.path());
        ctx.string(StatusCode::OK, body);
    })?;
    v2.post("/login", |ctx: &mut Context| {
        let body = json!({
            "username": ctx.post_form("username"),
            "password": ctx.post_form("password"),
        });
        ctx.json(StatusCode::OK, &body);
    })?;

    let config = ServerConfig::from_env();
    tracing::info!(port = config.port, "demo starting");
    engine.run(config)?;
    Ok(())
}
