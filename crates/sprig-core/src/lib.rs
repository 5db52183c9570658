//! sprig-core: route groups, middleware chains and request dispatch
//!
//! Registration happens on an [`Engine`] (and the [`RouteGroup`]s it hands
//! out); [`Engine::build`] freezes it into a [`Dispatcher`] that turns each
//! [`Request`] into a [`Response`] by running the matching middleware and
//! handler through a cooperative [`Context`] chain.
//!
//! ```
//! use sprig_core::{middleware, Context, Engine, Method, Request, StatusCode};
//!
//! let engine = Engine::new();
//! engine.use_middleware(middleware::logger());
//!
//! let v1 = engine.group("/v1");
//! v1.get("/hello/:name", |ctx: &mut Context| {
//!     let body = format!("hello {}", ctx.param("name").unwrap_or("stranger"));
//!     ctx.string(StatusCode::OK, body);
//! })?;
//!
//! let dispatcher = engine.build();
//! let res = dispatcher.handle(Request::new(Method::Get, "/v1/hello/sprig"))?;
//! assert_eq!(res.body_string().as_deref(), Some("hello sprig"));
//! # Ok::<(), sprig_core::Error>(())
//! ```
//!
//! ## Features
//! - `native` (default) - tokio/hyper transport in [`server`] and [`Engine::run`]

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod group;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;

#[cfg(feature = "native")]
pub mod server;

// Re-exports
pub use config::ServerConfig;
pub use context::{Context, Handler, IntoHandler};
pub use engine::{Dispatcher, Engine};
pub use error::{Error, Result};
pub use group::RouteGroup;
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use router::{RouteMatch, RouteTable};
pub use sprig_router::{parse_pattern, RouteConflict};
