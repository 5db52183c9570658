//! Engine and request dispatch
//!
//! [`Engine`] is the registration-phase owner of the route table and the
//! group list; it dereferences to its root group, so routes and middleware can
//! be added to it directly. [`Engine::build`] seals registration and freezes
//! everything into a [`Dispatcher`], the immutable request-time view that is
//! shared across concurrent requests.

use crate::context::{Context, Handler};
use crate::group::RouteGroup;
use crate::router::RouteTable;
use crate::{Request, Response, Result, StatusCode};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Registration entry point
pub struct Engine {
    root: RouteGroup,
}

impl Engine {
    /// Create an engine with an empty root group
    pub fn new() -> Self {
        Self {
            root: RouteGroup::root(),
        }
    }

    /// Seal registration and freeze routes and middleware for serving
    ///
    /// Group handles that outlive the engine reject route registration from
    /// here on.
    pub fn build(self) -> Dispatcher {
        let mut registry = self.root.registry().write();
        registry.sealed = true;

        let scopes = registry
            .groups
            .iter()
            .map(|group| MiddlewareScope {
                prefix: group.prefix.clone(),
                middlewares: group.middlewares.read().clone(),
            })
            .collect();

        Dispatcher {
            table: std::mem::take(&mut registry.table),
            scopes,
            not_found: Arc::new(not_found),
        }
    }

    /// Build the dispatcher and serve it on a dedicated multi-thread runtime
    ///
    /// Blocks until the server stops.
    #[cfg(feature = "native")]
    pub fn run(self, config: crate::ServerConfig) -> Result<()> {
        let dispatcher = Arc::new(self.build());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers.max(1))
            .enable_all()
            .build()?;
        runtime.block_on(crate::server::serve(dispatcher, &config))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Engine {
    type Target = RouteGroup;

    fn deref(&self) -> &RouteGroup {
        &self.root
    }
}

/// Frozen middleware list of one group
struct MiddlewareScope {
    prefix: String,
    middlewares: Vec<Handler>,
}

/// Request-time view of a built engine
///
/// Holds no locks and is never mutated; wrap it in an `Arc` to share it.
pub struct Dispatcher {
    table: RouteTable<Handler>,
    scopes: Vec<MiddlewareScope>,
    not_found: Handler,
}

impl Dispatcher {
    /// Middleware of every group whose prefix starts `path`
    ///
    /// Groups contribute in creation order, each group's list in insertion
    /// order. The match is a plain string prefix test.
    pub fn middlewares_for(&self, path: &str) -> Vec<Handler> {
        self.scopes
            .iter()
            .filter(|scope| path.starts_with(&scope.prefix))
            .flat_map(|scope| scope.middlewares.iter().cloned())
            .collect()
    }

    /// Dispatch one request through its middleware chain and handler
    ///
    /// A path without a matching route is answered by the not-found handler
    /// after the same middleware. The only error is a response that failed to
    /// encode.
    pub fn handle(&self, request: Request) -> Result<Response> {
        let mut handlers = self.middlewares_for(&request.path);
        let mut params = HashMap::new();

        match self.table.lookup(request.method, &request.path) {
            Some(matched) => {
                handlers.push(matched.value.clone());
                params = matched.params;
            }
            None => handlers.push(self.not_found.clone()),
        }

        let mut ctx = Context::new(request, handlers).with_params(params);
        ctx.next();
        ctx.into_response()
    }

    /// The frozen route table
    pub fn routes(&self) -> &RouteTable<Handler> {
        &self.table
    }
}

fn not_found(ctx: &mut Context) {
    let body = format!("404 NOT FOUND: {}\n", ctx.path());
    ctx.string(StatusCode::NOT_FOUND, body);
}
