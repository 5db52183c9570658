//! Route groups
//!
//! A group is a path prefix with its own middleware list. Sub-groups get the
//! parent's prefix with their suffix appended; they do not copy the parent's
//! middleware. Which middleware runs is decided per request by prefix
//! matching over every group, so middleware added to a parent after a
//! sub-group was created still reaches the sub-group's routes.
//!
//! All groups of one engine write into the same route table. Registration
//! happens before serving; once the engine is built the registry is sealed
//! and further registrations are rejected.

use crate::context::{Handler, IntoHandler};
use crate::router::RouteTable;
use crate::{Error, Method, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Prefix and middleware of one group
pub(crate) struct GroupState {
    pub(crate) prefix: String,
    pub(crate) middlewares: RwLock<Vec<Handler>>,
}

impl GroupState {
    fn new(prefix: String) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            middlewares: RwLock::new(Vec::new()),
        })
    }
}

/// Registration state shared by every group of an engine
#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) table: RouteTable<Handler>,
    /// Groups in creation order, root first
    pub(crate) groups: Vec<Arc<GroupState>>,
    pub(crate) sealed: bool,
}

pub(crate) type Registry = RwLock<RegistryState>;

/// Route group handle
///
/// Cloning a handle is cheap; clones refer to the same group.
#[derive(Clone)]
pub struct RouteGroup {
    state: Arc<GroupState>,
    registry: Arc<Registry>,
}

impl RouteGroup {
    /// Root group with an empty prefix, registered in a fresh registry
    pub(crate) fn root() -> Self {
        let state = GroupState::new(String::new());
        let registry = RegistryState {
            groups: vec![state.clone()],
            ..RegistryState::default()
        };
        Self {
            state,
            registry: Arc::new(RwLock::new(registry)),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Full prefix of this group
    pub fn prefix(&self) -> &str {
        &self.state.prefix
    }

    /// Create a sub-group whose prefix is this prefix followed by `suffix`
    pub fn group(&self, suffix: &str) -> RouteGroup {
        let state = GroupState::new(format!("{}{}", self.state.prefix, suffix));
        let mut registry = self.registry.write();
        if registry.sealed {
            tracing::warn!(prefix = %state.prefix, "group created after the engine was built");
        }
        registry.groups.push(state.clone());
        drop(registry);

        RouteGroup {
            state,
            registry: self.registry.clone(),
        }
    }

    /// Append a middleware to this group
    pub fn use_middleware(&self, middleware: impl IntoHandler) {
        self.use_middlewares([middleware.into_handler()]);
    }

    /// Append several middlewares, keeping their order
    pub fn use_middlewares(&self, middlewares: impl IntoIterator<Item = Handler>) {
        if self.registry.read().sealed {
            tracing::warn!(prefix = %self.state.prefix, "middleware added after the engine was built is ignored");
        }
        self.state.middlewares.write().extend(middlewares);
    }

    /// Register `handler` for `method` at this group's prefix followed by `pattern`
    pub fn handle(&self, method: Method, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        let pattern = format!("{}{}", self.state.prefix, pattern);
        let mut registry = self.registry.write();
        if registry.sealed {
            return Err(Error::Sealed {
                method: method.to_string(),
                pattern,
            });
        }
        registry.table.register(method, &pattern, handler.into_handler())?;
        tracing::debug!(%method, %pattern, "route registered");
        Ok(())
    }

    /// Add a GET route
    pub fn get(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Get, pattern, handler)
    }

    /// Add a POST route
    pub fn post(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Post, pattern, handler)
    }

    /// Add a PUT route
    pub fn put(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Put, pattern, handler)
    }

    /// Add a DELETE route
    pub fn delete(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Delete, pattern, handler)
    }

    /// Add a PATCH route
    pub fn patch(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Patch, pattern, handler)
    }

    /// Add a HEAD route
    pub fn head(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Head, pattern, handler)
    }

    /// Add an OPTIONS route
    pub fn options(&self, pattern: &str, handler: impl IntoHandler) -> Result<()> {
        self.handle(Method::Options, pattern, handler)
    }
}
