//! Per-request context and the cooperative handler chain
//!
//! A [`Context`] is created for every request and dropped once the response
//! is produced. It keeps four concerns apart:
//!
//! - the immutable [`Request`] snapshot,
//! - the path parameters captured by route resolution,
//! - the mutable response state written by the helpers (`string`, `json`, ...),
//! - the chain state: the fixed handler list and a private cursor.
//!
//! ## Chain protocol
//!
//! Middleware and the final handler share one signature. [`Context::next`]
//! runs every handler after the current one; a middleware that calls it in the
//! middle of its body gets "before" and "after" sections around the rest of
//! the chain:
//!
//! ```
//! use sprig_core::{Context, Handler, Method, Request, StatusCode};
//! use std::sync::Arc;
//!
//! let timing: Handler = Arc::new(|ctx: &mut Context| {
//!     // before
//!     ctx.next();
//!     // after: the handler has already written the response
//!     assert_eq!(ctx.status_code(), StatusCode::OK);
//! });
//! let handler: Handler = Arc::new(|ctx: &mut Context| ctx.string(StatusCode::OK, "hello"));
//!
//! let mut ctx = Context::new(Request::new(Method::Get, "/"), vec![timing, handler]);
//! ctx.next();
//! assert!(ctx.is_finished());
//! ```

use crate::{Error, Method, Request, Response, Result, StatusCode};
use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Middleware or route handler
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Conversion into a shareable [`Handler`]
pub trait IntoHandler {
    fn into_handler(self) -> Handler;
}

impl<F> IntoHandler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn into_handler(self) -> Handler {
        Arc::new(self)
    }
}

/// Fixed handler list plus the cursor driving it
struct Chain {
    handlers: Vec<Handler>,
    /// Number of handlers started so far
    cursor: usize,
}

impl Chain {
    /// Claim the next handler, moving the cursor past it
    fn advance(&mut self) -> Option<Handler> {
        let handler = self.handlers.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(handler)
    }
}

/// Response state accumulated by the helpers
struct ResponseState {
    status: StatusCode,
    response: Response,
    body: BytesMut,
}

/// Request context
pub struct Context {
    request: Request,
    params: HashMap<String, String>,
    output: ResponseState,
    chain: Chain,
    failure: Option<Error>,
}

impl Context {
    /// Create a context that will run `handlers` in order
    ///
    /// The chain is fixed here; nothing can be inserted once it runs.
    pub fn new(request: Request, handlers: Vec<Handler>) -> Self {
        Self {
            request,
            params: HashMap::new(),
            output: ResponseState {
                status: StatusCode::OK,
                response: Response::ok(),
                body: BytesMut::new(),
            },
            chain: Chain { handlers, cursor: 0 },
            failure: None,
        }
    }

    /// Attach the parameters captured by route resolution
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Run the remaining handlers
    ///
    /// Each handler is started at most once. Calling this from the last
    /// handler, or after the chain finished, does nothing.
    pub fn next(&mut self) {
        while let Some(handler) = self.chain.advance() {
            handler(self);
        }
    }

    /// Whether every handler of the chain has been started
    pub fn is_finished(&self) -> bool {
        self.chain.cursor >= self.chain.handlers.len()
    }

    // ------------------------------------------------------------------
    // Request data
    // ------------------------------------------------------------------

    /// The request snapshot
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// HTTP method
    pub fn method(&self) -> Method {
        self.request.method
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Path parameter captured by the route pattern
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// All captured path parameters
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Query parameter, empty when absent
    pub fn query(&self, key: &str) -> String {
        self.request.query_value(key).unwrap_or_default()
    }

    /// Form field (body first, then query), empty when absent
    pub fn post_form(&self, key: &str) -> String {
        self.request.form_value(key).unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Response helpers
    // ------------------------------------------------------------------

    /// Set the response status
    pub fn status(&mut self, code: StatusCode) {
        self.output.status = code;
    }

    /// Current response status
    pub fn status_code(&self) -> StatusCode {
        self.output.status
    }

    /// Set a response header, replacing any value with the same name
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.output.response.set_header(key, value);
    }

    /// Response header written so far
    pub fn response_header(&self, key: &str) -> Option<&str> {
        self.output.response.header(key)
    }

    /// Append raw bytes to the response body
    pub fn write(&mut self, bytes: &[u8]) {
        self.output.body.extend_from_slice(bytes);
    }

    /// Status plus raw body, no content type
    pub fn data(&mut self, code: StatusCode, data: &[u8]) {
        self.status(code);
        self.write(data);
    }

    /// Plain text response
    pub fn string(&mut self, code: StatusCode, text: impl AsRef<str>) {
        self.set_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
        self.status(code);
        self.write(text.as_ref().as_bytes());
    }

    /// HTML response
    pub fn html(&mut self, code: StatusCode, html: impl AsRef<str>) {
        self.set_header(CONTENT_TYPE.as_str(), "text/html; charset=utf-8");
        self.status(code);
        self.write(html.as_ref().as_bytes());
    }

    /// JSON response
    ///
    /// A value that fails to serialize fails this request: the status becomes
    /// 500 and dispatch reports the encoding error instead of a response.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_header(CONTENT_TYPE.as_str(), "application/json");
                self.status(code);
                self.write(&body);
            }
            Err(err) => {
                tracing::error!(path = %self.request.path, error = %err, "json encoding failed");
                self.status(StatusCode::INTERNAL_SERVER_ERROR);
                self.failure = Some(Error::Encode(err));
            }
        }
    }

    /// Consume the context into the finished response
    pub fn into_response(self) -> Result<Response> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        let mut response = self.output.response;
        response.status = self.output.status;
        response.body = Bytes::from(self.output.body);
        Ok(response)
    }
}
