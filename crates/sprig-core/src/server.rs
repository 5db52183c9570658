//! Native HTTP server implementation
//!
//! Feeds a [`Dispatcher`] from a hyper HTTP/1 server:
//! - One tokio task per connection
//! - Handler chains run on the blocking pool, so handlers may block freely
//! - SO_REUSEADDR / SO_REUSEPORT and TCP_NODELAY on the listening socket
//! - On shutdown, open connections finish their current request before the
//!   server returns

use crate::{Dispatcher, Method, Request, Response, Result, ServerConfig, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // SO_REUSEPORT - enable kernel load balancing across processes
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    // TCP_NODELAY - disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Bind a tokio listener on an optimized socket
///
/// Must be called from within a tokio runtime.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let socket = create_optimized_socket(&addr)?;
    socket.set_nonblocking(true)?;
    let listener = TcpListener::from_std(socket.into())?;
    Ok(listener)
}

/// Serve until the process stops
pub async fn serve(dispatcher: Arc<Dispatcher>, config: &ServerConfig) -> Result<()> {
    let addr = config.addr()?;
    let listener = bind(addr)?;
    tracing::info!(%addr, workers = config.workers, "listening");
    serve_with_shutdown(dispatcher, listener, std::future::pending()).await
}

/// Accept connections on `listener` until `shutdown` resolves
///
/// Once `shutdown` resolves the listener is closed, every open connection is
/// told to stop after its in-flight request, and the call returns when the
/// last one has closed.
pub async fn serve_with_shutdown<F>(
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let tracker = Arc::new(ConnectionTracker::new());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };

                let dispatcher = dispatcher.clone();
                let conn_tracker = tracker.clone();
                let stop = conn_tracker.subscribe();
                conn_tracker.increment();

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let dispatcher = dispatcher.clone();
                        async move { handle_request(dispatcher, req).await }
                    });

                    let conn = http1::Builder::new().serve_connection(io, service);
                    tokio::pin!(conn);
                    let result = tokio::select! {
                        res = conn.as_mut() => res,
                        _ = shutdown_started(stop) => {
                            conn.as_mut().graceful_shutdown();
                            conn.as_mut().await
                        }
                    };

                    if let Err(e) = result {
                        if !e.is_incomplete_message() {
                            tracing::warn!(%remote, error = %e, "connection error");
                        }
                    }

                    conn_tracker.decrement();
                });
            }
            _ = &mut shutdown => break,
        }
    }

    drop(listener);
    tracker.start_shutdown();
    tracing::info!(active = tracker.count(), "shutting down");
    tracker.wait_idle().await;
    tracing::info!("all connections closed");
    Ok(())
}

/// Dispatch one hyper request
async fn handle_request(
    dispatcher: Arc<Dispatcher>,
    req: hyper::Request<Incoming>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let Ok(method) = parts.method.as_str().parse::<Method>() else {
        let res = crate::ResponseBuilder::new(StatusCode::NOT_IMPLEMENTED)
            .header("content-type", "text/plain; charset=utf-8")
            .body("Not Implemented")
            .build();
        return Ok(to_hyper_response(res));
    };

    // An unreadable body is treated as empty
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            Bytes::new()
        }
    };

    let request = from_parts(method, &parts, body);
    let path = request.path.clone();

    let response = match tokio::task::spawn_blocking(move || dispatcher.handle(request)).await {
        Ok(Ok(res)) => res,
        Ok(Err(e)) => {
            tracing::error!(%path, error = %e, "request failed");
            Response::internal_error("Internal Server Error")
        }
        Err(e) => {
            tracing::error!(%path, error = %e, "handler panicked");
            Response::internal_error("Internal Server Error")
        }
    };

    Ok(to_hyper_response(response))
}

/// Build our Request from hyper request parts
///
/// The path is percent-decoded; a path that does not decode to UTF-8 is kept
/// as sent.
pub fn from_parts(method: Method, parts: &http::request::Parts, body: Bytes) -> Request {
    let raw = parts.uri.path();
    let path = urlencoding::decode(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    let mut request = Request::new(method, path);
    request.query = parts.uri.query().map(|s| s.to_string());
    request.body = body;

    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.to_string(), v.to_string()));
        }
    }

    request
}

/// Convert our Response to hyper Response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(res.status.as_u16());

    for (name, value) in &res.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(Full::new(res.body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "invalid response head");
        let mut fallback = hyper::Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Resolves once the tracker's shutdown has started
async fn shutdown_started(mut stop: watch::Receiver<bool>) {
    // An error means the tracker is gone, which only happens after the
    // accept loop has returned.
    let _ = stop.wait_for(|&stopping| stopping).await;
}

/// Counts open connections and broadcasts the shutdown signal to them
#[derive(Debug)]
pub struct ConnectionTracker {
    active: AtomicU64,
    stop: watch::Sender<bool>,
    idle: Notify,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            active: AtomicU64::new(0),
            stop,
            idle: Notify::new(),
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Wakes [`wait_idle`](Self::wait_idle) when the last connection closes
    #[inline]
    pub fn decrement(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` when shutdown starts
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Ask every subscribed connection to close after its current request
    pub fn start_shutdown(&self) {
        self.stop.send_replace(true);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        *self.stop.borrow()
    }

    /// Wait until no connection is open
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost
            let idle = self.idle.notified();
            if self.count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, Engine};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let engine = Engine::new();
        engine
            .get("/hello/:name", |ctx: &mut Context| {
                let body = format!("hello {}", ctx.param("name").unwrap_or(""));
                ctx.string(StatusCode::OK, body);
            })
            .unwrap();
        engine
            .post("/echo", |ctx: &mut Context| {
                let body = ctx.post_form("msg");
                ctx.string(StatusCode::OK, body);
            })
            .unwrap();
        Arc::new(engine.build())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_serves_routes_over_tcp() {
        let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_with_shutdown(dispatcher(), listener, async {
            let _ = rx.await;
        }));

        let text = roundtrip(
            addr,
            "GET /hello/sprig HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
        assert!(text.ends_with("hello sprig"), "{text}");

        let text = roundtrip(
            addr,
            "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"), "{text}");
        assert!(text.contains("404 NOT FOUND: /missing"), "{text}");

        let text = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
             Content-Type: application/x-www-form-urlencoded\r\nContent-Length: 9\r\n\r\nmsg=hi+yo",
        )
        .await;
        assert!(text.ends_with("hi yo"), "{text}");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn test_to_hyper_response() {
        let res = crate::ResponseBuilder::new(StatusCode::CREATED)
            .header("x-custom", "value")
            .body("made")
            .build();

        let hyper_res = to_hyper_response(res);
        assert_eq!(hyper_res.status(), StatusCode::CREATED);
        assert_eq!(hyper_res.headers()["x-custom"], "value");
    }

    #[test]
    fn test_from_parts() {
        let (parts, _) = http::Request::builder()
            .method("GET")
            .uri("/search?q=rust&page=2")
            .header("accept", "text/html")
            .body(())
            .unwrap()
            .into_parts();

        let req = from_parts(Method::Get, &parts, Bytes::new());
        assert_eq!(req.path, "/search");
        assert_eq!(req.query.as_deref(), Some("q=rust&page=2"));
        assert_eq!(req.header("Accept"), Some("text/html"));
        assert_eq!(req.query_value("page").as_deref(), Some("2"));
    }

    #[test]
    fn test_from_parts_decodes_path() {
        let (parts, _) = http::Request::builder()
            .uri("/hello/j%C3%B6rg%20x?name=a%20b")
            .body(())
            .unwrap()
            .into_parts();

        let req = from_parts(Method::Get, &parts, Bytes::new());
        assert_eq!(req.path, "/hello/jörg x");
        assert_eq!(req.query.as_deref(), Some("name=a%20b"));

        let res = dispatcher().handle(req).unwrap();
        assert_eq!(res.body_string().as_deref(), Some("hello jörg x"));
    }

    #[test]
    fn test_from_parts_keeps_undecodable_path() {
        let (parts, _) = http::Request::builder()
            .uri("/files/%FF%FE")
            .body(())
            .unwrap()
            .into_parts();

        let req = from_parts(Method::Get, &parts, Bytes::new());
        assert_eq!(req.path, "/files/%FF%FE");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_waits_for_in_flight_request() {
        let started = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));

        let engine = Engine::new();
        let (started_tx, finished_tx) = (started.clone(), finished.clone());
        engine
            .get("/slow", move |ctx: &mut Context| {
                started_tx.notify_one();
                std::thread::sleep(Duration::from_millis(200));
                finished_tx.store(true, Ordering::SeqCst);
                ctx.string(StatusCode::OK, "done");
            })
            .unwrap();

        let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_with_shutdown(Arc::new(engine.build()), listener, async {
            let _ = rx.await;
        }));

        // keep-alive request, left open while the server shuts down
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        started.notified().await;

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(finished.load(Ordering::SeqCst));

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
        assert!(text.ends_with("done"), "{text}");
    }

    #[tokio::test]
    async fn test_connection_tracker() {
        let tracker = ConnectionTracker::new();
        let stop = tracker.subscribe();
        tracker.increment();
        tracker.increment();
        tracker.decrement();
        assert_eq!(tracker.count(), 1);
        assert!(!tracker.is_shutting_down());

        tracker.start_shutdown();
        assert!(tracker.is_shutting_down());
        assert!(*stop.borrow());

        tracker.decrement();
        tracker.wait_idle().await;
        assert_eq!(tracker.count(), 0);
    }
}
