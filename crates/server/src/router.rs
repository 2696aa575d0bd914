// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Method+path router and the accept loop around it.
//!
//! Routes match a literal path or a `:param` template compiled to a
//! regex. `OPTIONS` short-circuits to 204 when CORS is on. SSE handlers
//! return a frame stream that is piped until the source ends or the
//! client disconnects. Binding retries upward on `EADDRINUSE`.

use crate::auth::{authenticate, identity, AuthConfig, AuthResult};
use crate::http::{Request, Response, CORS_HEADERS};
use crate::rate_limit::RateLimiter;
use futures_util::future::BoxFuture;
use regex::Regex;
use reflexive_core::SystemClock;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// What a handler produces: a plain response or an SSE frame stream.
pub enum Outcome {
    Response(Response),
    /// Frames are fully rendered (`data: ...\n\n`) by the producer.
    Stream(mpsc::Receiver<String>),
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Response(response)
    }
}

impl From<mpsc::Receiver<String>> for Outcome {
    fn from(stream: mpsc::Receiver<String>) -> Self {
        Outcome::Stream(stream)
    }
}

type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Outcome> + Send + Sync>;

enum PathPattern {
    Literal(String),
    /// `:param` template compiled to an anchored regex with named groups.
    Params { regex: Regex, names: Vec<String> },
}

impl PathPattern {
    fn compile(path: &str) -> Self {
        if !path.contains(':') && !path.contains('*') {
            return PathPattern::Literal(path.to_string());
        }
        let mut names = Vec::new();
        let mut pattern = String::from("^");
        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }
            pattern.push('/');
            if let Some(name) = segment.strip_prefix(':') {
                names.push(name.to_string());
                pattern.push_str("([^/]+)");
            } else if segment == "*" {
                names.push("wildcard".to_string());
                pattern.push_str("(.*)");
            } else {
                pattern.push_str(&regex::escape(segment));
            }
        }
        pattern.push('$');
        // Template escape above guarantees a valid expression.
        let regex = Regex::new(&pattern).unwrap_or_else(|_| {
            Regex::new("^$").unwrap_or_else(|_| unreachable!("empty regex is valid"))
        });
        PathPattern::Params { regex, names }
    }

    fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        match self {
            PathPattern::Literal(literal) => (literal == path).then(Vec::new),
            PathPattern::Params { regex, names } => {
                let captures = regex.captures(path)?;
                Some(
                    names
                        .iter()
                        .enumerate()
                        .filter_map(|(i, name)| {
                            captures
                                .get(i + 1)
                                .map(|m| (name.clone(), crate::http::percent_decode(m.as_str())))
                        })
                        .collect(),
                )
            }
        }
    }
}

struct Route {
    /// `*` matches any method.
    method: String,
    pattern: PathPattern,
    handler: Handler,
}

/// The route table plus edge policy (CORS, auth, rate limiting).
pub struct Router {
    routes: Vec<Route>,
    cors: bool,
    auth: AuthConfig,
    rate: Option<RateLimiter<SystemClock>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new(), cors: true, auth: AuthConfig::default(), rate: None }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: u32, window_ms: u64) -> Self {
        self.rate = Some(RateLimiter::new(max_requests, window_ms, SystemClock));
        self
    }

    pub fn without_cors(mut self) -> Self {
        self.cors = false;
        self
    }

    /// Register a handler. `method` is uppercase or `*`; `path` may carry
    /// `:param` segments or a trailing `*`.
    pub fn add<F, Fut, O>(&mut self, method: &str, path: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = O> + Send + 'static,
        O: Into<Outcome>,
    {
        self.routes.push(Route {
            method: method.to_ascii_uppercase(),
            pattern: PathPattern::compile(path),
            handler: Arc::new(move |request| {
                let fut = handler(request);
                Box::pin(async move { fut.await.into() })
            }),
        });
    }

    /// Route a request. Unmatched paths are 404.
    pub async fn dispatch(&self, mut request: Request) -> Outcome {
        if request.method == "OPTIONS" && self.cors {
            return Outcome::Response(Response::no_content());
        }
        for route in &self.routes {
            if route.method != "*" && route.method != request.method {
                continue;
            }
            let Some(params) = route.pattern.matches(&request.path) else { continue };
            request.params = params.into_iter().collect();
            return (route.handler)(request).await;
        }
        Outcome::Response(Response::error(404, format!("no route for {}", request.path)))
    }

    /// Auth + rate limiting ahead of dispatch. Returns an early response
    /// when the edge rejects the request.
    fn gate(&self, request: &Request) -> Result<Option<Vec<(String, String)>>, Response> {
        if request.method == "OPTIONS" {
            return Ok(None);
        }
        let auth = authenticate(request, &self.auth);
        if auth == AuthResult::Denied {
            return Err(Response::error(401, "invalid or missing API key"));
        }

        let Some(rate) = &self.rate else { return Ok(None) };
        let decision = rate.check(&identity(request, &auth));
        let headers = vec![
            ("X-RateLimit-Limit".to_string(), decision.limit.to_string()),
            ("X-RateLimit-Remaining".to_string(), decision.remaining.to_string()),
            ("X-RateLimit-Reset".to_string(), decision.reset_ms.to_string()),
        ];
        if !decision.allowed {
            let mut response = Response::error(429, "rate limit exceeded")
                .with_header("Retry-After", decision.retry_after_secs.to_string());
            response.headers.extend(headers);
            return Err(response);
        }
        Ok(Some(headers))
    }

    /// Bind, retrying upward on `EADDRINUSE`. Returns the bound port and
    /// the accept-loop task.
    pub async fn serve(
        self: Arc<Self>,
        host: &str,
        start_port: u16,
    ) -> std::io::Result<(u16, tokio::task::JoinHandle<()>)> {
        let mut port = start_port;
        let listener = loop {
            match TcpListener::bind((host, port)).await {
                Ok(listener) => break listener,
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    tracing::warn!(port, "port in use, trying next");
                    port = port.checked_add(1).ok_or_else(|| {
                        std::io::Error::other("no port available above start")
                    })?;
                }
                Err(e) => return Err(e),
            }
        };
        let bound = listener.local_addr()?.port();
        tracing::info!(host, port = bound, "http server listening");

        let router = Arc::clone(&self);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else { break };
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    if let Err(e) = router.handle_connection(stream, peer).await {
                        tracing::debug!(error = %e, "connection error");
                    }
                });
            }
        });
        Ok((bound, task))
    }

    async fn handle_connection(
        &self,
        stream: tokio::net::TcpStream,
        peer: std::net::SocketAddr,
    ) -> std::io::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let Some(request) = Request::read_from(&mut reader, Some(peer)).await? else {
            return Ok(());
        };
        tracing::debug!(method = %request.method, path = %request.path, "request");

        let rate_headers = match self.gate(&request) {
            Ok(headers) => headers,
            Err(response) => return response.write_to(&mut write_half, self.cors).await,
        };

        match self.dispatch(request).await {
            Outcome::Response(mut response) => {
                if let Some(headers) = rate_headers {
                    response.headers.extend(headers);
                }
                response.write_to(&mut write_half, self.cors).await
            }
            Outcome::Stream(frames) => self.pipe_sse(&mut write_half, frames).await,
        }
    }

    /// Write SSE headers then pipe frames until the source ends or the
    /// client disconnects.
    async fn pipe_sse<W>(
        &self,
        writer: &mut W,
        mut frames: mpsc::Receiver<String>,
    ) -> std::io::Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        let mut head = String::from(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n",
        );
        if self.cors {
            head.push_str(CORS_HEADERS);
        }
        head.push_str("\r\n");
        writer.write_all(head.as_bytes()).await?;
        writer.flush().await?;

        while let Some(frame) = frames.recv().await {
            if writer.write_all(frame.as_bytes()).await.is_err() {
                // Client went away; dropping the receiver tells the
                // producer to abort.
                break;
            }
            writer.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
