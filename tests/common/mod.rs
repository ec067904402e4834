//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use ipfs_metrics_proxy::config::ProxyConfig;
use ipfs_metrics_proxy::http::{Forwarder, HttpServer, ModifyResponse, Upstream};
use ipfs_metrics_proxy::lifecycle::Shutdown;
use ipfs_metrics_proxy::observability::ProxyMetrics;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[path = "../../src/observability/snapshot.rs"]
mod snapshot;

pub use snapshot::MetricsSnapshot;

/// A request as seen by the mock upstream.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct MockRequest {
    pub method: String,
    pub target: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// What the mock upstream answers.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    #[allow(dead_code)]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Start a programmable mock upstream on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let response = f(request).await;
                        let _ = socket.write_all(encode_response(&response).as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock upstream that echoes the request line back as the body.
#[allow(dead_code)]
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|req| async move {
        MockResponse::new(200, format!("{} {}", req.method, req.target)).header("x-upstream", "mock")
    })
    .await
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub fn unused_addr() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

/// A running proxy in front of `upstream`.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub metrics: Arc<ProxyMetrics>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub async fn start(upstream: SocketAddr) -> Self {
        Self::launch(upstream, None).await
    }

    /// Start a proxy whose forwarder runs `hook` instead of the metrics hook.
    #[allow(dead_code)]
    pub async fn start_with_hook(upstream: SocketAddr, hook: Arc<dyn ModifyResponse>) -> Self {
        Self::launch(upstream, Some(hook)).await
    }

    async fn launch(upstream: SocketAddr, hook: Option<Arc<dyn ModifyResponse>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = ProxyConfig::for_upstream(format!("http://{upstream}"));
        config.listener.bind_address = addr.to_string();

        let metrics = Arc::new(ProxyMetrics::new());
        let upstream = Upstream::parse(&format!("http://{upstream}")).unwrap();
        let mut forwarder = Forwarder::new(upstream, metrics.clone()).unwrap();
        if let Some(hook) = hook {
            forwarder = forwarder.with_hook(hook);
        }
        let server = HttpServer::new(config, forwarder);

        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        // The listener is already bound, so connections queue until `run` accepts.
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        Self {
            addr,
            metrics,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Current counter values, read through the exposition text.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::parse(&self.metrics.render())
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (head_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[head_end..body_end]).into_owned();

    Some(MockRequest {
        method,
        target,
        headers,
        body,
    })
}

fn encode_response(response: &MockResponse) -> String {
    let status_text = match response.status {
        200 => "200 OK",
        201 => "201 Created",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        other => return encode_with_status(&format!("{other} Unknown"), response),
    };
    encode_with_status(status_text, response)
}

fn encode_with_status(status_line: &str, response: &MockResponse) -> String {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.body.len(),
        response.body
    ));
    out
}
