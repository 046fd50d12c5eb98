//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use cors_proxy::config::ProxyConfig;
use cors_proxy::http::forward::client_builder;
use cors_proxy::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hostname the proxy's client resolves to the mock upstream.
pub const UPSTREAM_HOST: &str = "upstream.test";

/// A request as the mock upstream received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<CapturedRequest>,
}

impl MockUpstream {
    /// Absolute URL on the mock upstream, addressed by [`UPSTREAM_HOST`].
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{UPSTREAM_HOST}:{}{path_and_query}", self.addr.port())
    }

    pub async fn next_request(&mut self) -> CapturedRequest {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("upstream saw no request")
            .expect("upstream channel closed")
    }
}

/// Build a raw HTTP/1.1 response with `Content-Length` and `Connection: close`.
pub fn raw_response(status_line: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    out
}

/// Start a mock upstream that answers every request with `response` verbatim.
pub async fn start_mock_upstream(response: String) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let tx = tx.clone();
                    let response = response.clone();
                    tokio::spawn(async move {
                        serve_one(socket, tx, response).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream {
        addr,
        requests: rx,
    }
}

async fn serve_one(
    mut socket: TcpStream,
    tx: mpsc::UnboundedSender<CapturedRequest>,
    response: String,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    let _ = tx.send(CapturedRequest {
        method,
        path,
        headers,
        body,
    });

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start an upstream that accepts connections and never answers.
pub async fn start_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }
}

/// Start the proxy on an ephemeral port with [`UPSTREAM_HOST`] resolving to `upstream`.
pub async fn start_proxy(config: ProxyConfig, upstream: SocketAddr) -> TestProxy {
    let client = client_builder(&config.timeouts)
        .no_proxy()
        .resolve(UPSTREAM_HOST, upstream)
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::with_client(config, client);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

/// Client for talking to the proxy. Never follows redirects.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// `?url=` value for `target`, percent-encoded.
pub fn encode(target: &str) -> String {
    url::form_urlencoded::byte_serialize(target.as_bytes()).collect()
}
