//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use urlfetch_gateway::gateway::HttpTransport;
use urlfetch_gateway::{GatewayConfig, HttpServer, Shutdown};

/// What a mock upstream does with the n-th connection it accepts.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Reply {
    /// Answer with this status and body.
    Respond(u16, &'static str),
    /// Read the request, then close without answering.
    Hangup,
}

/// Raw-TCP upstream that records every request it receives.
#[derive(Clone, Default)]
pub struct MockUpstream {
    pub addr: Option<SocketAddr>,
    calls: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockUpstream {
    pub fn addr(&self) -> SocketAddr {
        self.addr.unwrap()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw text of every request received so far.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

/// Start a mock upstream on an ephemeral port. Connection `n` is answered by
/// `script[n]`, the last entry repeating once the script runs out.
pub async fn start_mock_upstream(script: Vec<Reply>) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut upstream = MockUpstream::default();
    upstream.addr = Some(listener.local_addr().unwrap());

    let calls = upstream.calls.clone();
    let received = upstream.received.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    let reply = script.get(n).or(script.last()).copied().unwrap_or(Reply::Hangup);
                    let received = received.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        received.lock().unwrap().push(request);
                        if let Reply::Respond(status, body) = reply {
                            let response = format!(
                                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nX-Upstream: mock\r\nConnection: close\r\n\r\n{}",
                                status,
                                reason(status),
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    upstream
}

/// Read one request head plus a `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find_head_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let len = content_length(&head);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start the gateway on an ephemeral port with the production transport.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let transport = Arc::new(HttpTransport::new(config.limits.max_body_size).unwrap());
    let server = HttpServer::new(config, transport);
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Client that never follows redirects or uses a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
