//! Shared utilities for integration tests: raw-TCP mock inference servers
//! and fast configurations.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use backend_pilot::config::{
    BackendDefinition, PilotConfig, PlanConfig, ProbeConfig, ScanConfig, SelectionConfig,
};
use backend_pilot::probe::Scheme;

/// What the mock does with one request.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(u16),
    Delayed(u16, Duration),
    /// Accept, read the request, never answer.
    Hang,
}

/// A running mock server.
#[derive(Debug, Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockBackend {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Requests seen for `path`.
    pub fn hits(&self, path: &str) -> u32 {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

/// Requests in flight across a set of mocks, and the most ever seen at once.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock that answers 200 after `delay`, counting its requests in `in_flight`.
pub async fn start_counted_backend(in_flight: Arc<InFlight>, delay: Duration) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_counted(listener, move |_, _| Reply::Delayed(200, delay), Some(in_flight))
}

/// Mock answering every path the same way.
pub async fn start_mock_backend(reply: Reply) -> MockBackend {
    start_programmable_backend(move |_, _| reply).await
}

/// Mock whose reply depends on the path and the number of earlier hits on it.
pub async fn start_programmable_backend<F>(f: F) -> MockBackend
where
    F: Fn(&str, u32) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_counted(listener, f, None)
}

/// Mock bound to a specific port, for tests that reserve the port up front.
pub async fn start_mock_backend_on(port: u16, reply: Reply) -> MockBackend {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    serve_counted(listener, move |_, _| reply, None)
}

fn serve_counted<F>(listener: TcpListener, f: F, in_flight: Option<Arc<InFlight>>) -> MockBackend
where
    F: Fn(&str, u32) -> Reply + Send + Sync + 'static,
{
    let addr = listener.local_addr().unwrap();
    let hits: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
    let f = Arc::new(f);

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            let counter = counter.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                handle(socket, f, counter, in_flight).await;
            });
        }
    });

    MockBackend { addr, hits }
}

async fn handle<F>(
    mut socket: TcpStream,
    f: Arc<F>,
    hits: Arc<Mutex<HashMap<String, u32>>>,
    in_flight: Option<Arc<InFlight>>,
) where
    F: Fn(&str, u32) -> Reply + Send + Sync + 'static,
{
    let Some(path) = read_request_path(&mut socket).await else {
        return;
    };
    let _counted = in_flight.as_ref().map(|gauge| gauge.enter());
    let seen = {
        let mut hits = hits.lock().unwrap();
        let entry = hits.entry(path.clone()).or_insert(0);
        *entry += 1;
        *entry - 1
    };

    let status = match f(&path, seen) {
        Reply::Status(status) => status,
        Reply::Delayed(status, delay) => {
            tokio::time::sleep(delay).await;
            status
        }
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return;
        }
    };

    let body = "{}";
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request_path(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(String::from)
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

/// A port with nothing listening on it (at the time of the call).
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Serve `reply` on `port` once `marker` exists, like a server started by a
/// detached start command.
pub fn serve_when_marker_exists(marker: PathBuf, port: u16, reply: Reply) {
    tokio::spawn(async move {
        while !marker.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        start_mock_backend_on(port, reply).await;
    });
}

pub fn local_backend(name: &str, port: u16) -> BackendDefinition {
    BackendDefinition {
        name: name.into(),
        scheme: Scheme::Http,
        host: "127.0.0.1".into(),
        port,
        start_cmd: "true".into(),
        stop_cmd: None,
        verify_cmd: "true".into(),
        ssh: None,
        startup_timeout_secs: None,
    }
}

/// Configuration with timeouts short enough for tests.
pub fn fast_config(backends: Vec<BackendDefinition>) -> PilotConfig {
    PilotConfig {
        backends,
        probe: ProbeConfig {
            timeout_ms: 600,
            ..ProbeConfig::default()
        },
        scan: ScanConfig {
            concurrency: 8,
            timeout_secs: 5,
        },
        plan: PlanConfig {
            command_timeout_secs: 10,
            verify_timeout_secs: 10,
            start_wait_secs: 10,
            wait_poll_ms: 50,
            plan_timeout_secs: 30,
            excerpt_chars: 200,
        },
        selection: SelectionConfig {
            loading_retries: 3,
            loading_base_delay_ms: 50,
            loading_max_delay_ms: 200,
        },
        ..PilotConfig::default()
    }
}
