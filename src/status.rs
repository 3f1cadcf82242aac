/// Gate status HTTP endpoint
/// Exposes the latest gate evaluation and route decisions to the hosting site
/// and to monitoring systems

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gate::GateSnapshot;
use crate::policy::{GatingPolicy, NavigationDecision};
use crate::state::GateState;
use crate::ticker::SnapshotReceiver;

/// Timeout for reading HTTP request (prevents slow-loris attacks)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Point-in-time copy of the ticker counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    pub ticks: u64,
    pub transitions: u64,
    /// Unix epoch seconds of the last tick
    pub last_tick_time: u64,
    pub closed: bool,
}

/// Counters updated by the ticker
#[derive(Debug, Default)]
pub struct GateMetrics {
    ticks: AtomicU64,
    transitions: AtomicU64,
    last_tick_time: AtomicU64,
    closed: AtomicBool,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self, closed: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_time.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            Ordering::Relaxed,
        );
        self.closed.store(closed, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            ticks: self.ticks.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            last_tick_time: self.last_tick_time.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }
}

/// Everything a request handler can read
pub struct StatusContext {
    pub snapshots: SnapshotReceiver,
    pub policy: GatingPolicy,
    pub metrics: Arc<GateMetrics>,
}

impl StatusContext {
    fn latest(&self) -> Option<GateSnapshot> {
        self.snapshots.borrow().clone()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody<'a> {
    state: GateState,
    #[serde(flatten)]
    snapshot: &'a GateSnapshot,
}

#[derive(Serialize)]
struct HealthBody<'a> {
    status: &'static str,
    #[serde(flatten)]
    gate: &'a GateStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionBody<'a> {
    path: &'a str,
    closed: bool,
    decision: NavigationDecision,
    target: Option<&'a str>,
}

/// Run the status HTTP server
pub async fn run_status_server(
    port: u16,
    context: Arc<StatusContext>,
    cancel_token: CancellationToken,
) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind status server on port {}: {}", port, e);
            return;
        }
    };

    info!("Status server listening on http://0.0.0.0:{}/status", port);
    serve(listener, context, cancel_token).await;
}

/// Accept loop over an already-bound listener
pub async fn serve(
    listener: TcpListener,
    context: Arc<StatusContext>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((mut socket, peer_addr)) => {
                        let context = context.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_request(&mut socket, &context).await {
                                debug!("Error handling request from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Status server shutting down");
                break;
            }
        }
    }
}

async fn handle_request(
    socket: &mut tokio::net::TcpStream,
    context: &StatusContext,
) -> std::io::Result<()> {
    let mut buf = [0u8; 2048];

    let n = match timeout(REQUEST_TIMEOUT, socket.read(&mut buf)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("Request timeout after {:?}", REQUEST_TIMEOUT);
            return Ok(());
        }
    };

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]);

    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let response = respond(target, context);

    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;

    Ok(())
}

/// Build the full HTTP response for a request target (path plus query)
pub fn respond(target: &str, context: &StatusContext) -> String {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    match path {
        "/health" | "/healthz" | "/health/" => build_health_response(&context.metrics.status()),
        "/ready" | "/readyz" | "/ready/" => build_ready_response(context.latest().is_some()),
        "/status" | "/status/" => match context.latest() {
            Some(snapshot) => build_status_response(&snapshot),
            None => build_unresolved_response(),
        },
        "/gate" | "/gate/" => {
            let Some(route) = query.and_then(|q| query_param(q, "path")) else {
                return build_bad_request_response("missing 'path' query parameter");
            };
            match context.latest() {
                Some(snapshot) => build_decision_response(&context.policy, &route, snapshot.closed),
                None => build_unresolved_response(),
            }
        }
        "/metrics" => build_metrics_response(&context.metrics.status()),
        _ => build_not_found_response(),
    }
}

/// Percent-decoded value of `name` in a query string
fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(|decoded| decoded.into_owned())
        })
        .filter(|value| !value.is_empty())
}

fn build_json_response(status_code: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    )
}

fn build_health_response(status: &GateStatus) -> String {
    let body = HealthBody {
        status: "healthy",
        gate: status,
    };
    match serde_json::to_string(&body) {
        Ok(json) => build_json_response(200, "OK", &json),
        Err(e) => {
            error!("Failed to serialize health status: {}", e);
            build_json_response(500, "Internal Server Error", r#"{"error":"Internal Server Error"}"#)
        }
    }
}

fn build_ready_response(ready: bool) -> String {
    if ready {
        build_json_response(200, "OK", r#"{"ready":true}"#)
    } else {
        build_json_response(503, "Service Unavailable", r#"{"ready":false}"#)
    }
}

fn build_status_response(snapshot: &GateSnapshot) -> String {
    let body = StatusBody {
        state: GateState::from_closed(snapshot.closed),
        snapshot,
    };
    match serde_json::to_string(&body) {
        Ok(json) => build_json_response(200, "OK", &json),
        Err(e) => {
            error!("Failed to serialize gate status: {}", e);
            build_json_response(500, "Internal Server Error", r#"{"error":"Internal Server Error"}"#)
        }
    }
}

fn build_decision_response(policy: &GatingPolicy, path: &str, closed: bool) -> String {
    let decision = policy.decide(path, closed);
    let body = DecisionBody {
        path,
        closed,
        decision,
        target: policy.target(decision),
    };
    match serde_json::to_string(&body) {
        Ok(json) => build_json_response(200, "OK", &json),
        Err(e) => {
            error!("Failed to serialize gate decision: {}", e);
            build_json_response(500, "Internal Server Error", r#"{"error":"Internal Server Error"}"#)
        }
    }
}

fn build_unresolved_response() -> String {
    build_json_response(503, "Service Unavailable", r#"{"state":"unresolved"}"#)
}

fn build_bad_request_response(reason: &str) -> String {
    let body = serde_json::json!({ "error": reason });
    build_json_response(400, "Bad Request", &body.to_string())
}

fn build_metrics_response(status: &GateStatus) -> String {
    // Prometheus-compatible metrics format
    let body = format!(
        "# HELP closedgate_ticks_total Total number of gate evaluations\n\
         # TYPE closedgate_ticks_total counter\n\
         closedgate_ticks_total {}\n\
         # HELP closedgate_transitions_total Total number of open/closed state changes\n\
         # TYPE closedgate_transitions_total counter\n\
         closedgate_transitions_total {}\n\
         # HELP closedgate_last_tick_timestamp Unix timestamp of last evaluation\n\
         # TYPE closedgate_last_tick_timestamp gauge\n\
         closedgate_last_tick_timestamp {}\n\
         # HELP closedgate_closed Whether the gate is closed (1) or open (0)\n\
         # TYPE closedgate_closed gauge\n\
         closedgate_closed {}\n",
        status.ticks,
        status.transitions,
        status.last_tick_time,
        if status.closed { 1 } else { 0 }
    );

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn build_not_found_response() -> String {
    build_json_response(404, "Not Found", r#"{"error":"Not Found"}"#)
}
