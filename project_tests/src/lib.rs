//! # Mock Indicator API
//!
//! An in-process stand-in for the remote indicator service, served by `axum`
//! on an ephemeral `127.0.0.1` port. Integration tests point a real
//! `FetchClient` / `IndicatorStore` at it.
//!
//! ## Routes (under `/api/v1`):
//! - `GET  /indicators/current`
//! - `GET  /indicators/historical/{id}?days={n}`
//! - `POST /indicators/refresh`
//!
//! Each route answers with a scripted [`Reply`]: queued replies are served
//! first, then the route's fallback. Every hit is counted and the last
//! request headers and `days` query are recorded for assertions.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// # Reply
///
/// One scripted HTTP answer.
#[derive(Debug, Clone)]
pub struct Reply {
    /// HTTP status code.
    pub status: StatusCode,
    /// Raw body, sent as `application/json`.
    pub body: String,
    /// Delay before answering.
    pub delay: Duration,
}

impl Reply {
    /// `200 OK` with a JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    /// Any status with a raw body.
    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    /// A success envelope around `data`.
    pub fn success(data: Value) -> Self {
        let count = data.as_array().map_or(0, Vec::len);
        Self::json(json!({
            "status": "success",
            "data": data,
            "count": count,
            "timestamp": "2025-06-28T00:03:52.000000"
        }))
    }

    /// An error envelope with HTTP 200.
    pub fn app_error(message: &str) -> Self {
        Self::json(json!({"status": "error", "message": message}))
    }

    /// The same reply, answered after `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn send(self) -> Response {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

/// A route's scripted replies.
#[derive(Debug)]
struct Script {
    queue: VecDeque<Reply>,
    fallback: Reply,
}

impl Script {
    fn new(fallback: Reply) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback,
        }
    }

    fn next(&mut self) -> Reply {
        self.queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug)]
struct MockState {
    current: Mutex<Script>,
    historical: Mutex<HashMap<String, Script>>,
    refresh: Mutex<Script>,
    current_hits: AtomicUsize,
    historical_hits: AtomicUsize,
    refresh_hits: AtomicUsize,
    last_headers: Mutex<Option<HeaderMap>>,
    last_days: Mutex<Option<String>>,
}

/// The canonical demo snapshot: one `dolar_blue` quote of 1047 ARS.
pub fn demo_snapshot() -> Value {
    json!([{"id": "dolar_blue", "value": 1047, "unit": "ars", "source": "demo"}])
}

/// `n` daily points for June/July 2025, deliberately out of order.
pub fn demo_series(n: u32) -> Value {
    let start = chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default();
    let mut points: Vec<Value> = (0..n)
        .map(|i| {
            let date = start + chrono::Days::new(u64::from(i));
            json!({"date": date.format("%Y-%m-%d").to_string(), "value": 1200.0 + f64::from(i), "source": "JP Morgan"})
        })
        .collect();
    points.reverse();
    if n > 1 {
        points.swap(0, (n / 2) as usize);
    }
    Value::Array(points)
}

/// # Mock API
///
/// A running mock server. Dropping it shuts the server down.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl MockApi {
    /// Starts a server answering the demo snapshot, a 45-point series for any
    /// id and a refresh acknowledgement.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(MockState {
            current: Mutex::new(Script::new(Reply::success(demo_snapshot()))),
            historical: Mutex::new(HashMap::new()),
            refresh: Mutex::new(Script::new(Reply::json(json!({
                "message": "Indicators refresh initiated",
                "timestamp": "2025-06-28T00:03:52.000000",
                "status": "success"
            })))),
            current_hits: AtomicUsize::new(0),
            historical_hits: AtomicUsize::new(0),
            refresh_hits: AtomicUsize::new(0),
            last_headers: Mutex::new(None),
            last_days: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/v1/indicators/current", get(current))
            .route("/api/v1/indicators/historical/{id}", get(historical))
            .route("/api/v1/indicators/refresh", post(refresh))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
        });

        Ok(Self {
            addr,
            state,
            shutdown,
            handle,
        })
    }

    /// The API root, e.g. `http://127.0.0.1:41234/api/v1`.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Queues a reply for the next `GET /indicators/current`.
    pub fn push_current(&self, reply: Reply) {
        lock(&self.state.current).queue.push_back(reply);
    }

    /// Replaces the fallback reply of `GET /indicators/current`.
    pub fn set_current(&self, reply: Reply) {
        lock(&self.state.current).fallback = reply;
    }

    /// Replaces the reply of `GET /indicators/historical/{id}`.
    pub fn set_historical(&self, id: &str, reply: Reply) {
        lock(&self.state.historical).insert(id.to_string(), Script::new(reply));
    }

    /// Replaces the reply of `POST /indicators/refresh`.
    pub fn set_refresh(&self, reply: Reply) {
        lock(&self.state.refresh).fallback = reply;
    }

    /// Hits on `GET /indicators/current`.
    pub fn current_hits(&self) -> usize {
        self.state.current_hits.load(Ordering::SeqCst)
    }

    /// Hits on `GET /indicators/historical/{id}`.
    pub fn historical_hits(&self) -> usize {
        self.state.historical_hits.load(Ordering::SeqCst)
    }

    /// Hits on `POST /indicators/refresh`.
    pub fn refresh_hits(&self) -> usize {
        self.state.refresh_hits.load(Ordering::SeqCst)
    }

    /// Headers of the last request to any route.
    pub fn last_headers(&self) -> Option<HeaderMap> {
        lock(&self.state.last_headers).clone()
    }

    /// The raw `days` query value of the last historical request.
    pub fn last_days(&self) -> Option<String> {
        lock(&self.state.last_days).clone()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

/// A base URL nothing listens on.
pub async fn unreachable_base_url() -> std::io::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/api/v1"))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

async fn current(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.current_hits.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_headers) = Some(headers);
    let reply = lock(&state.current).next();
    reply.send().await
}

async fn historical(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.historical_hits.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_headers) = Some(headers);
    *lock(&state.last_days) = query.get("days").cloned();

    let reply = lock(&state.historical)
        .get_mut(&id)
        .map(Script::next)
        .unwrap_or_else(|| {
            Reply::json(json!({
                "indicator": id,
                "data": demo_series(45),
                "period": format!("{} days", query.get("days").map_or("30", String::as_str)),
                "count": 45,
                "status": "success"
            }))
        });
    reply.send().await
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.refresh_hits.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_headers) = Some(headers);
    let reply = lock(&state.refresh).next();
    reply.send().await
}
