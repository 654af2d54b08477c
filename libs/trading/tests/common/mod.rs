//! Scripted in-process backend for integration tests.
//!
//! `FakeBackend` implements `Transport` and behaves like the trading API: it
//! issues a token pair, rejects stale access tokens with 401, rotates the pair
//! on `/auth/refresh`, and serves scripted quotes per symbol.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode, header::AUTHORIZATION};
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use trading::{
    ApiRequest, ApiResponse, CredentialStore, Credentials, MemoryCredentialStore, TradingClient,
    Transport, TransportError,
};

pub const BASE_URL: &str = "http://backend.test/api";
pub const EMAIL: &str = "trader@example.com";
pub const PASSWORD: &str = "Secret123";

#[derive(Debug, Clone)]
pub enum QuoteReply {
    Price(f64),
    Status(u16),
    Reset,
}

#[derive(Default)]
struct State {
    access: String,
    refresh: String,
    rotations: u32,
    refresh_rejected: bool,
    reject_everything: bool,
    network_down: bool,
    refresh_network_down: bool,
    quotes: HashMap<String, VecDeque<QuoteReply>>,
    slow_quote: Option<Duration>,
    log: Vec<ApiRequest>,
    refresh_calls: usize,
    unauthorized: usize,
}

pub struct FakeBackend {
    state: Mutex<State>,
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    quote_gate: Mutex<Option<Arc<Semaphore>>>,
    path_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                access: "access-0".to_string(),
                refresh: "refresh-0".to_string(),
                ..State::default()
            }),
            refresh_gate: Mutex::new(None),
            quote_gate: Mutex::new(None),
            path_gates: Mutex::new(HashMap::new()),
        })
    }

    /// Pair the backend currently accepts.
    pub fn issued(&self) -> Credentials {
        let state = self.state.lock();
        Credentials::new(state.access.clone(), state.refresh.clone())
    }

    /// Pair whose access token has expired but whose refresh token is still good.
    pub fn expired(&self) -> Credentials {
        Credentials::new("access-expired", self.issued().refresh_token)
    }

    pub fn reject_refresh(&self) {
        self.state.lock().refresh_rejected = true;
    }

    pub fn reject_everything(&self) {
        self.state.lock().reject_everything = true;
    }

    pub fn set_network_down(&self, down: bool) {
        self.state.lock().network_down = down;
    }

    pub fn set_refresh_network_down(&self, down: bool) {
        self.state.lock().refresh_network_down = down;
    }

    /// Holds `/auth/refresh` responses until permits are added.
    pub fn gate_refresh(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.refresh_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Holds quote responses until permits are added.
    pub fn gate_quotes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.quote_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Holds requests to `path` (relative to the API base) until permits are
    /// added. The request is logged before it waits.
    pub fn gate_path(&self, path: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.path_gates
            .lock()
            .insert(path.to_string(), Arc::clone(&gate));
        gate
    }

    /// The next quote request picks its reply on arrival but answers only
    /// after `delay`.
    pub fn slow_next_quote(&self, delay: Duration) {
        self.state.lock().slow_quote = Some(delay);
    }

    /// Queue replies for a symbol. The last reply repeats once the queue drains.
    pub fn script_quotes(&self, symbol: &str, replies: impl IntoIterator<Item = QuoteReply>) {
        self.state
            .lock()
            .quotes
            .entry(symbol.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().refresh_calls
    }

    pub fn unauthorized(&self) -> usize {
        self.state.lock().unauthorized
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        let url = format!("{BASE_URL}{path}");
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    fn reply(status: StatusCode, body: Value) -> ApiResponse {
        ApiResponse::new(status, body.to_string())
    }

    fn session(state: &State) -> Value {
        json!({
            "user": {
                "id": 1, "email": EMAIL, "first_name": "Ada", "last_name": "Lovelace",
                "created_at": "2024-01-01T09:00:00"
            },
            "tokens": {
                "access_token": state.access, "refresh_token": state.refresh,
                "token_type": "Bearer", "expires_in": 900.0
            }
        })
    }

    fn handle_refresh(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.state.lock();
        state.refresh_calls += 1;

        let presented = request
            .body
            .as_ref()
            .and_then(|b| b.get("refresh_token"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if state.refresh_rejected || presented != state.refresh {
            return Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"success": false, "message": "Invalid or expired refresh token"}),
            );
        }

        state.rotations += 1;
        state.access = format!("access-{}", state.rotations);
        state.refresh = format!("refresh-{}", state.rotations);

        let tokens = Self::session(&state)["tokens"].clone();
        Self::reply(
            StatusCode::OK,
            json!({"success": true, "message": "Token refreshed successfully", "data": {"tokens": tokens}}),
        )
    }

    fn authorized(&self, request: &ApiRequest) -> bool {
        let mut state = self.state.lock();
        let expected = format!("Bearer {}", state.access);
        let ok = !state.reject_everything
            && request
                .headers
                .get(AUTHORIZATION)
                .is_some_and(|v| v.as_bytes() == expected.as_bytes());
        if !ok {
            state.unauthorized += 1;
        }
        ok
    }

    fn next_quote(&self, symbol: &str) -> QuoteReply {
        let mut state = self.state.lock();
        match state.quotes.get_mut(symbol) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(QuoteReply::Status(500)),
            Some(queue) => queue.front().cloned().unwrap_or(QuoteReply::Status(500)),
            None => QuoteReply::Status(404),
        }
    }

    fn quote_body(symbol: &str, price: f64) -> Value {
        json!({
            "success": true,
            "message": "Success",
            "data": {"quote": {
                "stock": {"id": 1, "symbol": symbol, "name": format!("{symbol} Corp")},
                "price": price, "open": price, "high": price, "low": price, "volume": 1000,
                "change": 1.5, "change_percent": 0.75,
                "timestamp": "2024-03-01T14:30:00"
            }}
        })
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(request.url.as_str())
            .to_string();

        let network_down = {
            let mut state = self.state.lock();
            state.log.push(request.clone());
            state.network_down
        };
        if network_down {
            return Err(TransportError("connection reset by peer".to_string()));
        }

        let path_gate = self.path_gates.lock().get(&path).cloned();
        if let Some(gate) = path_gate {
            let _permit = gate.acquire().await.map_err(|e| TransportError(e.to_string()))?;
        }

        if path == "/auth/refresh" {
            let gate = self.refresh_gate.lock().clone();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.map_err(|e| TransportError(e.to_string()))?;
            }
            if self.state.lock().refresh_network_down {
                return Err(TransportError("refresh timed out".to_string()));
            }
            return Ok(self.handle_refresh(&request));
        }

        if path == "/auth/login" && request.method == Method::POST {
            let body = request.body.clone().unwrap_or_default();
            let state = self.state.lock();
            if body["email"] == EMAIL && body["password"] == PASSWORD {
                return Ok(Self::reply(
                    StatusCode::OK,
                    json!({"success": true, "message": "Login successful", "data": Self::session(&state)}),
                ));
            }
            return Ok(Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"success": false, "message": "Invalid email or password"}),
            ));
        }

        if !self.authorized(&request) {
            return Ok(Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"error": "Token is invalid or expired"}),
            ));
        }

        if let Some(symbol) = path
            .strip_prefix("/stocks/")
            .and_then(|rest| rest.strip_suffix("/quote"))
        {
            let gate = self.quote_gate.lock().clone();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.map_err(|e| TransportError(e.to_string()))?;
            }
            let reply = self.next_quote(symbol);
            let delay = self.state.lock().slow_quote.take();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            return match reply {
                QuoteReply::Price(price) => Ok(Self::reply(StatusCode::OK, Self::quote_body(symbol, price))),
                QuoteReply::Status(code) => Ok(Self::reply(
                    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    json!({"success": false, "message": "Stock not found or no price data available"}),
                )),
                QuoteReply::Reset => Err(TransportError("connection reset by peer".to_string())),
            };
        }

        let state = self.state.lock();
        let response = match (&request.method, path.as_str()) {
            (&Method::GET, "/auth/profile") => Self::reply(
                StatusCode::OK,
                json!({"success": true, "message": "Success", "data": {"user": Self::session(&state)["user"]}}),
            ),
            (&Method::GET, "/portfolio") => Self::reply(
                StatusCode::OK,
                json!({"success": true, "message": "Success", "data": {"portfolio": {
                    "holdings": [],
                    "summary": {
                        "total_value": 0.0, "total_cost": 0.0, "total_gain_loss": 0.0,
                        "total_gain_loss_percent": 0.0, "holdings_count": 0
                    }
                }}}),
            ),
            (&Method::POST, "/portfolio/sell") => Self::reply(
                StatusCode::BAD_REQUEST,
                json!({"success": false, "message": "Insufficient shares to sell"}),
            ),
            (&Method::POST, "/portfolio/buy") => Self::reply(
                StatusCode::OK,
                json!({"success": true, "message": "Successfully bought 2 shares of AAPL", "data": {
                    "success": true,
                    "message": "Successfully bought 2 shares of AAPL",
                    "transaction": {
                        "id": 42, "user_id": 1, "stock_id": 1, "stock_symbol": "AAPL",
                        "stock_name": "Apple Inc.", "transaction_type": "buy", "quantity": 2,
                        "price": 150.0, "total_amount": 300.0, "timestamp": "2024-03-01T15:00:00"
                    }
                }}),
            ),
            _ => Self::reply(
                StatusCode::NOT_FOUND,
                json!({"success": false, "message": "Not found"}),
            ),
        };
        Ok(response)
    }
}

pub fn client_with(backend: &Arc<FakeBackend>, store: &Arc<MemoryCredentialStore>) -> TradingClient {
    let transport: Arc<dyn Transport> = backend.clone();
    let store: Arc<dyn CredentialStore> = store.clone();
    TradingClient::with_transport(BASE_URL, transport, store)
}

pub fn bearer_of(request: &ApiRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
