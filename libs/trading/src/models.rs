use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{error::RequestError, transport::ApiResponse};

//
// Response envelope used by every backend route:
// {"success": bool, "message": str, "data": {...}}
//
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub message: Option<String>,

    pub data: Option<T>,
}

impl<T: DeserializeOwned> Envelope<T> {
    pub fn unwrap_data(response: &ApiResponse) -> Result<T, RequestError> {
        let envelope: Envelope<T> = response.json()?;
        envelope
            .data
            .ok_or_else(|| RequestError::Decode("response has no data".to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokensData {
    pub tokens: Tokens,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionData {
    pub user: User,
    pub tokens: Tokens,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserData {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StockData {
    pub stock: Stock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: String,

    #[serde(default)]
    pub sector: Option<String>,

    #[serde(default)]
    pub industry: Option<String>,

    #[serde(default)]
    pub market_cap: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Latest known price of one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteData {
    pub quote: QuotePayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuotePayload {
    pub stock: StockRef,
    pub price: f64,

    #[serde(default)]
    pub change: f64,

    #[serde(default)]
    pub change_percent: f64,

    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StockRef {
    pub symbol: String,
}

impl From<QuotePayload> for Quote {
    fn from(p: QuotePayload) -> Self {
        Self {
            symbol: p.stock.symbol,
            price: p.price,
            change: p.change,
            change_percent: p.change_percent,
            // backend timestamps are naive UTC
            timestamp: p.timestamp.and_utc(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryData {
    pub history: History,
}

#[derive(Debug, Clone, Deserialize)]
pub struct History {
    pub stock: Stock,
    pub prices: Vec<PricePoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricePoint {
    pub price: f64,

    #[serde(default)]
    pub open_price: Option<f64>,

    #[serde(default)]
    pub high_price: Option<f64>,

    #[serde(default)]
    pub low_price: Option<f64>,

    #[serde(default)]
    pub volume: Option<i64>,

    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortfolioData {
    pub portfolio: Portfolio,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Holding {
    pub stock_symbol: String,
    pub stock_name: String,
    pub quantity: i64,
    pub average_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_gain_loss: f64,
    pub unrealized_gain_loss_percent: f64,
    pub last_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percent: f64,
    pub holdings_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub symbol: String,
    pub quantity: u32,

    /// Limit price; the server uses the latest market price when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Order {
    pub fn market(symbol: &str, quantity: u32) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            quantity,
            price: None,
        }
    }

    pub fn limit(symbol: &str, quantity: u32, price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::market(symbol, quantity)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeReceipt {
    pub message: String,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub id: i64,

    #[serde(default)]
    pub stock_symbol: Option<String>,

    #[serde(default)]
    pub stock_name: Option<String>,

    pub transaction_type: Side,
    pub quantity: i64,
    pub price: f64,
    pub total_amount: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PerformanceData {
    pub performance: Performance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Performance {
    pub current_portfolio: Portfolio,
    pub period_days: u32,
    pub total_invested: f64,
    pub total_divested: f64,
    pub net_invested: f64,
    pub transactions_count: u32,
    pub performance_period: PerformancePeriod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformancePeriod {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
}
