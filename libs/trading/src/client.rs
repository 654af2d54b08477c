use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    config::ClientConfig,
    credentials::{CredentialStore, Credentials},
    error::RequestError,
    models::*,
    pipeline::{RequestOptions, RequestPipeline},
    transport::{HttpTransport, Transport},
};

/// Typed access to every backend route, all routed through one
/// [`RequestPipeline`].
#[derive(Clone)]
pub struct TradingClient {
    pipeline: RequestPipeline,
}

impl TradingClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(&config.base_url, Arc::new(transport), store))
    }

    pub fn with_transport(
        base_url: &str,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            pipeline: RequestPipeline::new(base_url, transport, store),
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn is_authenticated(&self) -> bool {
        self.pipeline.store().get().is_some()
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    fn start_session(&self, tokens: Tokens) {
        self.pipeline
            .store()
            .set(Credentials::new(tokens.access_token, tokens.refresh_token));
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, RequestError> {
        let res = self
            .pipeline
            .send(
                "/auth/login",
                RequestOptions::post(json!({ "email": email, "password": password })).anonymous(),
            )
            .await?;

        let session: SessionData = Envelope::unwrap_data(&res)?;
        self.start_session(session.tokens);
        info!(user_id = session.user.id, "logged in");
        Ok(session.user)
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, RequestError> {
        let body = serde_json::to_value(registration)
            .map_err(|e| RequestError::Decode(e.to_string()))?;
        let res = self
            .pipeline
            .send("/auth/register", RequestOptions::post(body).anonymous())
            .await?;

        let session: SessionData = Envelope::unwrap_data(&res)?;
        self.start_session(session.tokens);
        info!(user_id = session.user.id, "registered");
        Ok(session.user)
    }

    pub fn logout(&self) {
        self.pipeline.store().clear();
        info!("logged out");
    }

    /// Renews the session on demand, sharing any refresh already running.
    pub async fn refresh_session(&self) -> Result<(), RequestError> {
        self.pipeline
            .refresher()
            .refresh()
            .await
            .map_err(RequestError::from)
    }

    pub async fn profile(&self) -> Result<User, RequestError> {
        let res = self
            .pipeline
            .send("/auth/profile", RequestOptions::get())
            .await?;
        let data: UserData = Envelope::unwrap_data(&res)?;
        Ok(data.user)
    }

    pub async fn update_profile(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, RequestError> {
        let mut body = serde_json::Map::new();
        if let Some(first) = first_name {
            body.insert("first_name".into(), first.into());
        }
        if let Some(last) = last_name {
            body.insert("last_name".into(), last.into());
        }

        let res = self
            .pipeline
            .send("/auth/profile", RequestOptions::put(body.into()))
            .await?;
        let data: UserData = Envelope::unwrap_data(&res)?;
        Ok(data.user)
    }

    pub async fn stocks(
        &self,
        search: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Stock>, RequestError> {
        let mut options = RequestOptions::get()
            .query("page", page)
            .query("per_page", per_page);
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            options = options.query("search", term.trim());
        }

        let res = self.pipeline.send("/stocks", options).await?;
        Envelope::unwrap_data(&res)
    }

    pub async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Stock>, RequestError> {
        let options = RequestOptions::get()
            .query("q", query.trim())
            .query("page", page)
            .query("per_page", per_page);

        let res = self.pipeline.send("/stocks/search", options).await?;
        Envelope::unwrap_data(&res)
    }

    pub async fn stock(&self, symbol: &str) -> Result<Stock, RequestError> {
        let endpoint = format!("/stocks/{}", Self::normalize(symbol));
        let res = self.pipeline.send(&endpoint, RequestOptions::get()).await?;
        let data: StockData = Envelope::unwrap_data(&res)?;
        Ok(data.stock)
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote, RequestError> {
        let endpoint = format!("/stocks/{}/quote", Self::normalize(symbol));
        let res = self.pipeline.send(&endpoint, RequestOptions::get()).await?;
        let data: QuoteData = Envelope::unwrap_data(&res)?;
        Ok(data.quote.into())
    }

    /// Price series for the last `days` days (the server caps this at 365).
    pub async fn history(&self, symbol: &str, days: u32) -> Result<History, RequestError> {
        let endpoint = format!("/stocks/{}/history", Self::normalize(symbol));
        let res = self
            .pipeline
            .send(&endpoint, RequestOptions::get().query("days", days))
            .await?;
        let data: HistoryData = Envelope::unwrap_data(&res)?;
        Ok(data.history)
    }

    pub async fn portfolio(&self) -> Result<Portfolio, RequestError> {
        let res = self
            .pipeline
            .send("/portfolio", RequestOptions::get())
            .await?;
        let data: PortfolioData = Envelope::unwrap_data(&res)?;
        Ok(data.portfolio)
    }

    pub async fn buy(&self, order: &Order) -> Result<TradeReceipt, RequestError> {
        self.trade(Side::Buy, order).await
    }

    pub async fn sell(&self, order: &Order) -> Result<TradeReceipt, RequestError> {
        self.trade(Side::Sell, order).await
    }

    #[instrument(skip(self, order), fields(symbol = %order.symbol, quantity = order.quantity))]
    async fn trade(&self, side: Side, order: &Order) -> Result<TradeReceipt, RequestError> {
        let endpoint = match side {
            Side::Buy => "/portfolio/buy",
            Side::Sell => "/portfolio/sell",
        };
        let body =
            serde_json::to_value(order).map_err(|e| RequestError::Decode(e.to_string()))?;

        let res = self
            .pipeline
            .send(endpoint, RequestOptions::post(body))
            .await?;
        let receipt: TradeReceipt = Envelope::unwrap_data(&res)?;
        info!(transaction_id = receipt.transaction.id, "trade executed");
        Ok(receipt)
    }

    pub async fn transactions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Transaction>, RequestError> {
        let options = RequestOptions::get()
            .query("page", page)
            .query("per_page", per_page);
        let res = self
            .pipeline
            .send("/portfolio/transactions", options)
            .await?;
        Envelope::unwrap_data(&res)
    }

    pub async fn performance(&self, days: u32) -> Result<Performance, RequestError> {
        let res = self
            .pipeline
            .send(
                "/portfolio/performance",
                RequestOptions::get().query("days", days),
            )
            .await?;
        let data: PerformanceData = Envelope::unwrap_data(&res)?;
        Ok(data.performance)
    }
}
