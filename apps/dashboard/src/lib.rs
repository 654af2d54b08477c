use trading::TradingClient;

pub mod command;
pub mod config;

pub struct Data {
    pub client: TradingClient,
    pub config: config::Config,
}

pub type Error = anyhow::Error;
