use std::{env::var, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use trading::ClientConfig;

#[derive(Clone)]
pub struct Config {
    pub client: ClientConfig,
    pub credentials_path: PathBuf,
    pub poll_interval: Duration,
    pub timezone: Tz,
    pub version: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let poll_ms: u64 = match var("DASHBOARD_POLL_INTERVAL_MS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DASHBOARD_POLL_INTERVAL_MS is not a number: {raw}"))?,
            Err(_) => 5_000,
        };

        let timezone = var("DASHBOARD_TIMEZONE")
            .unwrap_or_else(|_| "America/New_York".to_string())
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid DASHBOARD_TIMEZONE: {e}"))?;

        Ok(Self {
            client: ClientConfig::from_env()?,
            credentials_path: var("DASHBOARD_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".dashboard/credentials.json")),
            poll_interval: Duration::from_millis(poll_ms),
            timezone,
            version: var("APP_VERSION").unwrap_or_else(|_| "Unknown".to_string()),
        })
    }
}
