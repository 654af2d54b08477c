mod auth;
mod market;
mod portfolio;
mod watch;

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use clap::Subcommand;
use tracing::warn;
use trading::{RequestError, models::Side};

use crate::{Data, Error};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and store the session
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Forget the stored session
    Logout,
    /// Renew the stored session now
    Refresh,
    /// Show (or update) the current user
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// List stocks, optionally filtered
    Stocks {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Search stocks by symbol, name or sector
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        per_page: u32,
    },
    /// Stock details
    Stock { symbol: String },
    /// Latest quote for one symbol
    Quote { symbol: String },
    /// Price history
    History {
        symbol: String,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Holdings and summary
    Portfolio,
    /// Buy shares (market price unless --price is given)
    Buy {
        symbol: String,
        quantity: u32,
        #[arg(long)]
        price: Option<f64>,
    },
    /// Sell shares (market price unless --price is given)
    Sell {
        symbol: String,
        quantity: u32,
        #[arg(long)]
        price: Option<f64>,
    },
    /// Transaction ledger
    Transactions {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Portfolio performance over a period
    Performance {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Live quotes for comma-separated symbols until Ctrl-C
    Watch {
        symbols: String,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

pub async fn run(data: &Data, command: Command) -> Result<(), Error> {
    let result = match command {
        Command::Login { email, password } => auth::login(data, &email, &password).await,
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => auth::register(data, email, password, first_name, last_name).await,
        Command::Logout => auth::logout(data),
        Command::Refresh => auth::refresh(data).await,
        Command::Profile {
            first_name,
            last_name,
        } => auth::profile(data, first_name.as_deref(), last_name.as_deref()).await,
        Command::Stocks {
            search,
            page,
            per_page,
        } => market::stocks(data, search.as_deref(), page, per_page).await,
        Command::Search {
            query,
            page,
            per_page,
        } => market::search(data, &query, page, per_page).await,
        Command::Stock { symbol } => market::stock(data, &symbol).await,
        Command::Quote { symbol } => market::quote(data, &symbol).await,
        Command::History { symbol, days } => market::history(data, &symbol, days).await,
        Command::Portfolio => portfolio::portfolio(data).await,
        Command::Buy {
            symbol,
            quantity,
            price,
        } => portfolio::trade(data, Side::Buy, &symbol, quantity, price).await,
        Command::Sell {
            symbol,
            quantity,
            price,
        } => portfolio::trade(data, Side::Sell, &symbol, quantity, price).await,
        Command::Transactions { page, per_page } => {
            portfolio::transactions(data, page, per_page).await
        }
        Command::Performance { days } => portfolio::performance(data, days).await,
        Command::Watch {
            symbols,
            interval_ms,
        } => watch::watch(data, &symbols, interval_ms.map(Duration::from_millis)).await,
    };

    if let Err(e) = &result
        && let Some(RequestError::AuthExpired) = e.downcast_ref::<RequestError>()
    {
        warn!("session expired");
        println!("Session expired. Run `dashboard login` again.");
    }

    result
}

pub(crate) fn local_time(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

pub(crate) fn local_naive(at: NaiveDateTime, tz: Tz) -> String {
    local_time(at.and_utc(), tz)
}
