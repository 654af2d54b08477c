use tracing::info;
use trading::models::{Order, Portfolio, Side};

use super::local_naive;
use crate::{Data, Error};

fn print_portfolio(portfolio: &Portfolio) {
    if portfolio.holdings.is_empty() {
        println!("No holdings yet.");
    }

    for h in &portfolio.holdings {
        println!(
            "{:<6} {:>6} @ {:>9.2}  now {:>9.2}  value {:>11.2}  P/L {:>+10.2} ({:+.2}%)",
            h.stock_symbol,
            h.quantity,
            h.average_price,
            h.current_price,
            h.market_value,
            h.unrealized_gain_loss,
            h.unrealized_gain_loss_percent
        );
    }

    let s = &portfolio.summary;
    println!(
        "total {:.2} (cost {:.2}), P/L {:+.2} ({:+.2}%) across {} holdings",
        s.total_value, s.total_cost, s.total_gain_loss, s.total_gain_loss_percent, s.holdings_count
    );
}

pub async fn portfolio(data: &Data) -> Result<(), Error> {
    let portfolio = data.client.portfolio().await?;
    print_portfolio(&portfolio);
    Ok(())
}

pub async fn trade(
    data: &Data,
    side: Side,
    symbol: &str,
    quantity: u32,
    price: Option<f64>,
) -> Result<(), Error> {
    if quantity == 0 {
        println!("Quantity must be at least 1.");
        return Ok(());
    }

    let order = match price {
        Some(price) => Order::limit(symbol, quantity, price),
        None => Order::market(symbol, quantity),
    };
    let receipt = match side {
        Side::Buy => data.client.buy(&order).await?,
        Side::Sell => data.client.sell(&order).await?,
    };

    let tx = &receipt.transaction;
    info!(
        transaction_id = tx.id,
        side = ?tx.transaction_type,
        total = tx.total_amount,
        "order filled"
    );
    println!("{}", receipt.message);
    println!(
        "#{} {} {} x {:.2} = {:.2} at {}",
        tx.id,
        tx.stock_symbol.as_deref().unwrap_or(&order.symbol),
        tx.quantity,
        tx.price,
        tx.total_amount,
        local_naive(tx.timestamp, data.config.timezone)
    );
    Ok(())
}

pub async fn transactions(data: &Data, page: u32, per_page: u32) -> Result<(), Error> {
    let page = data.client.transactions(page, per_page).await?;

    if page.items.is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    for tx in &page.items {
        let side = match tx.transaction_type {
            Side::Buy => "BUY ",
            Side::Sell => "SELL",
        };
        println!(
            "{}  {side} {:<6} {:>6} x {:>9.2} = {:>11.2}",
            local_naive(tx.timestamp, data.config.timezone),
            tx.stock_symbol.as_deref().unwrap_or("?"),
            tx.quantity,
            tx.price,
            tx.total_amount
        );
    }
    let p = &page.pagination;
    println!("page {}/{} ({} total)", p.page, p.pages.max(1), p.total);
    Ok(())
}

pub async fn performance(data: &Data, days: u32) -> Result<(), Error> {
    let perf = data.client.performance(days).await?;
    let tz = data.config.timezone;

    println!(
        "{} to {} ({} days)",
        local_naive(perf.performance_period.start_date, tz),
        local_naive(perf.performance_period.end_date, tz),
        perf.period_days
    );
    println!(
        "invested {:.2}, divested {:.2}, net {:.2} over {} transactions",
        perf.total_invested, perf.total_divested, perf.net_invested, perf.transactions_count
    );
    print_portfolio(&perf.current_portfolio);
    Ok(())
}
