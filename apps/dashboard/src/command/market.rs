use trading::models::{Page, Stock};

use super::{local_naive, local_time};
use crate::{Data, Error};

fn print_page(page: &Page<Stock>) {
    if page.items.is_empty() {
        println!("No stocks found.");
        return;
    }

    for stock in &page.items {
        println!(
            "{:<6} {:<32} {}",
            stock.symbol,
            stock.name,
            stock.sector.as_deref().unwrap_or("-")
        );
    }
    let p = &page.pagination;
    println!("page {}/{} ({} total)", p.page, p.pages.max(1), p.total);
}

pub async fn stocks(
    data: &Data,
    search: Option<&str>,
    page: u32,
    per_page: u32,
) -> Result<(), Error> {
    let page = data.client.stocks(search, page, per_page).await?;
    print_page(&page);
    Ok(())
}

pub async fn search(data: &Data, query: &str, page: u32, per_page: u32) -> Result<(), Error> {
    let page = data.client.search(query, page, per_page).await?;
    print_page(&page);
    Ok(())
}

pub async fn stock(data: &Data, symbol: &str) -> Result<(), Error> {
    let stock = data.client.stock(symbol).await?;

    println!("{} - {}", stock.symbol, stock.name);
    if let Some(sector) = &stock.sector {
        println!("  sector:     {sector}");
    }
    if let Some(industry) = &stock.industry {
        println!("  industry:   {industry}");
    }
    if let Some(cap) = stock.market_cap {
        println!("  market cap: {cap}");
    }
    if let Some(description) = &stock.description {
        println!("\n{description}");
    }
    Ok(())
}

pub async fn quote(data: &Data, symbol: &str) -> Result<(), Error> {
    let q = data.client.quote(symbol).await?;
    println!(
        "{} {:.2} ({:+.2}, {:+.2}%) at {}",
        q.symbol,
        q.price,
        q.change,
        q.change_percent,
        local_time(q.timestamp, data.config.timezone)
    );
    Ok(())
}

pub async fn history(data: &Data, symbol: &str, days: u32) -> Result<(), Error> {
    let history = data.client.history(symbol, days).await?;

    println!("{} - last {days} days", history.stock.symbol);
    if history.prices.is_empty() {
        println!("No price data.");
        return Ok(());
    }

    for point in &history.prices {
        println!(
            "{}  {:>10.2}",
            local_naive(point.timestamp, data.config.timezone),
            point.price
        );
    }
    Ok(())
}
