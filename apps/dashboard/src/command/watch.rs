use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use trading::{QuotePoller, QuoteSnapshot, RequestError, Watchset, parse_symbols};

use super::local_time;
use crate::{Data, Error};

const SESSION_CHECK: Duration = Duration::from_secs(1);

fn print_snapshot(data: &Data, snapshot: &QuoteSnapshot) {
    for quote in snapshot.values() {
        println!(
            "{:<6} {:>10.2} {:>+8.2} ({:>+6.2}%)  {}",
            quote.symbol,
            quote.price,
            quote.change,
            quote.change_percent,
            local_time(quote.timestamp, data.config.timezone)
        );
    }
    println!();
}

pub async fn watch(data: &Data, raw: &str, every: Option<Duration>) -> Result<(), Error> {
    let symbols = parse_symbols(raw);
    if symbols.is_empty() {
        warn!(raw_input = raw, "watch: no valid symbols");
        println!("No valid symbols provided.");
        return Ok(());
    }
    if !data.client.is_authenticated() {
        return Err(RequestError::NoCredential.into());
    }

    let every = every.unwrap_or(data.config.poll_interval);
    info!(
        count = symbols.len(),
        symbols = %symbols.join(", "),
        interval_ms = every.as_millis() as u64,
        "watch: starting"
    );
    println!("Watching {} (Ctrl-C to quit)", symbols.join(", "));

    let poller = QuotePoller::new(data.client.clone());
    let mut rx = poller.subscribe();
    poller.start(Watchset::from_symbols(&symbols), every);

    let mut session = interval(SESSION_CHECK);
    session.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            res = &mut shutdown => break res,
            changed = rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = rx.borrow_and_update().clone();
                print_snapshot(data, &snapshot);
            }
            _ = session.tick() => {
                // the pipeline clears the store once a session cannot be renewed
                if !data.client.is_authenticated() {
                    break Err(RequestError::AuthExpired.into());
                }
            }
        }
    };

    poller.stop();
    info!("watch: stopped");
    outcome
}

async fn shutdown_signal() -> Result<(), Error> {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
