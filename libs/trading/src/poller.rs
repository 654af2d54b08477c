use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::{
    sync::{Notify, watch},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument;

use crate::{client::TradingClient, models::Quote, watchset::Watchset};

/// Published quotes keyed by symbol. Replaced whole on every publish.
pub type QuoteSnapshot = Arc<BTreeMap<String, Quote>>;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new snapshot went out.
    Published { updated: usize, failed: usize },
    /// Nothing to publish: empty watchset or every fetch failed.
    Unchanged { failed: usize },
    /// The poller was stopped or restarted while the batch was in flight, or
    /// a batch started later had already published.
    Discarded,
    /// The poller is not running.
    Idle,
}

/// Runs every future at once and waits for all of them. Failures stay in
/// their slot next to their key instead of failing the batch.
pub async fn gather_settled<K, T, E, F>(tasks: impl IntoIterator<Item = (K, F)>) -> Vec<(K, Result<T, E>)>
where
    F: Future<Output = Result<T, E>>,
{
    let (keys, futures): (Vec<K>, Vec<F>) = tasks.into_iter().unzip();
    let results = join_all(futures).await;
    keys.into_iter().zip(results).collect()
}

struct PollerState {
    // bumped by start/stop; a tick only publishes if it still matches
    generation: u64,
    // every batch takes the next number when it starts
    next_batch: u64,
    last_published: u64,
    watchset: Option<Watchset>,
    wake: Option<Arc<Notify>>,
}

struct Inner {
    client: TradingClient,
    state: Mutex<PollerState>,
    snapshot: watch::Sender<QuoteSnapshot>,
}

/// Keeps the quotes of a [`Watchset`] fresh on a fixed interval.
#[derive(Clone)]
pub struct QuotePoller {
    inner: Arc<Inner>,
}

impl QuotePoller {
    pub fn new(client: TradingClient) -> Self {
        let (snapshot, _) = watch::channel(QuoteSnapshot::default());

        Self {
            inner: Arc::new(Inner {
                client,
                state: Mutex::new(PollerState {
                    generation: 0,
                    next_batch: 0,
                    last_published: 0,
                    watchset: None,
                    wake: None,
                }),
                snapshot,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QuoteSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> QuoteSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().watchset.is_some()
    }

    /// Starts polling `watchset` every `every`, first tick immediately.
    /// Calling it while running restarts with the new watchset.
    pub fn start(&self, watchset: Watchset, every: Duration) {
        let every = every.max(MIN_INTERVAL);

        let (generation, wake) = {
            let mut state = self.inner.state.lock();
            if let Some(previous) = state.wake.take() {
                previous.notify_one();
            }
            state.generation += 1;
            state.watchset = Some(watchset);

            let wake = Arc::new(Notify::new());
            state.wake = Some(Arc::clone(&wake));
            (state.generation, wake)
        };

        info!(
            generation,
            interval_ms = every.as_millis() as u64,
            "quote poller started"
        );

        let span = info_span!("quote_poller", generation);
        tokio::spawn(run(Arc::downgrade(&self.inner), generation, every, wake).instrument(span));
    }

    /// No publish happens after this returns, including from a batch that is
    /// still in flight.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if state.watchset.take().is_none() {
            return;
        }

        state.generation += 1;
        if let Some(wake) = state.wake.take() {
            wake.notify_one();
        }
        info!(generation = state.generation, "quote poller stopped");
    }

    /// Runs one poll cycle now.
    pub async fn tick(&self) -> TickOutcome {
        let generation = self.inner.state.lock().generation;
        self.inner.poll(generation).await
    }
}

async fn run(inner: Weak<Inner>, generation: u64, every: Duration, wake: Arc<Notify>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = wake.notified() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.state.lock().generation != generation {
            break;
        }

        let outcome = inner.poll(generation).await;
        debug!(?outcome, "tick finished");
    }

    debug!("quote poller task exited");
}

impl Inner {
    async fn poll(&self, generation: u64) -> TickOutcome {
        let (watchset, batch) = {
            let mut state = self.state.lock();
            let watchset = match &state.watchset {
                Some(w) if state.generation == generation => w.clone(),
                Some(_) => return TickOutcome::Discarded,
                None => return TickOutcome::Idle,
            };
            state.next_batch += 1;
            (watchset, state.next_batch)
        };

        let symbols = watchset.list();
        if symbols.is_empty() {
            return TickOutcome::Unchanged { failed: 0 };
        }

        let results = gather_settled(symbols.iter().map(|symbol| {
            let client = self.client.clone();
            let span = info_span!("quote", symbol = %symbol);
            let fetch = {
                let symbol = symbol.clone();
                async move { client.quote(&symbol).await }.instrument(span)
            };
            (symbol.clone(), fetch)
        }))
        .await;

        let mut fresh = Vec::with_capacity(results.len());
        let mut failed = 0usize;
        for (symbol, result) in results {
            match result {
                Ok(quote) => fresh.push((symbol, quote)),
                Err(e) => {
                    failed += 1;
                    warn!(symbol = %symbol, error = %e, "quote fetch failed, keeping last value");
                }
            }
        }

        if fresh.is_empty() {
            warn!(failed, "every quote fetch failed this tick");
            return TickOutcome::Unchanged { failed };
        }

        let mut state = self.state.lock();
        if state.generation != generation || state.watchset.is_none() {
            debug!(dropped = fresh.len(), "discarding results of a cancelled tick");
            return TickOutcome::Discarded;
        }
        if batch < state.last_published {
            debug!(
                batch,
                last_published = state.last_published,
                "discarding results older than the published snapshot"
            );
            return TickOutcome::Discarded;
        }
        state.last_published = batch;

        let polled: BTreeSet<&String> = symbols.iter().collect();
        let previous = self.snapshot.borrow().clone();
        let mut next: BTreeMap<String, Quote> = previous
            .iter()
            .filter(|(symbol, _)| polled.contains(symbol))
            .map(|(symbol, quote)| (symbol.clone(), quote.clone()))
            .collect();

        let updated = fresh.len();
        next.extend(fresh);
        self.snapshot.send_replace(Arc::new(next));
        drop(state);

        debug!(updated, failed, "published quote snapshot");
        TickOutcome::Published { updated, failed }
    }
}
