use std::{collections::BTreeSet, sync::Arc};

use parking_lot::RwLock;

/// Symbols that currently need live quotes.
///
/// Cheap to clone; clones share the same set, so the view layer can mutate it
/// while a poller reads it.
#[derive(Clone, Default)]
pub struct Watchset {
    symbols: Arc<RwLock<BTreeSet<String>>>,
}

impl Watchset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::new();
        for sym in symbols {
            set.add(sym.as_ref());
        }
        set
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Starts watching `symbol`. Blank input is ignored; `false` when the
    /// symbol was already watched.
    pub fn add(&self, symbol: &str) -> bool {
        let symbol = Self::normalize(symbol);
        if symbol.is_empty() {
            return false;
        }
        self.symbols.write().insert(symbol)
    }

    /// Stops watching `symbol`; `false` when it was not being watched.
    pub fn remove(&self, symbol: &str) -> bool {
        self.symbols.write().remove(&Self::normalize(symbol))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.read().contains(&Self::normalize(symbol))
    }

    /// Sorted copy of the current symbols
    pub fn list(&self) -> Vec<String> {
        self.symbols.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

/// Splits user input like `"tsla, msft,,AAPL"` into normalized symbols.
pub fn parse_symbols(input: &str) -> Vec<String> {
    input
        .split([',', ' ', '\n'])
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
