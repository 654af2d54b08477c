mod client;
mod config;
mod credentials;
mod error;
mod pipeline;
mod poller;
mod refresh;
mod transport;
mod watchset;

pub mod models;

pub use client::TradingClient;
pub use config::{ClientConfig, DEFAULT_API_URL};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::{RefreshError, RequestError};
pub use pipeline::{RequestOptions, RequestPipeline};
pub use poller::{QuotePoller, QuoteSnapshot, TickOutcome, gather_settled};
pub use refresh::RefreshCoordinator;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};
pub use watchset::{Watchset, parse_symbols};
