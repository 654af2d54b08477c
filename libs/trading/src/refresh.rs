use std::sync::Arc;

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parking_lot::Mutex;
use reqwest::{
    Method,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{
    credentials::{CredentialStore, Credentials},
    error::RefreshError,
    models::{Envelope, TokensData},
    transport::{ApiRequest, Transport},
};

type Episode = Shared<BoxFuture<'static, Result<(), RefreshError>>>;

/// Single-flight renewal of the credential pair.
///
/// At most one refresh episode exists at a time. Callers arriving while an
/// episode is running attach to it and observe its outcome; only the caller
/// that opens an episode causes a network call.
#[derive(Clone)]
pub struct RefreshCoordinator {
    url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    in_flight: Arc<Mutex<Option<Episode>>>,
}

impl RefreshCoordinator {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
            transport,
            store,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Renews the stored pair, joining the episode already running if any.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        self.refresh_from(None).await
    }

    /// Renews the pair after `stale_access` was rejected. Resolves at once if
    /// the stored access token has already moved on.
    pub(crate) async fn refresh_after(&self, stale_access: &str) -> Result<(), RefreshError> {
        self.refresh_from(Some(stale_access)).await
    }

    #[instrument(name = "refresh", skip_all)]
    async fn refresh_from(&self, stale_access: Option<&str>) -> Result<(), RefreshError> {
        let episode = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(running) => {
                    debug!("joining in-flight refresh");
                    running.clone()
                }
                None => {
                    let Some(credentials) = self.store.get() else {
                        warn!("refresh requested without a stored credential");
                        return Err(RefreshError::NoCredential);
                    };

                    // checked under the slot lock, so a finished episode is seen here
                    if stale_access.is_some_and(|stale| stale != credentials.access_token) {
                        debug!("credential already rotated");
                        return Ok(());
                    }

                    let episode = Self::run(
                        self.url.clone(),
                        Arc::clone(&self.transport),
                        Arc::clone(&self.store),
                        Arc::clone(&self.in_flight),
                        credentials.refresh_token,
                    )
                    .boxed()
                    .shared();

                    *slot = Some(episode.clone());
                    episode
                }
            }
        };

        episode.await
    }

    async fn run(
        url: String,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        in_flight: Arc<Mutex<Option<Episode>>>,
        refresh_token: String,
    ) -> Result<(), RefreshError> {
        info!("refreshing session");

        let outcome = Self::exchange(&url, transport.as_ref(), refresh_token).await;
        match &outcome {
            Ok(credentials) => {
                store.set(credentials.clone());
                info!("session refreshed");
            }
            Err(e) => {
                store.clear();
                warn!(error = %e, "session refresh failed, credentials cleared");
            }
        }

        // Store is settled before the slot reopens, so a later episode reads
        // the pair this one produced.
        in_flight.lock().take();

        outcome.map(|_| ())
    }

    async fn exchange(
        url: &str,
        transport: &dyn Transport,
        refresh_token: String,
    ) -> Result<Credentials, RefreshError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request = ApiRequest {
            method: Method::POST,
            url: url.to_string(),
            headers,
            query: Vec::new(),
            body: Some(json!({ "refresh_token": refresh_token })),
        };

        let response = transport
            .execute(request)
            .await
            .map_err(RefreshError::Network)?;

        if !response.status.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
                message: response.server_message(),
            });
        }

        let data: TokensData = Envelope::unwrap_data(&response)
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;

        Ok(Credentials::new(
            data.tokens.access_token,
            data.tokens.refresh_token,
        ))
    }
}
