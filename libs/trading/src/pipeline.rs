use std::sync::Arc;

use reqwest::{
    Method, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    credentials::{CredentialStore, Credentials},
    error::{RefreshError, RequestError},
    refresh::RefreshCoordinator,
    transport::{ApiRequest, ApiResponse, Transport},
};

/// Per-call options for [`RequestPipeline::send`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    pub anonymous: bool,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Never attach the stored credential (login, registration).
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// Authenticated request path shared by every API call.
///
/// A 401 on a credentialed call triggers one refresh through the
/// [`RefreshCoordinator`] and one retry. A second 401 is final.
#[derive(Clone)]
pub struct RequestPipeline {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresher: RefreshCoordinator,
}

impl RequestPipeline {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let refresher =
            RefreshCoordinator::new(&base_url, Arc::clone(&transport), Arc::clone(&store));

        Self {
            base_url,
            transport,
            store,
            refresher,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    #[instrument(name = "request", skip(self, options), fields(method = %options.method))]
    pub async fn send(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, RequestError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        let mut credentials = if options.anonymous {
            None
        } else {
            self.store.get()
        };
        let mut retried = false;

        loop {
            let request = Self::build(&url, &options, credentials.as_ref());
            let bearer_sent = request.headers.contains_key(AUTHORIZATION);
            let response = self.transport.execute(request).await.map_err(|e| {
                warn!(error = %e, "transport failure");
                RequestError::Network(e)
            })?;

            if response.status == StatusCode::UNAUTHORIZED && bearer_sent {
                if let Some(sent) = credentials.as_ref() {
                    if retried {
                        warn!("retried request still unauthorized, clearing credentials");
                        self.store.clear();
                        return Err(RequestError::AuthExpired);
                    }
                    retried = true;
                    let renewed = self.renew(sent).await?;
                    credentials = Some(renewed);
                    debug!("retrying with renewed credential");
                    continue;
                }
            }

            if !response.status.is_success() {
                let message = response.server_message();
                debug!(status = %response.status, message = %message, "request rejected");
                return Err(RequestError::Http {
                    status: response.status,
                    message,
                });
            }

            return Ok(response);
        }
    }

    /// Credential to retry with after `stale` was rejected.
    async fn renew(&self, stale: &Credentials) -> Result<Credentials, RequestError> {
        match self.refresher.refresh_after(&stale.access_token).await {
            Ok(()) => self.store.get().ok_or(RequestError::AuthExpired),
            Err(RefreshError::NoCredential) => {
                debug!("credential store already cleared");
                Err(RequestError::AuthExpired)
            }
            Err(e) => {
                debug!(error = %e, "refresh failed");
                Err(RequestError::AuthExpired)
            }
        }
    }

    fn build(url: &str, options: &RequestOptions, credentials: Option<&Credentials>) -> ApiRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(credentials) = credentials {
            headers.remove(AUTHORIZATION);
            match HeaderValue::from_str(&credentials.bearer()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("stored access token is not a valid header value"),
            }
        }

        ApiRequest {
            method: options.method.clone(),
            url: url.to_string(),
            headers,
            query: options.query.clone(),
            body: options.body.clone(),
        }
    }
}
