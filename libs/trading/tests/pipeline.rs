mod common;

use std::sync::Arc;

use common::{BASE_URL, EMAIL, FakeBackend, PASSWORD, QuoteReply, bearer_of, client_with};
use reqwest::{
    StatusCode,
    header::{CONTENT_TYPE, HeaderValue},
};
use trading::{
    CredentialStore, Credentials, MemoryCredentialStore, RequestError, RequestOptions,
    models::{Order, Side},
};

#[tokio::test]
async fn login_stores_pair_and_later_calls_use_it() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_with(&backend, &store);

    let user = client.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.first_name, "Ada");
    assert_eq!(store.get(), Some(backend.issued()));
    assert!(client.is_authenticated());

    let login = backend.requests_to("/auth/login").pop().unwrap();
    assert!(bearer_of(&login).is_none());

    client.profile().await.unwrap();
    let profile = backend.requests_to("/auth/profile").pop().unwrap();
    assert_eq!(bearer_of(&profile).as_deref(), Some("Bearer access-0"));
}

#[tokio::test]
async fn rejected_login_is_a_plain_http_error() {
    let backend = FakeBackend::new();
    let stale = backend.expired();
    let store = Arc::new(MemoryCredentialStore::with(stale.clone()));
    let client = client_with(&backend, &store);

    let err = client.login(EMAIL, "wrong").await.unwrap_err();

    match err {
        RequestError::Http { status, message } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(store.get(), Some(stale));
}

#[tokio::test]
async fn logout_clears_the_pair() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::with(backend.issued()));
    let client = client_with(&backend, &store);

    client.logout();

    assert!(store.get().is_none());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn server_rejection_is_surfaced_verbatim() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::with(backend.issued()));
    let client = client_with(&backend, &store);

    let err = client.sell(&Order::market("aapl", 500)).await.unwrap_err();

    assert!(matches!(
        err,
        RequestError::Http { status: StatusCode::BAD_REQUEST, ref message }
            if message == "Insufficient shares to sell"
    ));
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn buy_posts_order_and_returns_receipt() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::with(backend.issued()));
    let client = client_with(&backend, &store);

    let receipt = client.buy(&Order::market("aapl", 2)).await.unwrap();

    assert_eq!(receipt.transaction.id, 42);
    assert_eq!(receipt.transaction.transaction_type, Side::Buy);
    assert_eq!(receipt.transaction.total_amount, 300.0);

    let sent = backend.requests_to("/portfolio/buy").pop().unwrap();
    assert_eq!(
        sent.body.unwrap(),
        serde_json::json!({"symbol": "AAPL", "quantity": 2})
    );
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let backend = FakeBackend::new();
    backend.set_network_down(true);
    let store = Arc::new(MemoryCredentialStore::with(backend.expired()));
    let client = client_with(&backend, &store);

    let err = client.portfolio().await.unwrap_err();

    assert!(matches!(err, RequestError::Network(_)));
    assert_eq!(backend.requests_to("/portfolio").len(), 1);
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(store.get(), Some(backend.expired()));
}

#[tokio::test]
async fn quote_is_fetched_for_normalized_symbol() {
    let backend = FakeBackend::new();
    backend.script_quotes("NVDA", [QuoteReply::Price(880.25)]);
    let store = Arc::new(MemoryCredentialStore::with(backend.issued()));
    let client = client_with(&backend, &store);

    let quote = client.quote(" nvda ").await.unwrap();

    assert_eq!(quote.symbol, "NVDA");
    assert_eq!(quote.price, 880.25);
    assert_eq!(quote.change, 1.5);
    assert_eq!(backend.requests_to("/stocks/NVDA/quote").len(), 1);
}

#[tokio::test]
async fn unknown_route_reports_status_and_message() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::with(backend.issued()));
    let client = client_with(&backend, &store);

    let err = client.stock("ZZZZ").await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.to_string(), "HTTP 404 Not Found: Not found");
}

#[tokio::test]
async fn caller_headers_reach_the_wire() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::with(Credentials::new("access-0", "refresh-0")));
    let client = client_with(&backend, &store);

    let options = RequestOptions::get()
        .header(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"))
        .query("verbose", true);
    let res = client
        .pipeline()
        .send("auth/profile", options)
        .await
        .unwrap();
    assert!(res.status.is_success());

    let sent = backend.requests_to("/auth/profile").pop().unwrap();
    assert_eq!(sent.url, format!("{BASE_URL}/auth/profile"));
    assert_eq!(sent.headers[CONTENT_TYPE], "application/vnd.api+json");
    assert_eq!(sent.query, vec![("verbose".to_string(), "true".to_string())]);
}
