//! Integration tests for the liveness endpoint

use std::net::TcpListener;
use std::sync::Arc;

use shop_auth::auth::{AccessTokenCodec, TokenType, TypeCheck};
use shop_auth::configuration::SigningSecret;
use shop_auth::session::{SessionLifetimes, SessionService};
use shop_auth::startup::run;
use shop_auth::store::InMemoryStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = Arc::new(InMemoryStore::new());
    let codec = AccessTokenCodec::new(
        &SigningSecret::new(b"health-check-secret"),
        TypeCheck::Require(TokenType::Access),
    );
    let session = SessionService::new(store.clone(), store, codec, SessionLifetimes::default());

    let server = run(listener, session).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/nope", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
