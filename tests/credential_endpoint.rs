use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;

use deckhand::{ConnectError, CredentialSource, HttpCredentialSource};

/// Serves `router` on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn fetches_ephemeral_key() {
    let base = serve(Router::new().route(
        "/api/session",
        get(|| async {
            axum::Json(json!({
                "id": "sess_1",
                "client_secret": {"value": "ek_live", "expires_at": 1700000000}
            }))
        }),
    ))
    .await;

    let source = HttpCredentialSource::new(&base);
    assert_eq!(source.fetch().await.unwrap().as_deref(), Some("ek_live"));
}

#[tokio::test]
async fn response_without_secret_is_absent() {
    let base = serve(Router::new().route(
        "/api/session",
        get(|| async { axum::Json(json!({"client_secret": {"value": ""}})) }),
    ))
    .await;

    let source = HttpCredentialSource::new(&base);
    assert_eq!(source.fetch().await.unwrap(), None);
}

#[tokio::test]
async fn error_status_is_a_credential_error() {
    let base = serve(Router::new().route(
        "/api/session",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
    ))
    .await;

    let source = HttpCredentialSource::new(&base);
    match source.fetch().await {
        Err(ConnectError::Credential(message)) => {
            assert!(message.contains("500"), "{}", message);
            assert!(message.contains("upstream down"), "{}", message);
        }
        other => panic!("expected credential error, got {:?}", other),
    }
}
