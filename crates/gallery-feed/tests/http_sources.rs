//! HTTP adapters against a local stand-in for the two providers.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use gallery_feed::error::SourceError;
use gallery_feed::upstream::{HttpImageSource, ImageSource};
use gallery_proto::config::ImagesConfig;
use gallery_proto::protocol::SourceKind;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Deserialize)]
struct LimitQuery {
    limit: usize,
}

async fn dogs(Path(count): Path<usize>) -> Json<Value> {
    let urls: Vec<String> = (0..count)
        .map(|i| format!("https://images.dog.ceo/breeds/pug/{i}.jpg"))
        .collect();
    Json(json!({ "message": urls, "status": "success" }))
}

async fn cats(Query(query): Query<LimitQuery>) -> Json<Value> {
    let entries: Vec<Value> = (0..query.limit)
        .map(|i| {
            json!({
                "id": format!("c{i}"),
                "url": format!("https://cdn2.thecatapi.com/images/c{i}.jpg"),
                "width": 600,
                "height": 400
            })
        })
        .collect();
    Json(Value::Array(entries))
}

async fn mixed_hosts() -> Json<Value> {
    Json(json!({
        "message": [
            "https://images.dog.ceo/breeds/pug/ok.jpg",
            "https://tracker.example.net/pixel.gif"
        ]
    }))
}

/// Serve the fake providers on an ephemeral port and return its base URL.
async fn serve() -> String {
    let app = Router::new()
        .route("/api/breeds/image/random/:count", get(dogs))
        .route("/v1/images/search", get(cats))
        .route("/broken/:count", get(|| async { StatusCode::BAD_GATEWAY }))
        .route("/garbage/:count", get(|| async { "<html>rate limited</html>" }))
        .route("/shape/:count", get(|| async { Json(json!({ "message": "oops" })) }))
        .route("/mixed/:count", get(mixed_hosts));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn source(kind: SourceKind, url: String) -> HttpImageSource {
    HttpImageSource::new(kind, reqwest::Client::new(), url, ImagesConfig::default())
}

#[tokio::test]
async fn primary_source_requests_count_in_path() {
    let base = serve().await;
    let dogs = source(SourceKind::Primary, format!("{base}/api/breeds/image/random"));

    let items = dogs.fetch_batch(7).await.unwrap();
    assert_eq!(items.len(), 7);
    assert!(items.iter().all(|i| i.source() == SourceKind::Primary));
    assert_eq!(items[0].url(), "https://images.dog.ceo/breeds/pug/0.jpg");
}

#[tokio::test]
async fn primary_source_caps_page_size() {
    let base = serve().await;
    let dogs = source(SourceKind::Primary, format!("{base}/api/breeds/image/random/"));

    assert_eq!(dogs.fetch_batch(500).await.unwrap().len(), 50);
}

#[tokio::test]
async fn secondary_source_sends_limit() {
    let base = serve().await;
    let cats = source(SourceKind::Secondary, format!("{base}/v1/images/search"));

    let items = cats.fetch_batch(10).await.unwrap();
    assert_eq!(items.len(), 10);
    assert!(items.iter().all(|i| i.source() == SourceKind::Secondary));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let base = serve().await;
    let dogs = source(SourceKind::Primary, format!("{base}/broken"));

    match dogs.fetch_batch(10).await {
        Err(SourceError::Status { kind, status }) => {
            assert_eq!(kind, SourceKind::Primary);
            assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let base = serve().await;
    let dogs = source(SourceKind::Primary, format!("{base}/garbage"));

    let err = dogs.fetch_batch(10).await.unwrap_err();
    assert!(matches!(err, SourceError::MalformedPayload { .. }));
    assert_eq!(err.kind(), SourceKind::Primary);
}

#[tokio::test]
async fn unexpected_shape_is_empty_not_error() {
    let base = serve().await;
    let dogs = source(SourceKind::Primary, format!("{base}/shape"));

    assert!(dogs.fetch_batch(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn images_outside_allowed_hosts_are_dropped() {
    let base = serve().await;
    let dogs = source(SourceKind::Primary, format!("{base}/mixed"));

    let items = dogs.fetch_batch(2).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url(), "https://images.dog.ceo/breeds/pug/ok.jpg");
}

#[tokio::test]
async fn unreachable_provider_is_an_upstream_error() {
    // Bind then drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cats = source(SourceKind::Secondary, format!("http://{addr}/v1/images/search"));
    let err = cats.fetch_batch(10).await.unwrap_err();
    assert!(matches!(err, SourceError::Upstream { kind: SourceKind::Secondary, .. }));
}
