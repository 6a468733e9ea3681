use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use folio::persist::IndexPaths;
use folio::SearchEngine;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path) {
    let mut engine = SearchEngine::default();
    engine.build_index(vec![
        "Rust is great. rust systems programming. See page 3.",
        "Learning rust.",
        "Ownership and borrowing, see page 1.",
        "The cat chased the dog.",
    ]);
    engine.save(&IndexPaths::new(dir)).unwrap();
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

fn app_for(dir: &std::path::Path) -> Router {
    server::build_app(dir.to_string_lossy().to_string()).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "GET", "/search?q=rust&size=2").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["page_number"].as_u64().unwrap(), 1);
    assert_eq!(arr[0]["match_count"].as_u64().unwrap(), 2);
    assert_eq!(arr[1]["page_number"].as_u64().unwrap(), 2);
    assert_eq!(arr[1]["rank"].as_u64().unwrap(), 2);
    assert!(arr[0]["snippet"].as_str().unwrap().contains("<em>Rust</em>"));
    assert_eq!(json["mode"], "free_text");
    assert_eq!(json["weak_match"], true);
}

#[tokio::test]
async fn boolean_queries_and_parse_errors() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "GET", "/search?q=cat%20AND%20dog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "boolean");
    assert_eq!(json["results"][0]["page_number"].as_u64().unwrap(), 4);

    let (status, _) = call(app_for(dir.path()), "GET", "/search?q=%28cat%20AND%20dog").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app_for(dir.path()), "GET", "/search?q=cat&size=500").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn weak_matches_carry_corrections() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "GET", "/search?q=ownershp").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"].as_u64().unwrap(), 0);
    assert_eq!(json["corrections"][0]["term"], "ownershp");
    assert_eq!(json["corrections"][0]["suggestions"][0]["term"], "ownership");
}

#[tokio::test]
async fn page_lookup_and_suggest() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "GET", "/page/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "Learning rust.");

    let (status, _) = call(app_for(dir.path()), "GET", "/page/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = call(app_for(dir.path()), "GET", "/suggest?q=bor").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["term"], "borrowing");
}

#[tokio::test]
async fn reload_requires_admin_token() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, _) = call(app_for(dir.path()), "POST", "/index/reload").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
