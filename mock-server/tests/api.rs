use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn movies() -> Vec<Value> {
    vec![
        json!({"id": "1", "title": "Alien", "year": 1979, "rating": 8.5}),
        json!({"id": "2", "title": "Aliens", "year": 1986, "rating": 8.4}),
        json!({"id": "3", "title": "Alien 3", "year": 1992, "rating": 6.4}),
        json!({"id": "4", "title": "Prometheus", "year": 2012}),
    ]
}

// --- query ---

#[tokio::test]
async fn query_without_body_lists_everything() {
    let resp = app_with(movies())
        .oneshot(Request::builder().uri("/documents").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let documents: Vec<Value> = body_json(resp).await;
    assert_eq!(documents.len(), 4);
}

#[tokio::test]
async fn query_filters_sorts_and_pages() {
    let resp = app_with(movies())
        .oneshot(json_request(
            "GET",
            "/documents",
            r#"{"filter":[{"year":{"operator":">","value":1980}}],"sort":[{"year":"desc"}],"limit":2}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let documents: Vec<Value> = body_json(resp).await;
    let titles: Vec<&str> = documents.iter().map(|d| d["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["Prometheus", "Alien 3"]);
}

#[tokio::test]
async fn count_query_returns_number() {
    let resp = app_with(movies())
        .oneshot(json_request(
            "GET",
            "/documents",
            r#"{"type":"count","filter":[{"rating":{"operator":"exists"}}]}"#,
        ))
        .await
        .unwrap();

    let count: u64 = body_json(resp).await;
    assert_eq!(count, 3);
}

#[tokio::test]
async fn aggregation_query_wraps_documents() {
    let resp = app_with(movies())
        .oneshot(json_request(
            "GET",
            "/documents",
            r#"{"aggregation":[{"rating":{"name":"unrated","operator":"missing"}}],"limit":0}"#,
        ))
        .await
        .unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body["aggregations"]["unrated"], 1);
    assert_eq!(body["documents"], json!([]));
}

#[tokio::test]
async fn malformed_query_returns_400() {
    let resp = app()
        .oneshot(json_request("GET", "/documents", "{not json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_operator_returns_400() {
    let resp = app_with(movies())
        .oneshot(json_request(
            "GET",
            "/documents",
            r#"{"filter":[{"year":{"operator":"~","value":1}}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("year"));
}

// --- documents ---

#[tokio::test]
async fn create_assigns_id() {
    let resp = app()
        .oneshot(json_request("POST", "/documents", r#"{"title":"Dune"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let document: Value = body_json(resp).await;
    assert_eq!(document["title"], "Dune");
    assert!(document["id"].is_string());
}

#[tokio::test]
async fn get_missing_document_returns_404() {
    let resp = app()
        .oneshot(Request::builder().uri("/documents/nope").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_merges_fields() {
    let resp = app_with(movies())
        .oneshot(json_request("PATCH", "/documents/4", r#"{"rating":7.0,"id":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let document: Value = body_json(resp).await;
    assert_eq!(document["id"], "4");
    assert_eq!(document["title"], "Prometheus");
    assert_eq!(document["rating"], 7.0);
}

#[tokio::test]
async fn document_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/documents", r#"{"id":"d1","title":"Dune"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PUT", "/documents/d1", r#"{"title":"Dune Messiah"}"#))
        .await
        .unwrap();
    let document: Value = body_json(resp).await;
    assert_eq!(document, json!({"id": "d1", "title": "Dune Messiah"}));

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri("/documents/d1")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(Request::builder().uri("/documents/d1").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- test endpoints ---

#[tokio::test]
async fn echo_reflects_request() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/echo?a=1")
                .header("X-Custom", "one")
                .header("X-Custom", "two")
                .body("payload".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.headers()["x-echo-method"], "PUT");
    let body: Value = body_json(resp).await;
    assert_eq!(body["method"], "PUT");
    assert_eq!(body["uri"], "/echo?a=1");
    assert_eq!(body["headers"]["x-custom"], json!(["one", "two"]));
    assert_eq!(body["body"], "payload");
}

#[tokio::test]
async fn status_endpoint_uses_requested_code() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/418").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(resp).await, "status 418");
}

#[tokio::test]
async fn slow_endpoint_answers() {
    let resp = app()
        .oneshot(Request::builder().uri("/slow/1").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, r#""body""#);
}
