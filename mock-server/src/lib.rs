//! In-memory document API that understands the JSON query DSL.
//!
//! Besides `/documents`, the router exposes endpoints used by client tests:
//! `/echo` reflects the request back, `/status/{code}` answers with any
//! status and `/slow/{millis}` delays its answer.

pub mod query;

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

use crate::query::Query;

pub type Db = Arc<RwLock<Vec<Value>>>;

pub fn app() -> Router {
    app_with(Vec::new())
}

/// Router preloaded with `documents`.
pub fn app_with(documents: Vec<Value>) -> Router {
    let db: Db = Arc::new(RwLock::new(documents));
    Router::new()
        .route("/documents", get(query_documents).post(create_document))
        .route(
            "/documents/{id}",
            get(get_document)
                .put(replace_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/slow/{millis}", any(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn has_id(document: &Value, id: &str) -> bool {
    document.get("id").and_then(Value::as_str) == Some(id)
}

fn find<'a>(documents: &'a mut [Value], id: &str) -> Option<&'a mut Value> {
    documents.iter_mut().find(|d| has_id(d, id))
}

/// Queries arrive as the request body, even on GET.
async fn query_documents(State(db): State<Db>, body: Bytes) -> Response {
    let query: Query = if body.is_empty() {
        Query::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(query) => query,
            Err(e) => return bad_request(format!("invalid query: {e}")),
        }
    };
    tracing::debug!(filters = query.filter.len(), "querying documents");

    let documents = db.read().await;
    match crate::query::run(&query, &documents) {
        Ok(outcome) => Json(outcome.into_json()).into_response(),
        Err(e) => bad_request(e.0),
    }
}

async fn create_document(
    State(db): State<Db>,
    Json(mut document): Json<Map<String, Value>>,
) -> (StatusCode, Json<Value>) {
    document
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    let document = Value::Object(document);
    db.write().await.push(document.clone());
    (StatusCode::CREATED, Json(document))
}

async fn get_document(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let documents = db.read().await;
    documents
        .iter()
        .find(|d| has_id(d, &id))
        .map(|d| Json(d.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn replace_document(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(mut input): Json<Map<String, Value>>,
) -> Result<Json<Value>, StatusCode> {
    let mut documents = db.write().await;
    let document = find(&mut documents, &id).ok_or(StatusCode::NOT_FOUND)?;
    input.insert("id".to_string(), Value::String(id));
    *document = Value::Object(input);
    Ok(Json(document.clone()))
}

async fn update_document(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, StatusCode> {
    let mut documents = db.write().await;
    let document = find(&mut documents, &id).ok_or(StatusCode::NOT_FOUND)?;
    if let Value::Object(fields) = document {
        for (key, value) in input {
            if key != "id" {
                fields.insert(key, value);
            }
        }
    }
    Ok(Json(document.clone()))
}

async fn delete_document(State(db): State<Db>, Path(id): Path<String>) -> StatusCode {
    let mut documents = db.write().await;
    let before = documents.len();
    documents.retain(|d| !has_id(d, &id));
    if documents.len() < before {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut seen = Map::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        if let Value::Array(values) = seen
            .entry(name.as_str())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            values.push(Value::String(value));
        }
    }
    tracing::debug!(%method, %uri, "echo");
    (
        [("x-echo-method", method.to_string())],
        Json(serde_json::json!({
            "method": method.as_str(),
            "uri": uri.to_string(),
            "headers": seen,
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => bad_request(format!("bad status {code}")),
    }
}

async fn slow(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    r#""body""#
}
