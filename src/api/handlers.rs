//! HTTP handlers implementing the wire protocol.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::api::adapter::Adapter;
use crate::api::state::AppState;
use crate::error::Error;
use crate::metrics;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Query parameters shared by `/write` and `/listChunks`.
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    category: String,
}

/// Query parameters for `/read`.
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    category: String,
    chunk: String,
    off: u64,
    #[serde(rename = "maxSize")]
    max_size: usize,
}

/// Query parameters for `/ack`.
#[derive(Debug, Deserialize)]
pub struct AckQuery {
    category: String,
    chunk: String,
    #[allow(dead_code)]
    size: u64,
}

/// `POST /write?category=<name>` — append the request body as one record.
#[instrument(skip(state, body), fields(category = %query.category, len = body.len()))]
pub async fn write(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
    body: Bytes,
) -> Result<&'static str, Error> {
    if body.is_empty() {
        return Err(Error::invalid_input("write requires a non-empty body"));
    }
    let adapter = Adapter::new(state.registry.clone());
    adapter.write(&query.category, &body).await?;
    metrics::global().record_write(query.category.as_str(), body.len());
    Ok("successful\n")
}

/// `GET /read?category=&chunk=&off=&maxSize=` — truncated byte window.
#[instrument(skip(state), fields(category = %query.category, chunk = %query.chunk, off = query.off, max_size = query.max_size))]
pub async fn read(State(state): State<AppState>, Query(query): Query<ReadQuery>) -> Result<Vec<u8>, Error> {
    let adapter = Adapter::new(state.registry.clone());
    let bytes = adapter.read(&query.category, &query.chunk, query.off, query.max_size).await?;
    metrics::global().record_read(query.category.as_str(), bytes.len());
    Ok(bytes)
}

/// `GET /listChunks?category=` — every chunk in the category directory.
#[instrument(skip(state), fields(category = %query.category))]
pub async fn list_chunks(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<serde_json::Value>, Error> {
    let adapter = Adapter::new(state.registry.clone());
    let chunks = adapter.list_chunks(&query.category).await?;
    Ok(Json(serde_json::to_value(chunks).unwrap_or_else(|_| json!([]))))
}

/// `GET /ack?category=&chunk=&size=` — delete a sealed chunk.
#[instrument(skip(state), fields(category = %query.category, chunk = %query.chunk))]
pub async fn ack(State(state): State<AppState>, Query(query): Query<AckQuery>) -> Result<&'static str, Error> {
    let adapter = Adapter::new(state.registry.clone());
    adapter.ack(&query.category, &query.chunk, query.size).await?;
    metrics::global().acks_total.inc();
    Ok("successful\n")
}

/// `GET /health` — ambient liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "instance": state.instance_name,
        "categories": state.registry.categories(),
    }))
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics_handler() -> String {
    metrics::collect()
}
