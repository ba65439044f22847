use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::queue::TranslateQueue;

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    image: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Image ingress for browser-extension style producers. Every accepted
/// image is enqueued; translation happens on the queue worker.
pub async fn run_server(queue: TranslateQueue, addr: String) -> Result<()> {
    let app = router(queue);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!(%addr, "ingress server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(queue: TranslateQueue) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/translate", post(translate))
        .route("/clear", post(clear))
        .with_state(queue)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn translate(
    State(queue): State<TranslateQueue>,
    Json(payload): Json<TranslateRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let image = decode_image_payload(&payload.image).map_err(|message| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: message }),
        )
    })?;
    if queue.enqueue(image) {
        info!("image accepted");
    } else {
        info!("image already queued, ignored");
    }
    Ok(Json(StatusResponse { status: "success" }))
}

async fn clear(State(queue): State<TranslateQueue>) -> impl IntoResponse {
    queue.clear_all();
    (StatusCode::OK, Json(StatusResponse { status: "success" }))
}

/// Accepts both `data:image/...;base64,xxxx` URLs and bare base64.
fn decode_image_payload(payload: &str) -> Result<Vec<u8>, String> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err("image is required".to_string());
    }
    let encoded = match trimmed.split_once(',') {
        Some((_prefix, rest)) => rest,
        None => trimmed,
    };
    let bytes = BASE64
        .decode(encoded)
        .map_err(|err| format!("invalid base64 image: {}", err))?;
    if bytes.is_empty() {
        return Err("image is empty".to_string());
    }
    Ok(bytes)
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_payload_is_decoded() {
        let encoded = BASE64.encode(b"image-bytes");
        let payload = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_image_payload(&payload).unwrap(), b"image-bytes");
    }

    #[test]
    fn bare_base64_payload_is_decoded() {
        let encoded = BASE64.encode(b"image-bytes");
        assert_eq!(decode_image_payload(&encoded).unwrap(), b"image-bytes");
    }

    #[test]
    fn invalid_payloads_are_rejected() {
        assert!(decode_image_payload("").is_err());
        assert!(decode_image_payload("data:image/png;base64,!!!").is_err());
        assert!(decode_image_payload("data:image/png;base64,").is_err());
    }
}
