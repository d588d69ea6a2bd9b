use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    error::ApiError,
    models::HealthResponse,
    state::AppState,
    utils::{FilePart, read_file_field},
};
use crate::endpoints::{TransportErrorCode, UploadRequest};

/// File upload endpoint (POST /upload/{endpoint})
///
/// ## Flow:
/// 1. Resolve the endpoint handler (unknown name -> 404)
/// 2. Read the `file` field; transport problems become a return code
/// 3. Hand the request to the endpoint handler
/// 4. Answer with the status text for the outcome
///
/// The client address is the transport peer; forwarded headers are ignored.
pub async fn upload(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.registry.get(&endpoint)?;

    let client_addr = peer.ip().to_canonical();
    let request_id = Uuid::now_v7();
    let span = tracing::info_span!("upload", %request_id, endpoint = %endpoint, client = %client_addr);

    async move {
        let request = match multipart {
            Ok(mut multipart) => {
                let max_size = state.config.server.max_upload_bytes.as_usize();
                match read_file_field(&mut multipart, max_size).await {
                    FilePart::Received { file_name, content } => {
                        UploadRequest::new(client_addr, file_name, content)
                    }
                    FilePart::Failed { file_name, code } => {
                        UploadRequest::failed(client_addr, file_name, code)
                    }
                }
            }
            Err(rejection) => {
                tracing::warn!(error = %rejection, "Request is not a multipart upload");
                UploadRequest::failed(client_addr, "", TransportErrorCode::NoFile)
            }
        };

        match handler.handle(request).await {
            Ok(receipt) => Ok((StatusCode::OK, Html(receipt.render()))),
            Err(e) => {
                tracing::debug!(code = e.code(), error = %e, "Upload not stored");
                Err(ApiError::from(e))
            }
        }
    }
    .instrument(span)
    .await
}

/// Health check endpoint (GET /health)
///
/// Lists the configured endpoints and the in-process counters. The service
/// holds no external connections, so responding at all means healthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    for name in state.registry.names() {
        components.insert(format!("endpoint:{}", name), "healthy".to_string());
    }
    components.insert(
        "notify".to_string(),
        format!("{:?}", state.config.notify.transport).to_lowercase(),
    );

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.metrics.snapshot(),
    };

    (StatusCode::OK, Json(response))
}
