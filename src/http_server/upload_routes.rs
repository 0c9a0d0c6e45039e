//! Upload HTTP Routes
//!
//! `POST /api/upload?u=<id>&ts=<timestamp>&signature=<base64>` with a CSV body.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::context::AppContext;
use crate::ingest::{self, BatchResult, IngestError, UploadQuery, UploadRequest};

/// Upload routes with shared context
pub fn upload_routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/upload", post(upload_handler))
        .with_state(ctx)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: u8,
    pub n: usize,
    pub inserted_ids: Vec<String>,
}

impl From<BatchResult> for UploadResponse {
    fn from(result: BatchResult) -> Self {
        Self {
            ok: 1,
            n: result.inserted_count,
            inserted_ids: result.inserted_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub err: String,
}

impl From<&IngestError> for ErrorResponse {
    fn from(err: &IngestError) -> Self {
        Self {
            err: err.client_message(),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

// ==================
// Handlers
// ==================

async fn upload_handler(
    State(ctx): State<AppContext>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<UploadResponse>, IngestError> {
    let request = query
        .map_err(|rejection| IngestError::MalformedQuery(rejection.body_text()))
        .and_then(|Query(query)| UploadRequest::from_parts(query, &body))
        .map_err(|e| {
            tracing::warn!(code = e.code(), error = %e, "upload request not decodable");
            e
        })?;
    let result = ingest::ingest(&ctx, request).await?;
    Ok(Json(UploadResponse::from(result)))
}
