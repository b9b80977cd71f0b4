//! HTTP transport for the price archive service.
//!
//! ## Routes
//!
//! - `POST /api/v0/prices` ingests the multipart `file` field and returns the
//!   aggregate snapshot as JSON.
//! - `GET /api/v0/prices` downloads every stored record as `prices.zip`.
//! - `GET /ping` is a liveness probe returning `{"data": "pong"}`.
//!
//! Pipeline work runs on the blocking pool; each request opens and releases
//! its own store connection there.

use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info, warn};
use pricebox_core::{AggregateSnapshot, RecordStore};
use pricebox_data::{
    EXPORT_FILE_NAME, ExportError, FailureKind, IngestError, export_archive, ingest_archive,
};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinError, spawn_blocking};

/// Route serving ingestion and export.
pub const PRICES_ROUTE: &str = "/api/v0/prices";
/// Multipart field carrying the uploaded archive.
pub const FILE_FIELD: &str = "file";

const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Build the service router over `store`.
///
/// Request bodies larger than `max_upload_bytes` are rejected before the
/// pipeline runs.
pub fn router<S>(store: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: RecordStore + Send + Sync + 'static,
{
    Router::new()
        .route("/ping", get(ping))
        .route(PRICES_ROUTE, get(download_prices::<S>).post(upload_prices::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(store)
}

/// Serve the router on `address` until the process receives Ctrl-C.
pub async fn serve<S>(store: Arc<S>, address: &str, max_upload_bytes: usize) -> io::Result<()>
where
    S: RecordStore + Send + Sync + 'static,
{
    let listener = TcpListener::bind(address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(store, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested; draining in-flight requests"),
        Err(err) => {
            warn!("cannot listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
    }
}

async fn ping() -> Json<Value> {
    Json(json!({ "data": "pong" }))
}

async fn upload_prices<S>(
    State(store): State<Arc<S>>,
    request: Result<Multipart, MultipartRejection>,
) -> Result<Json<AggregateSnapshot>, ApiError>
where
    S: RecordStore + Send + Sync + 'static,
{
    let mut multipart = request.map_err(|_| ApiError::InvalidFile)?;
    let upload = read_file_field(&mut multipart).await?;
    let snapshot = spawn_blocking(move || ingest_archive(store.as_ref(), &upload)).await??;
    Ok(Json(snapshot))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(ApiError::InvalidFile)
}

async fn download_prices<S>(State(store): State<Arc<S>>) -> Result<Response, ApiError>
where
    S: RecordStore + Send + Sync + 'static,
{
    let archive = spawn_blocking(move || export_archive(store.as_ref())).await??;
    let disposition = format!("attachment; filename={EXPORT_FILE_NAME}");
    let headers = [
        (CONTENT_TYPE, ZIP_CONTENT_TYPE.to_owned()),
        (CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, archive).into_response())
}

/// Failures surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
enum ApiError {
    #[error("invalid file")]
    InvalidFile,
    #[error("invalid file: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{}: {0}", .0.stage())]
    Ingest(#[from] IngestError),
    #[error("{}: {0}", .0.stage())]
    Export(#[from] ExportError),
    #[error("worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidFile => StatusCode::BAD_REQUEST,
            Self::Multipart(err) => err.status(),
            Self::Ingest(err) => status_for(err.kind()),
            Self::Export(err) => status_for(err.kind()),
            Self::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const fn status_for(kind: FailureKind) -> StatusCode {
    if kind.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("request failed: {message}");
        } else {
            warn!("request rejected: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricebox_core::test_support::MemoryStore;
    use pricebox_core::{StoreError, StoreSource};
    use pricebox_data::archive::{DATA_MEMBER, package};
    use rstest::rstest;

    fn ingest_error(bytes: &[u8]) -> IngestError {
        ingest_archive(&MemoryStore::default(), bytes).expect_err("ingest should fail")
    }

    #[rstest]
    fn client_failures_map_to_bad_request() {
        let err = ApiError::from(ingest_error(b"not a zip"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("unpack: "), "message was {err}");
    }

    #[rstest]
    fn parse_failures_keep_stage_prefix() {
        let csv = "id,create_date,name,category,price\n1,2024-01-01,Lamp,A,abc\n";
        let bytes = package(DATA_MEMBER, csv.as_bytes()).expect("package");
        let err = ApiError::from(ingest_error(&bytes));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("parse: "), "message was {err}");
        assert!(err.to_string().contains("abc"), "message was {err}");
    }

    #[rstest]
    fn store_failures_map_to_server_error() {
        let source: StoreSource = Box::new(io::Error::other("disk full"));
        let err = ApiError::from(IngestError::from(StoreError::CommitFailed { source }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("persist: "), "message was {err}");
    }

    #[rstest]
    fn missing_file_is_bad_request() {
        let response = ApiError::InvalidFile.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
