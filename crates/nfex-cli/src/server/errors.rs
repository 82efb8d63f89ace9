use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use nfex_core::error::{BatchError, DocumentFailure, NfexError, ReportIoError, SummaryError};

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Document(DocumentFailure),
    Batch(BatchError),
    Report(ReportIoError),
    Summary(SummaryError),
    Upload(MultipartError),
    BadRequest(String),
    Timeout(u64),
    Internal(String),
}

impl From<NfexError> for ApiError {
    fn from(err: NfexError) -> Self {
        match err {
            NfexError::Document(failure) => ApiError::Document(failure),
            NfexError::Batch(e) => ApiError::Batch(e),
            NfexError::ReportIo(e) => ApiError::Report(e),
            NfexError::Summary(e) => ApiError::Summary(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ReportIoError> for ApiError {
    fn from(err: ReportIoError) -> Self {
        ApiError::Report(err)
    }
}

impl From<SummaryError> for ApiError {
    fn from(err: SummaryError) -> Self {
        ApiError::Summary(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload(err)
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn document_error(failure: &DocumentFailure) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        axum::Json(json!({
            "error": failure.error.kind(),
            "message": failure.to_string(),
            "source_name": failure.source_name,
            "field": failure.error.field().map(|f| f.name()),
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Document(failure) => document_error(&failure),
            ApiError::Batch(BatchError::Aborted(failure)) => document_error(&failure),
            ApiError::Batch(BatchError::TotalsOverflow { source_name }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                axum::Json(json!({
                    "error": "totals_overflow",
                    "message": format!("batch totals overflow when adding {source_name}"),
                    "source_name": source_name,
                })),
            )
                .into_response(),
            ApiError::Report(e) if e.is_not_found() => {
                json_error(StatusCode::NOT_FOUND, "report_not_found", e.to_string())
            }
            ApiError::Report(e) => {
                error!("report I/O failed: {e}");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "report_io_error", e.to_string())
            }
            ApiError::Summary(e @ SummaryError::NotConfigured(_)) => {
                json_error(StatusCode::SERVICE_UNAVAILABLE, "summary_unavailable", e.to_string())
            }
            ApiError::Summary(e @ SummaryError::Overflow(_)) => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, "totals_overflow", e.to_string())
            }
            ApiError::Summary(e) => {
                warn!("summary backend failed: {e}");
                json_error(StatusCode::BAD_GATEWAY, "summary_error", e.to_string())
            }
            ApiError::Upload(e) => json_error(e.status(), "invalid_upload", e.body_text()),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Timeout(secs) => json_error(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("request did not finish within {secs}s"),
            ),
            ApiError::Internal(msg) => {
                error!("{msg}");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}
