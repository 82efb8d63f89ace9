use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use nfex_core::error::DocumentFailure;
use nfex_core::invoice::InvoiceParser;
use nfex_core::models::{InvoiceRecord, RawDocument};
use nfex_core::report::printable::{layout_table, render_pdf};
use nfex_core::report::store::ArtifactKind;
use nfex_core::report::{BatchResponse, PrintOptions};
use nfex_core::summary::summarize;

use super::errors::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    name: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Collect the uploaded files; form fields without a file name are ignored.
async fn read_documents(mut multipart: Multipart) -> Result<Vec<RawDocument>, ApiError> {
    let mut documents = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        documents.push(RawDocument::new(name, bytes.to_vec()));
    }
    Ok(documents)
}

/// Run blocking work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
}

fn attachment(kind: ArtifactKind, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn process_xml(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let mut documents = read_documents(multipart).await?;
    if documents.len() != 1 {
        return Err(ApiError::BadRequest(format!(
            "expected exactly one file, got {}",
            documents.len()
        )));
    }
    let document = documents.remove(0);

    let parser = Arc::clone(&state.parser);
    let record = blocking(move || {
        parser.parse(&document).map_err(|error| {
            ApiError::Document(DocumentFailure {
                source_name: document.name.clone(),
                error,
            })
        })
    })
    .await?;

    info!(source = %record.source_name, "processed single document");
    Ok(Json(record))
}

pub async fn process_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, ApiError> {
    let documents = read_documents(multipart).await?;
    if documents.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".to_string()));
    }

    let count = documents.len();
    let cancel = Arc::new(AtomicBool::new(false));
    let pipeline = Arc::clone(&state.pipeline);
    let worker_cancel = Arc::clone(&cancel);
    let work = blocking(move || Ok(pipeline.run_cancellable(&documents, &worker_cancel)?));

    match tokio::time::timeout(state.request_timeout, work).await {
        Ok(result) => {
            let run = result?;
            info!(documents = count, report = %run.saved.spreadsheet, "processed batch");
            Ok(Json(run.response))
        }
        Err(_) => {
            // The batch keeps running on the blocking pool; make sure it
            // does not save a report nobody will receive.
            cancel.store(true, Ordering::Release);
            warn!(documents = count, "batch request timed out");
            Err(ApiError::Timeout(state.request_timeout.as_secs()))
        }
    }
}

pub async fn download_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let store = state.pipeline.store().clone();
    let name = query.name.clone();
    let (bytes, kind) = blocking(move || Ok(store.read(&name)?)).await?;
    Ok(attachment(kind, &query.name, bytes))
}

pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summarizer = state.summarizer.clone().ok_or_else(|| {
        ApiError::Summary(nfex_core::error::SummaryError::NotConfigured(
            "no summary backend configured".to_string(),
        ))
    })?;

    let store = state.pipeline.store().clone();
    let name = query.name.clone();
    let table = blocking(move || Ok(store.load_table(&name)?)).await?;

    let text = summarize(summarizer.as_ref(), &table).await?;
    Ok(Json(json!({ "name": query.name, "summary": text })))
}

pub async fn report_pdf(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let store = state.pipeline.store().clone();
    let name = query.name.clone();
    let print_cap = state.print_cap;

    let (pdf_name, pdf) = blocking(move || {
        let table = store.load_table(&name)?;
        let options = PrintOptions::new(&name).with_cap(print_cap);
        let pdf = render_pdf(&layout_table(&table, &options))?;
        let pdf_name = store.save_pdf(&name, &pdf)?;
        Ok((pdf_name, pdf))
    })
    .await?;

    Ok(attachment(ArtifactKind::Pdf, &pdf_name, pdf))
}
