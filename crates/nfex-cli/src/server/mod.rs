//! HTTP adapter over the report pipeline.

mod errors;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use nfex_core::invoice::NfeParser;
use nfex_core::models::NfexConfig;
use nfex_core::summary::NarrativeSummarizer;
use nfex_core::Pipeline;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    parser: Arc<NfeParser>,
    pipeline: Arc<Pipeline>,
    summarizer: Option<Arc<dyn NarrativeSummarizer>>,
    print_cap: usize,
    request_timeout: Duration,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &NfexConfig) -> Self {
        Self {
            parser: Arc::new(NfeParser::from_config(&config.extraction)),
            pipeline: Arc::new(Pipeline::from_config(config)),
            summarizer: None,
            print_cap: config.report.print_cap,
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn NarrativeSummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(routes::health))
        .route("/process-xml", post(routes::process_xml))
        .route("/process-batch", post(routes::process_batch))
        .route("/download-report", get(routes::download_report))
        .route("/summary", get(routes::summary))
        .route("/report-pdf", get(routes::report_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use nfex_core::error::SummaryError;
    use nfex_core::summary::SummaryPrompt;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "nfex-test-boundary";

    fn nfe(issuer: &str, total: &str, icms: &str) -> String {
        format!(
            "<nfeProc><NFe><infNFe><emit><CNPJ>11222333000181</CNPJ><xNome>{issuer}</xNome></emit>\
             <total><ICMSTot><vNF>{total}</vNF><vICMS>{icms}</vICMS></ICMSTot></total></infNFe></NFe></nfeProc>"
        )
    }

    fn multipart(files: &[(&str, String)]) -> Request<Body> {
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: text/xml\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::post("/process-batch")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn state(dir: &TempDir) -> AppState {
        let mut config = NfexConfig::default();
        config.report.output_dir = dir.path().to_path_buf();
        AppState::new(&config)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    struct Fixed;

    #[async_trait]
    impl NarrativeSummarizer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &SummaryPrompt) -> Result<String, SummaryError> {
            Ok("Resumo de teste.".to_string())
        }
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(router(state(&dir)), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn test_process_batch_and_download() {
        let dir = TempDir::new().unwrap();
        let app = router(state(&dir));

        let request = multipart(&[
            ("beta.xml", nfe("Beta", "50.00", "9.00")),
            ("acme.xml", nfe("Acme", "100.00", "18.00")),
        ]);
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);

        let response = json(&body);
        assert_eq!(response["count"], 2);
        assert_eq!(response["invoice_sum"], "150.00");
        assert_eq!(response["tax_sum"], "27.00");

        let name = response["table_file_reference"].as_str().unwrap().to_string();
        let request = Request::get(format!("/download-report?name={name}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_batch_field_error_is_unprocessable() {
        let dir = TempDir::new().unwrap();
        let broken = nfe("Acme", "1.00", "0").replace("<vICMS>0</vICMS>", "");
        let request = multipart(&[("sem-icms.xml", broken)]);

        let (status, body) = send(router(state(&dir)), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let error = json(&body);
        assert_eq!(error["error"], "field_extraction_error");
        assert_eq!(error["source_name"], "sem-icms.xml");
        assert_eq!(error["field"], "tax_total");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_process_xml() {
        let dir = TempDir::new().unwrap();
        let mut request = multipart(&[("nota.xml", nfe("Acme", "100.00", "18.00"))]);
        *request.uri_mut() = "/process-xml".parse().unwrap();

        let (status, body) = send(router(state(&dir)), request).await;
        assert_eq!(status, StatusCode::OK);
        let record = json(&body);
        assert_eq!(record["issuer_name"], "Acme");
        assert_eq!(record["tax_total"], "18.00");
    }

    #[tokio::test]
    async fn test_unknown_report_is_not_found() {
        let dir = TempDir::new().unwrap();
        for uri in [
            "/download-report?name=relatorio_nfes_1.xlsx",
            "/download-report?name=..%2Fsecret.xlsx",
            "/report-pdf?name=relatorio_nfes_1.xlsx",
        ] {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            let (status, body) = send(router(state(&dir)), request).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(json(&body)["error"], "report_not_found");
        }
    }

    #[tokio::test]
    async fn test_summary_and_pdf_of_saved_report() {
        let dir = TempDir::new().unwrap();
        let app = router(state(&dir).with_summarizer(Arc::new(Fixed)));

        let (_, body) = send(app.clone(), multipart(&[("a.xml", nfe("Acme", "1.00", "0.18"))])).await;
        let name = json(&body)["table_file_reference"].as_str().unwrap().to_string();

        let request = Request::get(format!("/summary?name={name}")).body(Body::empty()).unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["summary"], "Resumo de teste.");

        let request = Request::get(format!("/report-pdf?name={name}")).body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_summary_without_backend() {
        let dir = TempDir::new().unwrap();
        let request = Request::get("/summary?name=relatorio_nfes_1.xlsx").body(Body::empty()).unwrap();
        let (status, body) = send(router(state(&dir)), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(&body)["error"], "summary_unavailable");
    }

    #[tokio::test]
    async fn test_empty_upload() {
        let dir = TempDir::new().unwrap();
        let (status, _) = send(router(state(&dir)), multipart(&[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
