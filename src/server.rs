use crate::config::{AppConfig, LocalStorage};
use crate::core::exporter::{self, ExportFormat};
use crate::core::orchestrator::ValidationOrchestrator;
use crate::domain::model::{Record, ResultSet, ServiceType};
use crate::domain::ports::Storage;
use crate::utils::error::{ErrorCategory, LeadCheckError, Result};
use crate::utils::validation::{validate_upload_extension, UPLOAD_EXTENSIONS};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use hyper::Server;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: LocalStorage,
    upload_seq: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let storage = LocalStorage::new(config.server.upload_dir.clone());
        Self {
            config: Arc::new(config),
            storage,
            upload_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 每個請求一個不重複的暫存檔名，同名上傳不會互相覆蓋
    fn upload_name(&self, filename: &str) -> String {
        format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            self.upload_seq.fetch_add(1, Ordering::Relaxed),
            sanitize_filename(filename)
        )
    }
}

struct UploadedFile {
    filename: String,
    data: Bytes,
}

#[derive(Default)]
struct ValidateForm {
    file: Option<UploadedFile>,
    service_type: Option<String>,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "leadcheck",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

fn error_response(e: &LeadCheckError) -> Response {
    if e.is_batch_fatal() {
        tracing::warn!("❌ Rejected upload: {}", e);
        return bad_request(e.to_string());
    }
    if e.category() == ErrorCategory::Input {
        tracing::warn!("Rejected request: {}", e);
        return bad_request(e.to_string());
    }

    tracing::error!(
        "❌ Validation error: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "message": e.to_string(),
        })),
    )
        .into_response()
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> LeadCheckError {
    LeadCheckError::InvalidRequest {
        message: format!("Invalid upload: {}", e),
    }
}

async fn read_form(mut multipart: Multipart) -> Result<ValidateForm> {
    let mut form = ValidateForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                form.file = Some(UploadedFile { filename, data });
            }
            "serviceType" => {
                form.service_type = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// 只保留檔名本身，並把可疑字元換成底線
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

async fn validate_tokens(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(&e),
    };

    let Some(file) = form.file else {
        return bad_request("No file uploaded");
    };
    if let Err(e) = validate_upload_extension(&file.filename, UPLOAD_EXTENSIONS) {
        return error_response(&e);
    }

    let service_type = match form
        .service_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        None => return bad_request("Service type is required"),
        Some(raw) => match raw.parse::<ServiceType>() {
            Ok(service_type) => service_type,
            Err(message) => return bad_request(message),
        },
    };

    tracing::info!(
        "📥 Received {} ({} bytes) for {} validation",
        file.filename,
        file.data.len(),
        service_type
    );

    match run_validation(&state, service_type, file).await {
        Ok(result) => {
            let summary = result.summary();
            tracing::info!(
                "✅ Validation finished: total={}, valid={}, invalid={}",
                summary.total,
                summary.valid,
                summary.invalid
            );
            Json(json!({
                "success": true,
                "results": result.rows(),
                "total": summary.total,
                "valid": summary.valid,
                "invalid": summary.invalid,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Stores the upload, validates it, and removes the stored copy whatever the outcome.
async fn run_validation(
    state: &AppState,
    service_type: ServiceType,
    file: UploadedFile,
) -> Result<ResultSet> {
    let stored_name = state.upload_name(&file.filename);
    state.storage.write_file(&stored_name, &file.data).await?;

    let result = validate_stored(state, service_type, &stored_name, &file.filename).await;

    if let Err(e) = state.storage.remove_file(&stored_name).await {
        tracing::warn!("Could not remove upload {}: {}", stored_name, e);
    }
    result
}

async fn validate_stored(
    state: &AppState,
    service_type: ServiceType,
    stored_name: &str,
    original_name: &str,
) -> Result<ResultSet> {
    let bytes = state.storage.read_file(stored_name).await?;
    let orchestrator = ValidationOrchestrator::for_service(service_type, state.config.as_ref())?;
    orchestrator.validate_bytes(&bytes, original_name).await
}

async fn download_results(payload: std::result::Result<Json<Value>, JsonRejection>) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::warn!("Rejected download request: {}", rejection);
            return bad_request("No results data provided");
        }
    };

    let Some(results) = body.get("results").filter(|r| r.is_array()) else {
        return bad_request("No results data provided");
    };

    let format = match body
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("csv")
        .parse::<ExportFormat>()
    {
        Ok(format) => format,
        Err(message) => return bad_request(message),
    };

    match render_export(results, format) {
        Ok(bytes) => {
            let disposition = format!("attachment; filename=\"{}\"", format.file_name());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("❌ Download error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error generating download file" })),
            )
                .into_response()
        }
    }
}

fn render_export(results: &Value, format: ExportFormat) -> Result<Vec<u8>> {
    let records: Vec<Record> = serde_json::from_value(results.clone())?;
    exporter::export(&records, format)
}

/// Create the HTTP router with API routes, CORS and the optional SPA build.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/validate-tokens", post(validate_tokens))
        .route("/api/download-results", post(download_results))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes));

    if let Some(static_dir) = &state.config.server.static_dir {
        let index = Path::new(static_dir).join("index.html");
        router = router
            .fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index)));
    }

    router
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    tracing::info!("📂 Uploads are staged in {}", state.storage.base_path());
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let to_io = |e: hyper::Error| LeadCheckError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e));

    tracing::info!("🚀 HTTP server running on http://localhost:{}", port);
    tracing::info!("💚 Health check: http://localhost:{}/health", port);

    Server::try_bind(&addr)
        .map_err(to_io)?
        .serve(app.into_make_service())
        .await
        .map_err(to_io)?;

    Ok(())
}
