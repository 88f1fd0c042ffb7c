use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    models::{AnalysisResult, UploadPreview},
    services::{
        analysis::perform_analysis,
        excel::{
            load_dataset, upload_preview,
            utils::{is_supported_spreadsheet, report_filename, SUPPORTED_EXTENSIONS},
        },
        report::ReportRenderer,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/api/upload-excel", post(upload_excel))
        .route("/api/analyze", post(analyze))
        .route("/api/generate-report", post(generate_report))
        .layer(cors)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    success: bool,
    filename: String,
    #[serde(flatten)]
    preview: UploadPreview,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    success: bool,
    filename: String,
    analysis: AnalysisResult,
}

struct Upload {
    filename: String,
    data: Bytes,
}

fn multipart_error(err: axum::extract::multipart::MultipartError, max: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(max)
    } else {
        AppError::InvalidInputFormat(err.body_text())
    }
}

/// Pulls the `file` field out of the form, checking its name and size.
async fn read_upload(mut multipart: Multipart, max_file_size: usize) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInputFormat("Uploaded file has no name".to_string()))?;

        if !is_supported_spreadsheet(&filename) {
            tracing::error!("Unsupported file type: {}", filename);
            return Err(AppError::InvalidInputFormat(format!(
                "Unsupported file '{}'. Expected one of: {}",
                filename,
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }

        let data = field.bytes().await.map_err(|e| multipart_error(e, max_file_size))?;
        if data.len() > max_file_size {
            return Err(AppError::PayloadTooLarge(max_file_size));
        }

        tracing::info!("Received {}: {}KB", filename, data.len() / 1024);
        return Ok(Upload { filename, data });
    }

    Err(AppError::InvalidInputFormat("No file provided".to_string()))
}

async fn upload_excel(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;

    let data = upload.data;
    let preview = tokio::task::spawn_blocking(move || -> Result<UploadPreview, AppError> {
        let dataset = load_dataset(&data)?;
        Ok(upload_preview(&dataset))
    })
    .await??;

    Ok(Json(UploadResponse {
        success: true,
        filename: upload.filename,
        preview,
    }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let start = std::time::Instant::now();
    let upload = read_upload(multipart, state.config.max_file_size).await?;

    let data = upload.data;
    let worker_state = Arc::clone(&state);
    let analysis = tokio::task::spawn_blocking(move || -> Result<AnalysisResult, AppError> {
        let dataset = load_dataset(&data)?;
        perform_analysis(&dataset, &worker_state.theme)
    })
    .await??;

    tracing::info!("Analysis of {} completed in {:?}", upload.filename, start.elapsed());

    Ok(Json(AnalyzeResponse {
        success: true,
        filename: upload.filename,
        analysis,
    }))
}

async fn generate_report(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let start = std::time::Instant::now();
    let upload = read_upload(multipart, state.config.max_file_size).await?;

    let data = upload.data;
    let display_name = upload.filename.clone();
    let worker_state = Arc::clone(&state);
    let report = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, AppError> {
        let dataset = load_dataset(&data)?;
        let analysis = perform_analysis(&dataset, &worker_state.theme)?;
        let renderer = ReportRenderer::new(&worker_state.config.staging_dir);
        Ok(renderer.render(&dataset, &analysis, &display_name)?.bytes)
    })
    .await??;

    tracing::info!("Report for {} generated in {:?}", upload.filename, start.elapsed());

    let attachment: String = report_filename(&upload.filename)
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
        .collect();
    let disposition = format!("attachment; filename=\"{}\"", attachment);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report,
    )
        .into_response())
}
