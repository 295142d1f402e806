//! Card Extractor - business card OCR and contact extraction server.

mod config;
mod extractor;
mod name;
mod ner;
mod ocr;
mod pipeline;
mod preprocess;
mod schema;
mod spreadsheet;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config::{AppConfig, ExtractionRules};
use extractor::FieldExtractor;
use ner::{DisabledEntityRecognizer, EntityRecognizer, SidecarEntityRecognizer};
use ocr::sidecar::SidecarRecognizer;
use ocr::TextRecognizer;
use pipeline::Pipeline;
use schema::ImageOutcome;
use spreadsheet::SpreadsheetStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Multipart field carrying the uploaded card images.
const IMAGES_FIELD: &str = "images";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "card_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let rules = ExtractionRules::load(config.rules_path.as_deref())?;

    // Model clients are created once and shared read-only
    let client = reqwest::Client::new();
    let recognizer: Arc<dyn TextRecognizer> =
        Arc::new(SidecarRecognizer::new(client.clone(), &config.ocr_url));
    info!("OCR sidecar: {}", config.ocr_url);

    let entities: Arc<dyn EntityRecognizer> = match &config.ner_url {
        Some(url) => {
            info!("NER sidecar: {}", url);
            Arc::new(SidecarEntityRecognizer::new(client.clone(), url))
        }
        None => {
            info!("NER_URL not set, address detection uses keywords only");
            Arc::new(DisabledEntityRecognizer)
        }
    };

    let store = SpreadsheetStore::new(&config.spreadsheet_path);
    info!("Spreadsheet: {:?}", store.path());

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(
            recognizer,
            entities,
            FieldExtractor::new(rules),
            store,
        )),
    };

    let app = build_router(state, config.max_upload_bytes);

    // Run server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ocr", post(extract_cards))
        .route("/download-excel", get(download_spreadsheet))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Upload page.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Run every uploaded card through the pipeline, one at a time.
async fn extract_cards(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ImageOutcome>>, (StatusCode, Json<ErrorBody>)> {
    let mut multipart = multipart.map_err(|e| bad_request(format!("Multipart error: {}", e)))?;

    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file: {}", e)))?;

        // Browsers send an empty part when no file was chosen
        if filename.is_empty() && data.is_empty() {
            continue;
        }
        uploads.push((filename, data));
    }

    if uploads.is_empty() {
        return Err(bad_request("No image files provided"));
    }

    info!("Received {} image(s)", uploads.len());
    let mut results = Vec::with_capacity(uploads.len());
    for (filename, data) in &uploads {
        results.push(state.pipeline.process(filename, data).await);
    }

    let ok = results.iter().filter(|r| r.is_processed()).count();
    info!("Batch complete: {}/{} processed", ok, results.len());
    Ok(Json(results))
}

/// Download the accumulated spreadsheet.
async fn download_spreadsheet(State(state): State<AppState>) -> Response {
    let store = state.pipeline.store();
    match store.read_bytes().await {
        Ok(Some(bytes)) => {
            let disposition = format!("attachment; filename=\"{}\"", store.file_name());
            (
                [
                    (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Excel file not found").into_response(),
        Err(e) => {
            error!("Failed to read {:?}: {}", store.path(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read Excel file").into_response()
        }
    }
}
