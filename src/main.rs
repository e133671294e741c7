// Main entry point: translate a sequence of manga pages and serve them to a viewer

use manga_translator::{
    build_http_client,
    core::{types::PageSnapshot, Config},
    orchestration::{PageLoader, PageSequence, RedrawHandle, RedrawObserver},
    services::{ResultStore, Services},
    utils::{ImageSource, Metrics},
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    sequence: Arc<Mutex<PageSequence>>,
    store: Arc<ResultStore>,
    metrics: Metrics,
    generation: watch::Receiver<u64>,
}

impl AppState {
    fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    fn page_view(&self, page: PageSnapshot, cursor: usize) -> PageView {
        PageView {
            generation: self.generation(),
            cursor,
            page,
        }
    }
}

/// One page plus the redraw generation it was read at
#[derive(Serialize)]
struct PageView {
    generation: u64,
    cursor: usize,
    #[serde(flatten)]
    page: PageSnapshot,
}

#[derive(Serialize)]
struct SequenceView {
    generation: u64,
    cursor: usize,
    prefetch_window: usize,
    pages: Vec<PageSnapshot>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::new().context("Failed to load configuration")?;

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "manga_translator={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let sources: Vec<ImageSource> = std::env::args().skip(1).map(|arg| ImageSource::parse(&arg)).collect();

    info!("=== MANGA TRANSLATOR ===");
    info!(
        "Config: pages={} prefetch={} timeout={}s cache={}",
        sources.len(),
        config.prefetch_window(),
        config.api_timeout().as_secs(),
        config.cache_dir()
    );

    let metrics = Metrics::new();

    // A store we cannot read is fatal before any page starts
    let store = Arc::new(
        ResultStore::open(config.cache_dir(), Some(metrics.clone()))
            .context("Failed to open result store")?,
    );

    let http_client = build_http_client(config.api_timeout()).context("Failed to build HTTP client")?;
    let services = Services::from_config(&config, http_client.clone());
    match &services {
        Ok(s) => info!("Translation service: {}", s.settings.service),
        Err(e) => warn!("Config problem, pages will fail until fixed: {}", e),
    }

    let (redraw, events) = RedrawHandle::channel();
    let observer = RedrawObserver::spawn(events);

    let loader = Arc::new(PageLoader::new(
        Arc::clone(&store),
        services,
        http_client,
        redraw,
        Some(metrics.clone()),
    ));
    let sequence = PageSequence::new(sources, loader, config.prefetch_window())
        .context("Usage: manga-translator <image path or URL>...")?;

    let state = AppState {
        sequence: Arc::new(Mutex::new(sequence)),
        store,
        metrics,
        generation: observer.generation(),
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/pages", get(list_pages))
        .route("/pages/current", get(current_page))
        .route("/pages/next", post(next_page))
        .route("/pages/prev", post(prev_page))
        .route("/pages/{index}", get(page_by_index))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                - Root endpoint");
    info!("  GET  /health          - Health check");
    info!("  GET  /pages           - All page snapshots");
    info!("  GET  /pages/current   - Page under the cursor");
    info!("  GET  /pages/{{index}}   - One page");
    info!("  POST /pages/next      - Advance the cursor (prefetches ahead)");
    info!("  POST /pages/prev      - Move the cursor back");
    info!("  GET  /metrics         - Prometheus metrics");
    info!("  GET  /stats           - Detailed statistics");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = async move { axum::serve(listener, app).await };

    tokio::select! {
        result = server => {
            result?;
        }
        fatal = observer.finished() => {
            if let Some(message) = fatal {
                error!("Shutting down: {}", message);
                anyhow::bail!("Result store failure: {}", message);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

async fn root() -> &'static str {
    "Manga Translator"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pages = state.sequence.lock().len();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "pages": pages,
    }))
}

async fn list_pages(State(state): State<AppState>) -> Json<SequenceView> {
    let generation = state.generation();
    let sequence = state.sequence.lock();
    Json(SequenceView {
        generation,
        cursor: sequence.cursor(),
        prefetch_window: sequence.window(),
        pages: sequence.snapshots(),
    })
}

async fn current_page(State(state): State<AppState>) -> Json<PageView> {
    let (snapshot, cursor) = {
        let sequence = state.sequence.lock();
        (sequence.current().snapshot(), sequence.cursor())
    };
    Json(state.page_view(snapshot, cursor))
}

async fn page_by_index(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<PageView>, (StatusCode, String)> {
    let (snapshot, cursor) = {
        let sequence = state.sequence.lock();
        let page = sequence.page(index).ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("No page {} (sequence has {})", index, sequence.len()),
            )
        })?;
        (page.snapshot(), sequence.cursor())
    };
    Ok(Json(state.page_view(snapshot, cursor)))
}

async fn next_page(State(state): State<AppState>) -> Json<PageView> {
    let (snapshot, cursor) = {
        let mut sequence = state.sequence.lock();
        if !sequence.advance() {
            info!("Already at the last page");
        }
        (sequence.current().snapshot(), sequence.cursor())
    };
    Json(state.page_view(snapshot, cursor))
}

async fn prev_page(State(state): State<AppState>) -> Json<PageView> {
    let (snapshot, cursor) = {
        let mut sequence = state.sequence.lock();
        if !sequence.retreat() {
            info!("Already at the first page");
        }
        (sequence.current().snapshot(), sequence.cursor())
    };
    Json(state.page_view(snapshot, cursor))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let store = Arc::clone(&state.store);
    let store_stats = tokio::task::spawn_blocking(move || store.stats())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Stats task failed: {}", e)))?
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Result store error: {}", e)))?;

    let cursor = state.sequence.lock().cursor();
    Ok(Json(serde_json::json!({
        "generation": state.generation(),
        "cursor": cursor,
        "store": store_stats,
        "metrics": state.metrics.snapshot(),
    })))
}
