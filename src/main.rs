//! Vademecum - a legal-reference reader.
//!
//! This is the main entry point for the web server.
//! The application is organized into the following modules:
//!
//! - `sheets`: Article source backed by a spreadsheet
//! - `storage` / `store`: Key-value backends and the persisted annotation store
//! - `highlight`: Splitting article text into highlighted segments
//! - `explain`: Explanations, questions and annotation drafts from the model
//! - `speech`: Speech synthesis and playback
//! - `export`: PDF and spreadsheet exports
//! - `templates`: HTML/CSS/JS templates and rendering
//! - `handlers`: HTTP route handlers

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vademecum::{config::Config, handlers, AppState};

const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vademecum=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    if state.config.spreadsheet_id.is_empty() {
        tracing::warn!("VADEMECUM_SPREADSHEET_ID not set; articles cannot be loaded");
    }

    let app = Router::new()
        // Pages
        .route("/", get(handlers::index))
        .route("/search", get(handlers::search))
        .route("/browse", get(handlers::browse))
        .route("/favorites", get(handlers::favorites))
        .route("/article/{source}/{number}", get(handlers::view_article))
        // Annotation store
        .route("/api/article/{source}/{number}/favorite", post(handlers::toggle_favorite))
        .route("/api/article/{source}/{number}/annotation", post(handlers::save_annotation))
        .route("/api/article/{source}/{number}/highlights", post(handlers::add_highlight))
        .route(
            "/api/article/{source}/{number}/highlights/remove",
            post(handlers::remove_highlight),
        )
        .route("/api/article/{source}/{number}/images", post(handlers::add_image))
        .route(
            "/api/article/{source}/{number}/images/{index}/delete",
            post(handlers::remove_image),
        )
        .route("/api/article/{source}/{number}/audios", post(handlers::add_audio))
        .route(
            "/api/article/{source}/{number}/audios/{index}/delete",
            post(handlers::remove_audio),
        )
        // AI
        .route("/api/article/{source}/{number}/explanation", post(handlers::explain_article))
        .route("/api/article/{source}/{number}/question", post(handlers::ask_question))
        .route(
            "/api/article/{source}/{number}/annotation/auto",
            post(handlers::auto_annotate),
        )
        // Speech
        .route("/api/article/{source}/{number}/speech", post(handlers::play_article))
        .route("/api/speech/stop", post(handlers::stop_audio))
        // Export routes
        .route("/article/{source}/{number}/export.pdf", get(handlers::export_article_pdf))
        .route("/export/favorites.pdf", get(handlers::export_favorites_pdf))
        .route("/export/favorites.csv", get(handlers::export_favorites_csv))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Vademecum running at http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
    }
}
