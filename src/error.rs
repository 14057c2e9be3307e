//! Error types for the vademecum server.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::templates::{base_html, html_escape};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration missing: {0}")]
    Config(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("stored value is not valid UTF-8 under key {0}")]
    Encoding(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Não encontrado", msg.clone()),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Requisição inválida", msg.clone())
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Serviço não configurado",
                    msg.clone(),
                )
            }
            AppError::Upstream(_) | AppError::Http(_) => {
                tracing::error!("Upstream error: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "Erro de comunicação",
                    "O serviço externo não respondeu. Tente novamente.".to_string(),
                )
            }
            _ => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno",
                    "Ocorreu um erro interno.".to_string(),
                )
            }
        };

        let body = format!(
            "<h1>{}</h1><p class=\"error\">{}</p><p><a href=\"/\">Voltar</a></p>",
            html_escape(title),
            html_escape(&message)
        );

        (status, Html(base_html(title, &body, None))).into_response()
    }
}
