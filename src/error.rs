use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::query::{ParseSortError, SpecError};
use crate::trade::TradeError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Indexer error: {0}")]
    Indexer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Trade rejected: {0}")]
    Trade(#[from] TradeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<SpecError> for AppError {
    fn from(e: SpecError) -> Self {
        AppError::InvalidQuery(e.to_string())
    }
}

impl From<ParseSortError> for AppError {
    fn from(e: ParseSortError) -> Self {
        AppError::InvalidQuery(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidQuery(_) | AppError::Trade(TradeError::InvalidPrice(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Trade(_) => StatusCode::CONFLICT,
            AppError::Http(_) | AppError::Indexer(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
