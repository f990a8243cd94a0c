use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::types::BetStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Stats service error: {0}")]
    StatsService(String),

    #[error("Roster feed error: {0}")]
    Roster(String),

    #[error("Reporting sink error: {0}")]
    Sink(String),

    #[error("Illegal status transition for bet {bet_id}: {from} -> {to}")]
    IllegalTransition {
        bet_id: i64,
        from: BetStatus,
        to: BetStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// A write hit a unique index, e.g. a bet corrected into a copy of another.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, AppError::Database(sqlx::Error::Database(e)) if e.is_unique_violation())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
