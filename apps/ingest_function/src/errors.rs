// apps/ingest_function/src/errors.rs

use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use product_ingest::{IngestError, StoreError};
use thiserror::Error;

/// Body of every 400 response.
pub const INVALID_PRODUCT_DATA: &str = "Invalid product data.";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Ingest Error: {source}")]
  Ingest {
    #[from]
    source: IngestError,
  },

  #[error("Table Store Error: {0}")]
  Store(#[from] StoreError),

  #[error("Configuration Error: {0}")]
  Config(String),
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Ingest { source } if source.is_validation() => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    match self.status_code() {
      StatusCode::BAD_REQUEST => {
        // The caller's fault; not an application error.
        tracing::warn!(application_error = %self, "Responding with bad request");
        HttpResponse::BadRequest()
          .content_type(ContentType::plaintext())
          .body(INVALID_PRODUCT_DATA)
      }
      status => {
        // Details stay in the log; the caller gets a bare status.
        tracing::error!(application_error = %self, "Responding with error");
        HttpResponse::build(status).finish()
      }
    }
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
