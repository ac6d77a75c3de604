// apps/ingest_function/src/web/handlers/product_handlers.rs

use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;

/// `POST /api/AddProductFunction`: stores the product in the body and
/// confirms the ProductId it was given.
///
/// The body is taken raw; deciding what counts as a product is the ingest
/// service's job, so a malformed body still reaches it and becomes a 400.
#[instrument(name = "handler::add_product", skip(app_state, body), fields(body_len = body.len()))]
pub async fn add_product_handler(app_state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, AppError> {
  let receipt = app_state.ingest.ingest(&body).await?;

  info!(product_id = receipt.product_id(), "Product created.");
  Ok(
    HttpResponse::Ok()
      .content_type(ContentType::plaintext())
      .body(receipt.message()),
  )
}
