// apps/ingest_function/src/state.rs
use product_ingest::ProductIngestService;
use std::sync::Arc;

/// Shared by every worker; the table client inside is built once per process.
#[derive(Clone)]
pub struct AppState {
  pub ingest: Arc<ProductIngestService>,
}
