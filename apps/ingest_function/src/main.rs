// apps/ingest_function/src/main.rs

// Declare modules for the application
mod config;
mod errors;
mod state;
mod web;

use crate::config::AppConfig;
use crate::errors::Result as AppResult; // Use the app's Result alias
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer}; // Renamed web to actix_data
use product_ingest::{AzureTableClient, ProductIngestService};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing

// Main function
#[actix_web::main]
async fn main() -> std::io::Result<()> {
  init_tracing();

  tracing::info!("Starting product ingest function handler...");

  // Load application configuration
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };
  tracing::debug!(config = ?app_config, "Loaded config details");

  // Table client is built once and shared by every worker
  let app_state = match build_state(&app_config).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise table storage.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };
  let app_data = actix_data::Data::new(app_state);

  // Configure and Start Actix Web Server
  let server_address = app_config.server_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(app_data.clone()) // Share AppState with handlers
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}

// Initialize tracing subscriber for logging. LOG_FORMAT=json switches to
// structured output for log collectors; RUST_LOG overrides the level.
fn init_tracing() {
  let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO) // Default level
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

async fn build_state(config: &AppConfig) -> AppResult<AppState> {
  let client = Arc::new(AzureTableClient::from_connection_string(
    &config.storage_connection_string,
    config.table_name.as_str(),
  )?);
  tracing::info!(
    account = client.account_name(),
    table = client.table_name(),
    "Connecting to table storage."
  );

  let ingest = ProductIngestService::with_strategy(client, config.id_strategy, config.id_max_attempts);
  ingest.ensure_table_exists().await?;
  tracing::info!(strategy = %ingest.strategy(), "Table storage ready.");

  Ok(AppState {
    ingest: Arc::new(ingest),
  })
}
