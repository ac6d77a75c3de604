// apps/ingest_function/src/config.rs

use crate::errors::{AppError, Result}; // Use AppError specific Result
use dotenvy::dotenv;
use product_ingest::{IdStrategy, DEFAULT_MAX_ATTEMPTS, DEFAULT_TABLE_NAME};
use std::env;
use std::fmt;

/// Name under which the Functions host exposes the storage connection string.
pub const STORAGE_CONNECTION_VAR: &str = "AzureWebJobsStorage";

#[derive(Clone)] // Clone is useful if parts of config are passed around
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub storage_connection_string: String,
  pub table_name: String,
  pub id_strategy: IdStrategy,
  pub id_max_attempts: u32,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|var_name| env::var(var_name).ok())
  }

  /// Builds the config from any variable source; `from_env` passes the process environment.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    // The Functions host tells a custom handler which port to listen on.
    let server_port = get_env("FUNCTIONS_CUSTOMHANDLER_PORT")
      .or_else(|_| get_env("SERVER_PORT"))
      .unwrap_or_else(|_| "8080".to_string())
      .trim()
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid listening port: {}", e)))?;
    let storage_connection_string = get_env(STORAGE_CONNECTION_VAR)?;
    let table_name = get_env("PRODUCTS_TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string());

    let id_strategy = match get_env("PRODUCT_ID_STRATEGY") {
      Ok(raw) => raw
        .parse::<IdStrategy>()
        .map_err(|e| AppError::Config(format!("Invalid PRODUCT_ID_STRATEGY: {}", e)))?,
      Err(_) => IdStrategy::default(),
    };
    let id_max_attempts = get_env("PRODUCT_ID_MAX_ATTEMPTS")
      .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
      .trim()
      .parse::<u32>()
      .map_err(|e| AppError::Config(format!("Invalid PRODUCT_ID_MAX_ATTEMPTS: {}", e)))?;
    if id_max_attempts == 0 {
      return Err(AppError::Config("PRODUCT_ID_MAX_ATTEMPTS must be at least 1".to_string()));
    }

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      storage_connection_string,
      table_name,
      id_strategy,
      id_max_attempts,
    })
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}

// The connection string carries the account key.
impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("storage_connection_string", &"[REDACTED]")
      .field("table_name", &self.table_name)
      .field("id_strategy", &self.id_strategy)
      .field("id_max_attempts", &self.id_max_attempts)
      .finish()
  }
}
