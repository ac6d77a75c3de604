// core/src/error.rs
use thiserror::Error;

/// Errors raised by a table store backend.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Table service request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Table service returned {status} ({code}): {message}")]
  Status {
    status: u16,
    code: String,
    message: String,
  },

  #[error("Entity (de)serialization failed: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Invalid storage connection string: {0}")]
  InvalidConnectionString(String),

  #[error("Invalid storage account key: {0}")]
  InvalidKey(String),

  #[error("Cannot build table service request: {0}")]
  InvalidRequest(String),

  #[error("Entity already exists: PartitionKey '{partition_key}', RowKey '{row_key}'")]
  EntityAlreadyExists { partition_key: String, row_key: String },

  // Used by the in-memory store when a failure has been injected.
  #[error("Store unavailable: {0}")]
  Unavailable(String),
}

impl StoreError {
  pub fn status(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
    StoreError::Status {
      status,
      code: code.into(),
      message: message.into(),
    }
  }

  pub fn connection_string(msg: impl Into<String>) -> Self {
    StoreError::InvalidConnectionString(msg.into())
  }
}

/// Failure of a single ingest invocation.
#[derive(Debug, Error)]
pub enum IngestError {
  /// The request body did not deserialize into a product object.
  #[error("Invalid product data.")]
  InvalidProductData,

  #[error("Failed to determine the next ProductId: {0}")]
  Allocation(#[source] StoreError),

  #[error("ProductId space exhausted (current maximum {current_max})")]
  IdSpaceExhausted { current_max: i32 },

  #[error("Gave up assigning a ProductId after {attempts} conflicting attempts")]
  ContentionExhausted { attempts: u32 },

  #[error("Failed to add product to table storage: {0}")]
  Storage(#[source] StoreError),
}

impl IngestError {
  /// Whether the caller is at fault (client error) rather than the store.
  pub fn is_validation(&self) -> bool {
    matches!(self, IngestError::InvalidProductData)
  }
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
pub type IngestResult<T, E = IngestError> = std::result::Result<T, E>;
