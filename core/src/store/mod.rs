// core/src/store/mod.rs

//! Capabilities the ingest routine needs from a table store, plus the two
//! backends: the Azure Table REST client and an in-memory table used in tests.

pub mod azure;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::Product;

pub use azure::{AzureTableClient, StorageAccount};
pub use memory::InMemoryTableStore;

/// The narrow slice of a table store the ingest routine touches.
#[async_trait]
pub trait TableStore: Send + Sync {
  /// Creates the backing table if it does not exist yet. Idempotent.
  async fn ensure_table_exists(&self) -> StoreResult<()>;

  /// Returns every product in `partition_key`, following pagination to the end.
  async fn query_partition(&self, partition_key: &str) -> StoreResult<Vec<Product>>;

  /// Inserts a new product. Fails if the PartitionKey/RowKey pair is taken;
  /// this is never an upsert.
  async fn insert(&self, product: &Product) -> StoreResult<()>;
}

/// Current value of a named sequence together with its concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
  pub value: i32,
  pub etag: String,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
  Applied { etag: String },
  /// Someone else wrote first (entity exists on create, ETag mismatch on replace).
  Conflict,
}

/// Named integer sequences updated with optimistic concurrency.
#[async_trait]
pub trait SequenceStore: Send + Sync {
  async fn read_sequence(&self, name: &str) -> StoreResult<Option<SequenceRecord>>;

  /// Creates the sequence with `value`, or reports `Conflict` if it already exists.
  async fn create_sequence(&self, name: &str, value: i32) -> StoreResult<CasOutcome>;

  /// Sets the sequence to `value` only if its ETag still equals `etag`.
  async fn advance_sequence(&self, name: &str, value: i32, etag: &str) -> StoreResult<CasOutcome>;
}
