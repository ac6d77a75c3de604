// core/src/lib.rs

//! Product ingestion into Azure Table Storage.
//!
//! A request body becomes one row in the products table:
//!  - the body is parsed into a [`ProductPayload`]; anything else is rejected,
//!  - the row gets the fixed partition key and a fresh UUID row key,
//!  - a ProductId is assigned by an [`IdAllocator`] (partition scan or an
//!    ETag-guarded counter),
//!  - the row is inserted through a [`TableStore`].
//!
//! [`AzureTableClient`] talks to the real service; [`InMemoryTableStore`]
//! stands in for it in tests.

pub mod error;
pub mod id;
pub mod ingest;
pub mod model;
pub mod store;

pub use crate::error::{IngestError, IngestResult, StoreError, StoreResult};
pub use crate::id::{CounterAllocator, IdAllocator, IdStrategy, ScanAllocator, DEFAULT_MAX_ATTEMPTS};
pub use crate::ingest::{IngestReceipt, ProductIngestService};
pub use crate::model::{
  Product, ProductPayload, DEFAULT_TABLE_NAME, PRODUCTS_PARTITION_KEY, PRODUCT_ID_SEQUENCE, SEQUENCE_PARTITION_KEY,
};
pub use crate::store::{
  AzureTableClient, CasOutcome, InMemoryTableStore, SequenceRecord, SequenceStore, StorageAccount, TableStore,
};
