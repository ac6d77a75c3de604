// core/src/ingest.rs

//! The add-product routine: parse, key, number, insert.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::{IngestError, IngestResult, StoreResult};
use crate::id::{CounterAllocator, IdAllocator, IdStrategy, ScanAllocator};
use crate::model::{Product, ProductPayload};
use crate::store::{SequenceStore, TableStore};

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
  pub product: Product,
}

impl IngestReceipt {
  pub fn product_id(&self) -> i32 {
    self.product.product_id
  }

  /// Confirmation text returned to the caller.
  pub fn message(&self) -> String {
    format!(
      "Product {} added successfully with ProductId {}.",
      self.product.display_name(),
      self.product.product_id
    )
  }
}

/// Turns request bodies into product rows.
///
/// Holds the store and the id allocator for the lifetime of the process; one
/// instance serves all concurrent requests.
#[derive(Clone)]
pub struct ProductIngestService {
  store: Arc<dyn TableStore>,
  allocator: Arc<dyn IdAllocator>,
}

impl ProductIngestService {
  pub fn new(store: Arc<dyn TableStore>, allocator: Arc<dyn IdAllocator>) -> Self {
    ProductIngestService { store, allocator }
  }

  /// Wires the allocator for `strategy` onto a store that offers both capabilities.
  pub fn with_strategy<S>(store: Arc<S>, strategy: IdStrategy, max_attempts: u32) -> Self
  where
    S: TableStore + SequenceStore + 'static,
  {
    let table: Arc<dyn TableStore> = store.clone();
    let scan = ScanAllocator::new(table.clone());
    let allocator: Arc<dyn IdAllocator> = match strategy {
      IdStrategy::Scan => Arc::new(scan),
      IdStrategy::Counter => {
        let sequences: Arc<dyn SequenceStore> = store;
        Arc::new(CounterAllocator::new(sequences, scan, max_attempts))
      }
    };
    Self::new(table, allocator)
  }

  pub fn strategy(&self) -> IdStrategy {
    self.allocator.strategy()
  }

  pub async fn ensure_table_exists(&self) -> StoreResult<()> {
    self.store.ensure_table_exists().await
  }

  /// Adds one product from a raw request body.
  ///
  /// Nothing is written unless the body parses; at most one product row is
  /// written per call.
  #[instrument(name = "ingest::add_product", skip_all, fields(body_len = body.len(), strategy = %self.strategy()))]
  pub async fn ingest(&self, body: &[u8]) -> IngestResult<IngestReceipt> {
    info!("AddProductFunction processed a request for a product");

    let payload = match ProductPayload::parse(body) {
      Some(payload) => payload,
      None => {
        warn!("Rejected request: invalid product data.");
        return Err(IngestError::InvalidProductData);
      }
    };

    let mut product = Product::from_payload(payload);
    product.product_id = match self.allocator.next_id().await {
      Ok(id) => id,
      Err(e) => {
        error!(error = %e, "Failed to assign a ProductId.");
        return Err(e);
      }
    };

    if let Err(e) = self.store.insert(&product).await {
      error!("Failed to add product to table storage: {}", e);
      return Err(IngestError::Storage(e));
    }

    info!(
      product_id = product.product_id,
      row_key = %product.row_key,
      "Product added to table storage."
    );
    Ok(IngestReceipt { product })
  }
}
