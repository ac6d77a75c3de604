// core/src/id/scan.rs

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{successor, IdAllocator, IdStrategy};
use crate::error::{IngestError, IngestResult, StoreResult};
use crate::model::PRODUCTS_PARTITION_KEY;
use crate::store::TableStore;

/// Reads the whole product partition and returns its highest ProductId plus one.
///
/// Offers no protection against two requests reading the same maximum.
#[derive(Clone)]
pub struct ScanAllocator {
  store: Arc<dyn TableStore>,
}

impl ScanAllocator {
  pub fn new(store: Arc<dyn TableStore>) -> Self {
    ScanAllocator { store }
  }

  /// Highest ProductId currently stored, or zero for an empty partition.
  #[instrument(name = "id::scan_current_max", skip(self))]
  pub async fn current_max(&self) -> StoreResult<i32> {
    let products = self.store.query_partition(PRODUCTS_PARTITION_KEY).await?;
    let max = products.iter().map(|p| p.product_id).max().unwrap_or(0);
    debug!(scanned = products.len(), max, "Scanned product partition.");
    Ok(max)
  }
}

#[async_trait]
impl IdAllocator for ScanAllocator {
  async fn next_id(&self) -> IngestResult<i32> {
    let max = self.current_max().await.map_err(IngestError::Allocation)?;
    successor(max)
  }

  fn strategy(&self) -> IdStrategy {
    IdStrategy::Scan
  }
}
