// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use product_ingest::{
  CasOutcome, InMemoryTableStore, Product, ProductPayload, SequenceRecord, SequenceStore, StoreResult, TableStore,
  PRODUCTS_PARTITION_KEY,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Fixtures ---

pub const WIDGET_BODY: &[u8] = br#"{"ProductName":"Widget","Price":9.99,"StockQuantity":10}"#;

/// A product already sitting in the products partition with `product_id`.
pub fn existing_product(product_id: i32, name: &str) -> Product {
  let mut product = Product::from_payload(ProductPayload {
    product_name: Some(name.to_string()),
    ..Default::default()
  });
  product.product_id = product_id;
  product
}

pub fn product_ids(store: &InMemoryTableStore) -> Vec<i32> {
  let mut ids: Vec<i32> = store
    .products()
    .into_iter()
    .filter(|p| p.partition_key == PRODUCTS_PARTITION_KEY)
    .map(|p| p.product_id)
    .collect();
  ids.sort_unstable();
  ids
}

// --- Store wrapper that forces requests to overlap ---

/// Delegates to an in-memory table but holds the first `overlap` partition
/// scans at a barrier until all of them have arrived, so every one of those
/// requests reads the partition before any of them writes.
pub struct OverlappingScanStore {
  pub inner: Arc<InMemoryTableStore>,
  barrier: Barrier,
  overlap: usize,
  scans: AtomicUsize,
}

impl OverlappingScanStore {
  pub fn new(inner: Arc<InMemoryTableStore>, overlap: usize) -> Self {
    OverlappingScanStore {
      inner,
      barrier: Barrier::new(overlap),
      overlap,
      scans: AtomicUsize::new(0),
    }
  }
}

#[async_trait]
impl TableStore for OverlappingScanStore {
  async fn ensure_table_exists(&self) -> StoreResult<()> {
    self.inner.ensure_table_exists().await
  }

  async fn query_partition(&self, partition_key: &str) -> StoreResult<Vec<Product>> {
    let result = self.inner.query_partition(partition_key).await;
    if self.scans.fetch_add(1, Ordering::SeqCst) < self.overlap {
      self.barrier.wait().await;
    }
    result
  }

  async fn insert(&self, product: &Product) -> StoreResult<()> {
    self.inner.insert(product).await
  }
}

#[async_trait]
impl SequenceStore for OverlappingScanStore {
  async fn read_sequence(&self, name: &str) -> StoreResult<Option<SequenceRecord>> {
    self.inner.read_sequence(name).await
  }

  async fn create_sequence(&self, name: &str, value: i32) -> StoreResult<CasOutcome> {
    self.inner.create_sequence(name, value).await
  }

  async fn advance_sequence(&self, name: &str, value: i32, etag: &str) -> StoreResult<CasOutcome> {
    self.inner.advance_sequence(name, value, etag).await
  }
}
