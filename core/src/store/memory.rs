// core/src/store/memory.rs

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use super::{CasOutcome, SequenceRecord, SequenceStore, TableStore};
use crate::error::{StoreError, StoreResult};
use crate::model::Product;

/// A table held in process memory.
///
/// Behaves like the real table for the operations the ingest routine uses
/// (insert-only writes, ETag-guarded sequences) and lets tests inject failures.
///
/// Lock guards are never held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
  table_created: AtomicBool,
  rows: RwLock<BTreeMap<(String, String), Product>>,
  sequences: RwLock<HashMap<String, SequenceRecord>>,
  etag_counter: AtomicU64,
  insert_calls: AtomicUsize,
  query_calls: AtomicUsize,
  fail_inserts: AtomicBool,
  fail_queries: AtomicBool,
  forced_sequence_conflicts: AtomicUsize,
}

impl InMemoryTableStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a store already holding `products`, as if written earlier.
  pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
    let store = Self::new();
    store.table_created.store(true, Ordering::SeqCst);
    {
      let mut rows = store.rows.write();
      for product in products {
        rows.insert((product.partition_key.clone(), product.row_key.clone()), product);
      }
    }
    store
  }

  pub fn table_exists(&self) -> bool {
    self.table_created.load(Ordering::SeqCst)
  }

  /// Snapshot of all rows, ordered by PartitionKey then RowKey.
  pub fn products(&self) -> Vec<Product> {
    self.rows.read().values().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.rows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.read().is_empty()
  }

  /// Number of insert attempts seen, including failed ones.
  pub fn insert_calls(&self) -> usize {
    self.insert_calls.load(Ordering::SeqCst)
  }

  pub fn query_calls(&self) -> usize {
    self.query_calls.load(Ordering::SeqCst)
  }

  pub fn fail_inserts(&self, fail: bool) {
    self.fail_inserts.store(fail, Ordering::SeqCst);
  }

  pub fn fail_queries(&self, fail: bool) {
    self.fail_queries.store(fail, Ordering::SeqCst);
  }

  /// Makes the next `count` sequence writes report `Conflict` without applying.
  pub fn force_sequence_conflicts(&self, count: usize) {
    self.forced_sequence_conflicts.store(count, Ordering::SeqCst);
  }

  pub fn sequence_value(&self, name: &str) -> Option<i32> {
    self.sequences.read().get(name).map(|record| record.value)
  }

  fn next_etag(&self) -> String {
    let version = self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1;
    format!("W/\"{}\"", version)
  }

  fn take_forced_conflict(&self) -> bool {
    self
      .forced_sequence_conflicts
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
  }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
  async fn ensure_table_exists(&self) -> StoreResult<()> {
    self.table_created.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn query_partition(&self, partition_key: &str) -> StoreResult<Vec<Product>> {
    self.query_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_queries.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("injected query failure".to_string()));
    }
    let rows = self.rows.read();
    Ok(
      rows
        .iter()
        .filter(|((pk, _), _)| pk == partition_key)
        .map(|(_, product)| product.clone())
        .collect(),
    )
  }

  async fn insert(&self, product: &Product) -> StoreResult<()> {
    self.insert_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_inserts.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("injected insert failure".to_string()));
    }

    let key = (product.partition_key.clone(), product.row_key.clone());
    let etag = self.next_etag();
    let mut rows = self.rows.write();
    if rows.contains_key(&key) {
      return Err(StoreError::EntityAlreadyExists {
        partition_key: key.0,
        row_key: key.1,
      });
    }
    let mut stored = product.clone();
    stored.etag = Some(etag);
    stored.timestamp = Some(Utc::now());
    rows.insert(key, stored);
    Ok(())
  }
}

#[async_trait]
impl SequenceStore for InMemoryTableStore {
  async fn read_sequence(&self, name: &str) -> StoreResult<Option<SequenceRecord>> {
    Ok(self.sequences.read().get(name).cloned())
  }

  async fn create_sequence(&self, name: &str, value: i32) -> StoreResult<CasOutcome> {
    if self.take_forced_conflict() {
      return Ok(CasOutcome::Conflict);
    }
    let etag = self.next_etag();
    let mut sequences = self.sequences.write();
    if sequences.contains_key(name) {
      return Ok(CasOutcome::Conflict);
    }
    sequences.insert(
      name.to_string(),
      SequenceRecord {
        value,
        etag: etag.clone(),
      },
    );
    Ok(CasOutcome::Applied { etag })
  }

  async fn advance_sequence(&self, name: &str, value: i32, etag: &str) -> StoreResult<CasOutcome> {
    if self.take_forced_conflict() {
      return Ok(CasOutcome::Conflict);
    }
    let new_etag = self.next_etag();
    let mut sequences = self.sequences.write();
    match sequences.get_mut(name) {
      Some(record) if record.etag == etag => {
        record.value = value;
        record.etag = new_etag.clone();
        Ok(CasOutcome::Applied { etag: new_etag })
      }
      _ => Ok(CasOutcome::Conflict),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{ProductPayload, PRODUCTS_PARTITION_KEY};

  #[tokio::test]
  async fn insert_rejects_duplicate_keys() {
    let store = InMemoryTableStore::new();
    let product = Product::from_payload(ProductPayload::default());
    store.insert(&product).await.expect("first insert");
    let err = store.insert(&product).await.expect_err("duplicate insert must fail");
    assert!(matches!(err, StoreError::EntityAlreadyExists { .. }));
    assert_eq!(store.len(), 1);
    assert_eq!(store.insert_calls(), 2);
  }

  #[tokio::test]
  async fn query_only_returns_requested_partition() {
    let mut other = Product::from_payload(ProductPayload::default());
    other.partition_key = "Elsewhere".to_string();
    let mine = Product::from_payload(ProductPayload::default());
    let store = InMemoryTableStore::with_products([other, mine.clone()]);

    let found = store.query_partition(PRODUCTS_PARTITION_KEY).await.expect("query");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].row_key, mine.row_key);
  }

  #[tokio::test]
  async fn stale_etag_is_a_conflict() {
    let store = InMemoryTableStore::new();
    let CasOutcome::Applied { etag } = store.create_sequence("seq", 1).await.expect("create") else {
      panic!("create should apply");
    };
    assert!(matches!(
      store.advance_sequence("seq", 2, &etag).await.expect("advance"),
      CasOutcome::Applied { .. }
    ));
    assert_eq!(
      store.advance_sequence("seq", 3, &etag).await.expect("stale advance"),
      CasOutcome::Conflict
    );
    assert_eq!(store.create_sequence("seq", 9).await.expect("recreate"), CasOutcome::Conflict);
    assert_eq!(store.sequence_value("seq"), Some(2));
  }
}
