// core/src/id/counter.rs

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{successor, IdAllocator, IdStrategy, ScanAllocator};
use crate::error::{IngestError, IngestResult};
use crate::model::PRODUCT_ID_SEQUENCE;
use crate::store::{CasOutcome, SequenceStore};

/// Issues ProductIds from a counter entity using ETag-conditional writes.
///
/// A missing counter is seeded from a partition scan so that ids continue
/// after whatever the table already holds. An id is consumed as soon as the
/// counter write succeeds, so a failed product insert leaves a gap.
pub struct CounterAllocator {
  sequences: Arc<dyn SequenceStore>,
  seed: ScanAllocator,
  max_attempts: u32,
}

impl CounterAllocator {
  pub fn new(sequences: Arc<dyn SequenceStore>, seed: ScanAllocator, max_attempts: u32) -> Self {
    CounterAllocator {
      sequences,
      seed,
      max_attempts: max_attempts.max(1),
    }
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  async fn try_once(&self) -> IngestResult<Option<i32>> {
    let current = self
      .sequences
      .read_sequence(PRODUCT_ID_SEQUENCE)
      .await
      .map_err(IngestError::Allocation)?;

    let (candidate, outcome) = match current {
      Some(record) => {
        let candidate = successor(record.value)?;
        let outcome = self
          .sequences
          .advance_sequence(PRODUCT_ID_SEQUENCE, candidate, &record.etag)
          .await
          .map_err(IngestError::Allocation)?;
        (candidate, outcome)
      }
      None => {
        let max = self.seed.current_max().await.map_err(IngestError::Allocation)?;
        let candidate = successor(max)?;
        let outcome = self
          .sequences
          .create_sequence(PRODUCT_ID_SEQUENCE, candidate)
          .await
          .map_err(IngestError::Allocation)?;
        if matches!(outcome, CasOutcome::Applied { .. }) {
          info!(seeded_from = max, "Created ProductId counter.");
        }
        (candidate, outcome)
      }
    };

    Ok(match outcome {
      CasOutcome::Applied { .. } => Some(candidate),
      CasOutcome::Conflict => None,
    })
  }
}

#[async_trait]
impl IdAllocator for CounterAllocator {
  #[instrument(name = "id::counter_next", skip(self), fields(max_attempts = self.max_attempts))]
  async fn next_id(&self) -> IngestResult<i32> {
    for attempt in 1..=self.max_attempts {
      match self.try_once().await? {
        Some(id) => {
          debug!(attempt, id, "Reserved ProductId.");
          return Ok(id);
        }
        None => debug!(attempt, "ProductId counter changed underneath us; retrying."),
      }
    }
    warn!(attempts = self.max_attempts, "Could not reserve a ProductId.");
    Err(IngestError::ContentionExhausted {
      attempts: self.max_attempts,
    })
  }

  fn strategy(&self) -> IdStrategy {
    IdStrategy::Counter
  }
}
