// core/src/id/mod.rs

//! ProductId assignment strategies.

pub mod counter;
pub mod scan;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::{IngestError, IngestResult};

pub use counter::CounterAllocator;
pub use scan::ScanAllocator;

/// Retry bound for the counter strategy when not configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Hands out the ProductId for the next product in the partition.
#[async_trait]
pub trait IdAllocator: Send + Sync {
  async fn next_id(&self) -> IngestResult<i32>;

  fn strategy(&self) -> IdStrategy;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
  /// Scan the partition and take max + 1. Concurrent calls can observe the
  /// same maximum and hand out the same id.
  #[default]
  Scan,
  /// Increment a counter entity guarded by its ETag; unique under concurrency.
  /// The counter is written before the product, so a failed insert leaves a
  /// gap, and rows added by other writers are not seen once it exists.
  Counter,
}

impl FromStr for IdStrategy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "scan" => Ok(IdStrategy::Scan),
      "counter" => Ok(IdStrategy::Counter),
      other => Err(format!("unknown ProductId strategy '{}' (expected 'scan' or 'counter')", other)),
    }
  }
}

impl fmt::Display for IdStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IdStrategy::Scan => f.write_str("scan"),
      IdStrategy::Counter => f.write_str("counter"),
    }
  }
}

pub(crate) fn successor(current_max: i32) -> IngestResult<i32> {
  current_max
    .checked_add(1)
    .ok_or(IngestError::IdSpaceExhausted { current_max })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_strategy_names() {
    assert_eq!("scan".parse::<IdStrategy>(), Ok(IdStrategy::Scan));
    assert_eq!(" Counter ".parse::<IdStrategy>(), Ok(IdStrategy::Counter));
    assert!("atomic".parse::<IdStrategy>().is_err());
    assert_eq!(IdStrategy::default(), IdStrategy::Scan);
  }

  #[test]
  fn successor_refuses_to_wrap() {
    assert_eq!(successor(0).ok(), Some(1));
    assert!(matches!(
      successor(i32::MAX),
      Err(IngestError::IdSpaceExhausted { current_max: i32::MAX })
    ));
  }
}
