//! Append-only stock ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use larder_core::AccountId;
use larder_inventory::StockMovement;

use crate::error::StoreError;
use crate::store::StoredMovement;

/// Append-only, per-account movement log.
///
/// Implementations must:
/// - never rewrite or delete a recorded movement
/// - assign gap-free sequence numbers per account, starting at 1
/// - stamp `recorded_at` so that it never decreases within a stream
pub trait StockLedger: Send + Sync {
    /// Append a single movement outside of an account commit.
    fn record(&self, movement: StockMovement) -> Result<StoredMovement, StoreError>;

    /// Movements of `account_id` in recorded order, optionally only those
    /// recorded at or after `since`. Unknown accounts yield an empty history.
    fn history(
        &self,
        account_id: AccountId,
        since: Option<DateTime<Utc>>,
    ) -> Result<MovementHistory, StoreError>;
}

impl<L> StockLedger for Arc<L>
where
    L: StockLedger + ?Sized,
{
    fn record(&self, movement: StockMovement) -> Result<StoredMovement, StoreError> {
        (**self).record(movement)
    }

    fn history(
        &self,
        account_id: AccountId,
        since: Option<DateTime<Utc>>,
    ) -> Result<MovementHistory, StoreError> {
        (**self).history(account_id, since)
    }
}

/// A read of one account stream.
///
/// Holds a shared snapshot of the stream taken at read time, so it can be
/// iterated any number of times and is unaffected by later appends.
#[derive(Debug, Clone, Default)]
pub struct MovementHistory {
    stream: Arc<Vec<StoredMovement>>,
    start: usize,
}

impl MovementHistory {
    pub fn new(stream: Arc<Vec<StoredMovement>>, since: Option<DateTime<Utc>>) -> Self {
        let start = match since {
            Some(since) => stream.partition_point(|m| m.recorded_at() < since),
            None => 0,
        };
        Self { stream, start }
    }

    pub fn movements(&self) -> &[StoredMovement] {
        &self.stream[self.start..]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StoredMovement> {
        self.movements().iter()
    }

    pub fn len(&self) -> usize {
        self.movements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements().is_empty()
    }

    pub fn to_vec(&self) -> Vec<StoredMovement> {
        self.movements().to_vec()
    }
}

impl<'a> IntoIterator for &'a MovementHistory {
    type Item = &'a StoredMovement;
    type IntoIter = std::slice::Iter<'a, StoredMovement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
