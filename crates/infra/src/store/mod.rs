//! Transactional storage boundary for accounts and their ledger streams.
//!
//! Account updates and the movements that explain them are committed together
//! through a [`ChangeSet`]: either every update and append lands, or none does.

pub mod in_memory;

use std::sync::Arc;

use larder_core::{AccountId, ExpectedVersion, ItemId, Versioned};
use larder_events::EventEnvelope;
use larder_inventory::{InventoryAccount, Location, StockMovement};

use crate::error::StoreError;

pub use in_memory::InMemoryInventoryStore;

/// A movement as persisted in its account stream.
pub type StoredMovement = EventEnvelope<StockMovement>;

/// New state for one account, guarded by the version it was planned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub account: InventoryAccount,
    pub expected_version: ExpectedVersion,
}

/// Everything one operation commits: account states plus ledger appends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub updates: Vec<AccountUpdate>,
    pub movements: Vec<StockMovement>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a new account state, expecting the stored version to still be the
    /// one the state was derived from.
    pub fn update(mut self, account: InventoryAccount) -> Self {
        let expected_version = ExpectedVersion::Exact(account.version());
        self.updates.push(AccountUpdate {
            account,
            expected_version,
        });
        self
    }

    pub fn record(mut self, movement: StockMovement) -> Self {
        self.movements.push(movement);
        self
    }

    pub fn record_all(mut self, movements: impl IntoIterator<Item = StockMovement>) -> Self {
        self.movements.extend(movements);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.movements.is_empty()
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Account states as stored (versions advanced), in change-set order.
    pub accounts: Vec<InventoryAccount>,
    pub movements: Vec<StoredMovement>,
}

impl Committed {
    pub fn account(&self, id: AccountId) -> Option<&InventoryAccount> {
        self.accounts.iter().find(|a| a.id_typed() == id)
    }
}

/// Account storage with atomic, version-checked multi-account commits.
///
/// Implementations must:
/// - reject a commit if any update's expected version does not match
/// - apply all updates and appends of a commit, or none
/// - keep at most one account per `(item, location)`
pub trait InventoryStore: Send + Sync {
    fn insert_account(&self, account: InventoryAccount) -> Result<InventoryAccount, StoreError>;

    fn load_account(&self, id: AccountId) -> Result<Option<InventoryAccount>, StoreError>;

    fn find_account(
        &self,
        item_id: ItemId,
        location: &Location,
    ) -> Result<Option<InventoryAccount>, StoreError>;

    fn accounts_for_item(&self, item_id: ItemId) -> Result<Vec<InventoryAccount>, StoreError>;

    fn accounts_at(&self, location: &Location) -> Result<Vec<InventoryAccount>, StoreError>;

    fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn insert_account(&self, account: InventoryAccount) -> Result<InventoryAccount, StoreError> {
        (**self).insert_account(account)
    }

    fn load_account(&self, id: AccountId) -> Result<Option<InventoryAccount>, StoreError> {
        (**self).load_account(id)
    }

    fn find_account(
        &self,
        item_id: ItemId,
        location: &Location,
    ) -> Result<Option<InventoryAccount>, StoreError> {
        (**self).find_account(item_id, location)
    }

    fn accounts_for_item(&self, item_id: ItemId) -> Result<Vec<InventoryAccount>, StoreError> {
        (**self).accounts_for_item(item_id)
    }

    fn accounts_at(&self, location: &Location) -> Result<Vec<InventoryAccount>, StoreError> {
        (**self).accounts_at(location)
    }

    fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        (**self).commit(changes)
    }
}
