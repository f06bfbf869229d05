use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use larder_core::{AccountId, ItemId, Versioned};
use larder_events::{Event, EventEnvelope};
use larder_inventory::{InventoryAccount, Location, StockMovement};

use super::{ChangeSet, Committed, InventoryStore, StoredMovement};
use crate::error::StoreError;
use crate::ledger::{MovementHistory, StockLedger};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, InventoryAccount>,
    streams: HashMap<AccountId, Arc<Vec<StoredMovement>>>,
    last_recorded_at: Option<DateTime<Utc>>,
}

impl State {
    /// Ledger clock: wall time, but never behind the previous stamp.
    fn next_recorded_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_recorded_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_recorded_at = Some(at);
        at
    }

    fn append(&mut self, movement: StockMovement) -> StoredMovement {
        let recorded_at = self.next_recorded_at();
        let account_id = movement.stream_id();
        let stream = Arc::make_mut(self.streams.entry(account_id).or_default());
        let sequence = stream.last().map(|m| m.sequence_number()).unwrap_or(0) + 1;

        let stored = EventEnvelope::new(Uuid::now_v7(), account_id, sequence, recorded_at, movement);
        stream.push(stored.clone());
        stored
    }
}

/// In-memory account store and stock ledger.
///
/// Intended for tests/dev and single-process deployments. Every commit runs
/// under one write lock, so a change set is applied entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn validate(state: &State, changes: &ChangeSet) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(changes.updates.len());

        for (idx, update) in changes.updates.iter().enumerate() {
            let id = update.account.id_typed();
            if !seen.insert(id) {
                return Err(StoreError::InvalidChange(format!(
                    "account {id} updated twice (index {idx})"
                )));
            }

            let current = state
                .accounts
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;

            if !update.expected_version.matches(current.version()) {
                return Err(StoreError::Conflict(format!(
                    "account {id}: expected {:?}, found {}",
                    update.expected_version,
                    current.version()
                )));
            }

            if current.item_id() != update.account.item_id()
                || current.location() != update.account.location()
                || current.unit() != update.account.unit()
            {
                return Err(StoreError::InvalidChange(format!(
                    "account {id}: item, location and unit are immutable"
                )));
            }
        }

        for (idx, movement) in changes.movements.iter().enumerate() {
            if !state.accounts.contains_key(&movement.account_id) {
                return Err(StoreError::NotFound(format!(
                    "account {} (movement index {idx})",
                    movement.account_id
                )));
            }
        }

        Ok(())
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn insert_account(&self, account: InventoryAccount) -> Result<InventoryAccount, StoreError> {
        let mut state = self.write()?;
        let id = account.id_typed();

        if state.accounts.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("account {id}")));
        }
        if state
            .accounts
            .values()
            .any(|a| a.item_id() == account.item_id() && a.location() == account.location())
        {
            return Err(StoreError::Duplicate(format!(
                "{} already has an account at {}",
                account.item_name(),
                account.location()
            )));
        }

        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn load_account(&self, id: AccountId) -> Result<Option<InventoryAccount>, StoreError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn find_account(
        &self,
        item_id: ItemId,
        location: &Location,
    ) -> Result<Option<InventoryAccount>, StoreError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.item_id() == item_id && a.location() == location)
            .cloned())
    }

    fn accounts_for_item(&self, item_id: ItemId) -> Result<Vec<InventoryAccount>, StoreError> {
        let mut accounts: Vec<InventoryAccount> = self
            .read()?
            .accounts
            .values()
            .filter(|a| a.item_id() == item_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.location().cmp(b.location()));
        Ok(accounts)
    }

    fn accounts_at(&self, location: &Location) -> Result<Vec<InventoryAccount>, StoreError> {
        let location = location.normalized();
        let mut accounts: Vec<InventoryAccount> = self
            .read()?
            .accounts
            .values()
            .filter(|a| a.location() == &location)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.item_name().cmp(b.item_name()));
        Ok(accounts)
    }

    fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        let mut state = self.write()?;

        // Nothing is written until every update and movement has been checked.
        Self::validate(&state, &changes)?;

        let mut accounts = Vec::with_capacity(changes.updates.len());
        for update in changes.updates {
            let mut account = update.account;
            let id = account.id_typed();
            let current_version = state.accounts.get(&id).map(|a| a.version()).unwrap_or(0);
            while account.version() <= current_version {
                account.advance_version();
            }
            state.accounts.insert(id, account.clone());
            accounts.push(account);
        }

        let movements = changes
            .movements
            .into_iter()
            .map(|movement| state.append(movement))
            .collect();

        Ok(Committed {
            accounts,
            movements,
        })
    }
}

impl StockLedger for InMemoryInventoryStore {
    fn record(&self, movement: StockMovement) -> Result<StoredMovement, StoreError> {
        let mut state = self.write()?;
        if !state.accounts.contains_key(&movement.account_id) {
            return Err(StoreError::NotFound(format!("account {}", movement.account_id)));
        }
        Ok(state.append(movement))
    }

    fn history(
        &self,
        account_id: AccountId,
        since: Option<DateTime<Utc>>,
    ) -> Result<MovementHistory, StoreError> {
        let stream = self
            .read()?
            .streams
            .get(&account_id)
            .cloned()
            .unwrap_or_default();
        Ok(MovementHistory::new(stream, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::ExpectedVersion;
    use larder_inventory::{MovementKind, OpenAccount, Unit, UnitTable, apply_receipt};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::store::AccountUpdate;

    fn open(store: &InMemoryInventoryStore, location: Location, unit: &str) -> InventoryAccount {
        let account = InventoryAccount::open(
            &OpenAccount {
                account_id: AccountId::new(),
                item_id: ItemId::new(),
                item_name: "Beras".to_string(),
                location,
                unit: Unit::new(unit),
                cost_scale: None,
                min_level: None,
                max_level: None,
            },
            &UnitTable::default(),
        )
        .unwrap();
        store.insert_account(account).unwrap()
    }

    fn receipt(account: &InventoryAccount, qty: Decimal, cost: Decimal) -> ChangeSet {
        let next = apply_receipt(account, qty, cost).unwrap();
        let movement = StockMovement::new(MovementKind::Receipt, &next, qty, cost, Utc::now());
        ChangeSet::new().update(next).record(movement)
    }

    #[test]
    fn commit_advances_version_and_appends_in_sequence() {
        let store = InMemoryInventoryStore::new();
        let account = open(&store, Location::Warehouse, "kg");

        let first = store.commit(receipt(&account, dec!(10), dec!(45000))).unwrap();
        let after_first = first.account(account.id_typed()).unwrap().clone();
        assert_eq!(after_first.version(), 1);

        store.commit(receipt(&after_first, dec!(5), dec!(48000))).unwrap();

        let loaded = store.load_account(account.id_typed()).unwrap().unwrap();
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.cost_per_unit(), dec!(46000));

        let history = store.history(account.id_typed(), None).unwrap();
        let sequences: Vec<u64> = history.iter().map(|m| m.sequence_number()).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert!(history.movements()[0].recorded_at() <= history.movements()[1].recorded_at());
    }

    #[test]
    fn stale_version_is_rejected_without_side_effects() {
        let store = InMemoryInventoryStore::new();
        let account = open(&store, Location::Warehouse, "kg");

        store.commit(receipt(&account, dec!(10), dec!(100))).unwrap();
        // Planned from version 0, but the store is now at version 1.
        let err = store.commit(receipt(&account, dec!(3), dec!(200))).unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(err.is_retryable());
        let loaded = store.load_account(account.id_typed()).unwrap().unwrap();
        assert_eq!(loaded.quantity(), dec!(10));
        assert_eq!(store.history(account.id_typed(), None).unwrap().len(), 1);
    }

    #[test]
    fn failing_update_rolls_back_the_whole_change_set() {
        let store = InMemoryInventoryStore::new();
        let a = open(&store, Location::Warehouse, "kg");
        let b = open(&store, Location::department("kitchen"), "g");

        let a_next = apply_receipt(&a, dec!(1), dec!(1)).unwrap();
        let b_next = apply_receipt(&b, dec!(1), dec!(1)).unwrap();
        let changes = ChangeSet {
            updates: vec![
                AccountUpdate {
                    account: a_next,
                    expected_version: ExpectedVersion::Exact(0),
                },
                AccountUpdate {
                    account: b_next,
                    expected_version: ExpectedVersion::Exact(7),
                },
            ],
            movements: vec![],
        };

        assert!(store.commit(changes).is_err());
        assert_eq!(
            store.load_account(a.id_typed()).unwrap().unwrap().quantity(),
            Decimal::ZERO
        );
    }

    #[test]
    fn duplicate_item_location_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let account = open(&store, Location::Warehouse, "kg");

        let twin = InventoryAccount::open(
            &OpenAccount {
                account_id: AccountId::new(),
                item_id: account.item_id(),
                item_name: "Beras".to_string(),
                location: Location::Warehouse,
                unit: Unit::new("g"),
                cost_scale: None,
                min_level: None,
                max_level: None,
            },
            &UnitTable::default(),
        )
        .unwrap();

        assert!(matches!(
            store.insert_account(twin),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn same_account_twice_in_one_change_set_is_invalid() {
        let store = InMemoryInventoryStore::new();
        let account = open(&store, Location::Warehouse, "kg");
        let next = apply_receipt(&account, dec!(1), dec!(1)).unwrap();

        let changes = ChangeSet::new().update(next.clone()).update(next);
        assert!(matches!(
            store.commit(changes),
            Err(StoreError::InvalidChange(_))
        ));
    }

    #[test]
    fn record_continues_the_stream_after_commits() {
        let store = InMemoryInventoryStore::new();
        let account = open(&store, Location::Warehouse, "kg");
        let committed = store.commit(receipt(&account, dec!(10), dec!(100))).unwrap();
        let current = committed.account(account.id_typed()).unwrap().clone();

        let movement = StockMovement::new(MovementKind::Receipt, &current, dec!(1), dec!(100), Utc::now());
        let stored = store.record(movement).unwrap();
        assert_eq!(stored.sequence_number(), 2);

        let history = store.history(account.id_typed(), None).unwrap();
        let sequences: Vec<u64> = history.iter().map(|m| m.sequence_number()).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn record_for_unknown_account_leaves_streams_untouched() {
        let store = InMemoryInventoryStore::new();
        let known = open(&store, Location::Warehouse, "kg");
        store.commit(receipt(&known, dec!(10), dec!(100))).unwrap();

        let stranger = InventoryAccount::open(
            &OpenAccount {
                account_id: AccountId::new(),
                item_id: ItemId::new(),
                item_name: "Gula".to_string(),
                location: Location::Warehouse,
                unit: Unit::new("kg"),
                cost_scale: None,
                min_level: None,
                max_level: None,
            },
            &UnitTable::default(),
        )
        .unwrap();
        let movement = StockMovement::new(MovementKind::Receipt, &stranger, dec!(1), dec!(100), Utc::now());

        assert!(matches!(store.record(movement), Err(StoreError::NotFound(_))));
        assert!(store.history(stranger.id_typed(), None).unwrap().is_empty());
        assert_eq!(store.history(known.id_typed(), None).unwrap().len(), 1);
    }

    #[test]
    fn history_of_unknown_account_is_empty() {
        let store = InMemoryInventoryStore::new();
        assert!(store.history(AccountId::new(), None).unwrap().is_empty());
    }
}
