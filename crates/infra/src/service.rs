//! Application service: plan against current state, commit atomically, retry on conflict.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the accounts involved (store snapshot, versions included)
//!   ↓
//! 2. Plan with the pure domain functions (new states + movements)
//!   ↓
//! 3. Commit one ChangeSet (all-or-nothing, version-checked)
//!   ↓
//! 4. On a version conflict, back off and go to 1
//! ```
//!
//! Domain failures (shortage, capacity, unit mismatch) are returned on the
//! first attempt and never retried.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use larder_core::{AccountId, ItemId};
use larder_inventory::{
    AdjustStock, ApplyReceipt, CapacityMode, ConsumeRecipe, Deduction, FallbackPolicy,
    InventoryAccount, InventoryError, ItemValuation, Location, MovementKind, OpenAccount,
    RestockSuggestion, StockMovement, StockSnapshot, TransferStock, UnitTable, apply_receipt,
    plan_consumption, plan_transfer, suggest_restock,
};

use crate::catalog::RecipeCatalog;
use crate::config::EngineConfig;
use crate::error::{ServiceError, StoreError};
use crate::ledger::{MovementHistory, StockLedger};
use crate::store::{ChangeSet, Committed, InventoryStore, StoredMovement};

/// Result of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub transfer_id: Uuid,
    pub source: InventoryAccount,
    pub destination: InventoryAccount,
    /// Source-unit quantity that left the source.
    pub quantity_out: Decimal,
    /// Destination-unit quantity that arrived.
    pub quantity_in: Decimal,
    pub movements: Vec<StoredMovement>,
}

/// Result of a committed recipe consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionResult {
    pub invocation_id: Uuid,
    pub deductions: Vec<Deduction>,
    /// Number of warehouse top-ups performed before deducting.
    pub fallback_transfers: usize,
    /// Every account touched, as committed.
    pub accounts: Vec<InventoryAccount>,
    pub movements: Vec<StoredMovement>,
    pub consumed_value: Decimal,
}

pub struct InventoryService<S, C> {
    store: S,
    catalog: C,
    units: UnitTable,
    config: EngineConfig,
}

impl<S, C> InventoryService<S, C>
where
    S: InventoryStore + StockLedger,
    C: RecipeCatalog,
{
    pub fn new(store: S, catalog: C, units: UnitTable, config: EngineConfig) -> Self {
        Self {
            store,
            catalog,
            units,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn units(&self) -> &UnitTable {
        &self.units
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip(self, cmd), fields(item = %cmd.item_name, location = %cmd.location), err)]
    pub fn open_account(&self, mut cmd: OpenAccount) -> Result<InventoryAccount, ServiceError> {
        cmd.cost_scale = cmd.cost_scale.or(Some(self.config.default_cost_scale));

        let account = InventoryAccount::open(&cmd, &self.units)?;
        let account = self.store.insert_account(account)?;
        info!(account_id = %account.id_typed(), unit = %account.unit(), "account opened");
        Ok(account)
    }

    pub fn account(&self, id: AccountId) -> Result<InventoryAccount, ServiceError> {
        self.store
            .load_account(id)?
            .ok_or(ServiceError::AccountNotFound(id))
    }

    /// Book a purchase receipt at moving-average cost.
    #[instrument(skip(self, cmd), fields(account_id = %cmd.account_id, quantity = %cmd.quantity), err)]
    pub fn apply_receipt(&self, cmd: ApplyReceipt) -> Result<InventoryAccount, ServiceError> {
        let (committed, ()) = self.run("apply_receipt", || {
            let account = self.account(cmd.account_id)?;
            let next = apply_receipt(&account, cmd.quantity, cmd.unit_cost)?;
            let movement = StockMovement::new(
                MovementKind::Receipt,
                &next,
                cmd.quantity,
                cmd.unit_cost,
                cmd.occurred_at,
            )
            .with_reference(cmd.reference.clone());

            Ok((ChangeSet::new().update(next).record(movement), ()))
        })?;

        let account = committed_account(&committed, cmd.account_id)?;
        info!(
            account_id = %cmd.account_id,
            cost_per_unit = %account.cost_per_unit(),
            "receipt committed"
        );
        Ok(account)
    }

    /// Move stock between two accounts of the same item; fails if the
    /// destination would exceed its maximum level.
    pub fn transfer(&self, cmd: TransferStock) -> Result<TransferOutcome, ServiceError> {
        self.transfer_with(cmd, CapacityMode::Reject)
    }

    /// Like [`transfer`](Self::transfer), but moves only what fits below the
    /// destination's maximum level.
    pub fn transfer_up_to_capacity(
        &self,
        cmd: TransferStock,
    ) -> Result<TransferOutcome, ServiceError> {
        self.transfer_with(cmd, CapacityMode::UpToCapacity)
    }

    #[instrument(
        skip(self, cmd),
        fields(source = %cmd.source_id, destination = %cmd.destination_id, quantity = %cmd.quantity),
        err
    )]
    fn transfer_with(
        &self,
        cmd: TransferStock,
        mode: CapacityMode,
    ) -> Result<TransferOutcome, ServiceError> {
        let (committed, plan) = self.run("transfer", || {
            let source = self.account(cmd.source_id)?;
            let destination = self.account(cmd.destination_id)?;
            let plan = plan_transfer(&self.units, &source, &destination, cmd.quantity, mode)
                .inspect_err(|err| log_rejection("transfer", err))?;

            let changes = ChangeSet::new()
                .update(plan.source.clone())
                .update(plan.destination.clone())
                .record_all(plan.movements(cmd.reference.clone(), cmd.occurred_at));
            Ok((changes, plan))
        })?;

        if plan.quantity_out < cmd.quantity {
            warn!(
                requested = %cmd.quantity,
                moved = %plan.quantity_out,
                "transfer capped at destination capacity"
            );
        }
        info!(transfer_id = %plan.transfer_id, "transfer committed");

        Ok(TransferOutcome {
            transfer_id: plan.transfer_id,
            source: committed_account(&committed, cmd.source_id)?,
            destination: committed_account(&committed, cmd.destination_id)?,
            quantity_out: plan.quantity_out,
            quantity_in: plan.quantity_in,
            movements: committed.movements,
        })
    }

    /// Deduct every ingredient of a recipe for `servings`, all or nothing.
    #[instrument(
        skip(self, cmd),
        fields(recipe_id = %cmd.recipe_id, servings = cmd.servings, location = %cmd.location),
        err
    )]
    pub fn consume(&self, cmd: ConsumeRecipe) -> Result<ConsumptionResult, ServiceError> {
        let recipe = self
            .catalog
            .recipe(cmd.recipe_id)?
            .ok_or(ServiceError::RecipeNotFound(cmd.recipe_id))?;
        let policy = self.config.fallback;

        let (committed, plan) = self.run("consume", || {
            let mut snapshot = StockSnapshot::new();
            for ingredient in recipe.ingredients() {
                let account = self.account(ingredient.account_id)?;
                if policy == FallbackPolicy::Warehouse {
                    if let Some(warehouse) =
                        self.store.find_account(account.item_id(), &Location::Warehouse)?
                    {
                        snapshot.insert(warehouse);
                    }
                }
                snapshot.insert(account);
            }

            let plan = plan_consumption(
                &self.units,
                &recipe,
                cmd.servings,
                &cmd.location,
                &snapshot,
                policy,
            )
            .inspect_err(|err| log_rejection("consume", err))?;

            let mut changes = ChangeSet::new();
            for account in &plan.accounts {
                changes = changes.update(account.clone());
            }
            let changes = changes.record_all(plan.movements(cmd.reference.clone(), cmd.occurred_at));
            Ok((changes, plan))
        })?;

        if !plan.fallback_transfers.is_empty() {
            warn!(
                transfers = plan.fallback_transfers.len(),
                "buffer shortfall covered from warehouse"
            );
        }
        info!(
            invocation_id = %plan.invocation_id,
            consumed_value = %plan.consumed_value(),
            "consumption committed"
        );

        Ok(ConsumptionResult {
            invocation_id: plan.invocation_id,
            consumed_value: plan.consumed_value(),
            fallback_transfers: plan.fallback_transfers.len(),
            deductions: plan.deductions,
            accounts: committed.accounts,
            movements: committed.movements,
        })
    }

    /// Signed stock correction, recorded as an `ADJUSTMENT` movement.
    #[instrument(skip(self, cmd), fields(account_id = %cmd.account_id, delta = %cmd.delta), err)]
    pub fn adjust(&self, cmd: AdjustStock) -> Result<InventoryAccount, ServiceError> {
        if cmd.reason.trim().is_empty() {
            return Err(InventoryError::validation("adjustment reason is required").into());
        }

        let (committed, ()) = self.run("adjust", || {
            let account = self.account(cmd.account_id)?;
            let next = account
                .adjust(cmd.delta)
                .inspect_err(|err| log_rejection("adjust", err))?;
            let movement = StockMovement::new(
                MovementKind::Adjustment,
                &next,
                cmd.delta,
                next.cost_per_unit(),
                cmd.occurred_at,
            )
            .with_notes(cmd.reason.trim());

            Ok((ChangeSet::new().update(next).record(movement), ()))
        })?;

        info!(account_id = %cmd.account_id, reason = %cmd.reason, "adjustment committed");
        committed_account(&committed, cmd.account_id)
    }

    pub fn history(
        &self,
        account_id: AccountId,
        since: Option<DateTime<Utc>>,
    ) -> Result<MovementHistory, ServiceError> {
        Ok(self.store.history(account_id, since)?)
    }

    /// Buffers at `location` under their minimum level, with the warehouse
    /// stock that could refill them.
    pub fn restock_suggestions(
        &self,
        location: &Location,
    ) -> Result<Vec<RestockSuggestion>, ServiceError> {
        let buffers = self.store.accounts_at(location)?;
        let warehouses: HashMap<ItemId, InventoryAccount> = self
            .store
            .accounts_at(&Location::Warehouse)?
            .into_iter()
            .map(|a| (a.item_id(), a))
            .collect();

        let suggestions = suggest_restock(&self.units, &buffers, &warehouses)?;
        if !suggestions.is_empty() {
            debug!(%location, count = suggestions.len(), "restock suggested");
        }
        Ok(suggestions)
    }

    /// Value of an item across all its locations.
    pub fn item_valuation(&self, item_id: ItemId) -> Result<ItemValuation, ServiceError> {
        let accounts = self.store.accounts_for_item(item_id)?;
        Ok(ItemValuation::from_accounts(item_id, &accounts))
    }

    /// Plan and commit, re-planning from fresh state on version conflicts.
    fn run<T>(
        &self,
        operation: &'static str,
        mut plan: impl FnMut() -> Result<(ChangeSet, T), ServiceError>,
    ) -> Result<(Committed, T), ServiceError> {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 1;

        loop {
            let (changes, planned) = plan()?;
            match self.store.commit(changes) {
                Ok(committed) => return Ok((committed, planned)),
                Err(StoreError::Conflict(msg)) if attempt < max_attempts => {
                    debug!(operation, attempt, %msg, "commit conflict; retrying");
                    let backoff = self.config.retry_backoff * attempt;
                    if !backoff.is_zero() {
                        std::thread::sleep(backoff);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(operation, attempt, error = %err, "giving up after repeated conflicts");
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

fn committed_account(committed: &Committed, id: AccountId) -> Result<InventoryAccount, ServiceError> {
    committed
        .account(id)
        .cloned()
        .ok_or(ServiceError::AccountNotFound(id))
}

fn log_rejection(operation: &'static str, err: &InventoryError) {
    match err {
        InventoryError::InsufficientStock(report) => {
            warn!(operation, shortages = %report, "insufficient stock");
        }
        InventoryError::CapacityExceeded { account, .. } => {
            warn!(operation, %account, "destination capacity exceeded");
        }
        _ => {}
    }
}
