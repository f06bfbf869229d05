//! Recipe-driven stock consumption.
//!
//! Consumption is planned in three steps against a snapshot of the accounts
//! involved:
//!
//! 1. **Validate** every ingredient requirement; any shortage blocks the
//!    whole recipe.
//! 2. **Fall back** (only under [`FallbackPolicy::Warehouse`]): pull each
//!    shortfall from the item's warehouse account through a regular transfer.
//! 3. **Deduct** the requirements; the cost basis of each account is unchanged.
//!
//! Planning is pure. The returned [`ConsumptionPlan`] holds the final state of
//! every touched account plus the movements to append, and is committed as a
//! single unit by the caller.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_core::{AccountId, DomainError, ItemId, RecipeId};

use crate::account::{InventoryAccount, Location};
use crate::error::{InventoryError, InventoryResult};
use crate::movement::{MovementKind, StockMovement};
use crate::recipe::Recipe;
use crate::shortage::ShortageReport;
use crate::transfer::{CapacityMode, TransferPlan, plan_transfer};
use crate::unit::{Unit, UnitTable};

/// Warehouse pulls are rounded up at this scale so that, converted back into
/// the buffer unit, they always cover the shortfall.
const FALLBACK_PULL_SCALE: u32 = 12;

/// Whether a short department buffer may be topped up from the warehouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Any shortage fails the consumption.
    #[default]
    Disabled,
    /// Shortfalls are transferred from the item's warehouse account first.
    Warehouse,
}

impl FromStr for FallbackPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(FallbackPolicy::Disabled),
            "warehouse" => Ok(FallbackPolicy::Warehouse),
            other => Err(DomainError::validation(format!(
                "unknown fallback policy '{other}'"
            ))),
        }
    }
}

/// Command: ConsumeRecipe (an order was fulfilled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeRecipe {
    pub recipe_id: RecipeId,
    pub servings: u32,
    /// The department/kitchen fulfilling the order.
    pub location: Location,
    /// Originating order, copied onto every movement.
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// The accounts a consumption is planned against.
#[derive(Debug, Clone, Default)]
pub struct StockSnapshot {
    accounts: HashMap<AccountId, InventoryAccount>,
}

impl StockSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: InventoryAccount) {
        self.accounts.insert(account.id_typed(), account);
    }

    pub fn get(&self, id: AccountId) -> Option<&InventoryAccount> {
        self.accounts.get(&id)
    }

    pub fn warehouse_for(&self, item_id: ItemId) -> Option<&InventoryAccount> {
        self.accounts
            .values()
            .find(|a| a.item_id() == item_id && a.location().is_warehouse())
    }
}

impl FromIterator<InventoryAccount> for StockSnapshot {
    fn from_iter<T: IntoIterator<Item = InventoryAccount>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        for account in iter {
            snapshot.insert(account);
        }
        snapshot
    }
}

/// Quantity removed from one ingredient account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub account_id: AccountId,
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub unit_cost: Decimal,
}

impl Deduction {
    pub fn value(&self) -> Decimal {
        self.quantity * self.unit_cost
    }
}

/// Fully computed consumption, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionPlan {
    /// Correlates every movement of this recipe invocation.
    pub invocation_id: Uuid,
    pub recipe_id: RecipeId,
    pub product: String,
    pub servings: u32,
    /// Warehouse top-ups performed before deducting.
    pub fallback_transfers: Vec<TransferPlan>,
    pub deductions: Vec<Deduction>,
    /// Final state of every touched account, each listed once.
    pub accounts: Vec<InventoryAccount>,
}

impl ConsumptionPlan {
    /// Ledger entries: transfer legs first, then one `CONSUMPTION` per ingredient account.
    pub fn movements(
        &self,
        reference: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Vec<StockMovement> {
        let mut movements = Vec::with_capacity(
            self.fallback_transfers.len() * 2 + self.deductions.len(),
        );

        for transfer in &self.fallback_transfers {
            movements.extend(transfer.movements(reference.clone(), occurred_at));
        }

        let notes = format!("recipe {} ({}) x{}", self.recipe_id, self.product, self.servings);
        for deduction in &self.deductions {
            let Some(account) = self.accounts.iter().find(|a| a.id_typed() == deduction.account_id)
            else {
                continue;
            };
            movements.push(
                StockMovement::new(
                    MovementKind::Consumption,
                    account,
                    -deduction.quantity,
                    deduction.unit_cost,
                    occurred_at,
                )
                .with_correlation(self.invocation_id)
                .with_reference(reference.clone())
                .with_notes(notes.clone()),
            );
        }

        movements
    }

    /// Total cost of the consumed stock.
    pub fn consumed_value(&self) -> Decimal {
        self.deductions.iter().map(Deduction::value).sum()
    }
}

/// Working copies of the accounts a plan touches, in first-touch order.
struct Workspace {
    accounts: HashMap<AccountId, InventoryAccount>,
    order: Vec<AccountId>,
}

impl Workspace {
    fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn put(&mut self, account: InventoryAccount) {
        let id = account.id_typed();
        if self.accounts.insert(id, account).is_none() {
            self.order.push(id);
        }
    }

    fn get(&self, id: AccountId) -> Option<&InventoryAccount> {
        self.accounts.get(&id)
    }

    fn into_accounts(mut self) -> Vec<InventoryAccount> {
        self.order
            .iter()
            .filter_map(|id| self.accounts.remove(id))
            .collect()
    }
}

/// Plan consuming `servings` of `recipe` at `location`.
pub fn plan_consumption(
    units: &UnitTable,
    recipe: &Recipe,
    servings: u32,
    location: &Location,
    snapshot: &StockSnapshot,
    policy: FallbackPolicy,
) -> InventoryResult<ConsumptionPlan> {
    if servings == 0 {
        return Err(InventoryError::validation("servings must be positive"));
    }

    let location = location.normalized();
    let mut workspace = Workspace::new();
    let requirements = requirements(units, recipe, servings, &location, snapshot, &mut workspace)?;

    let short: Vec<(AccountId, Decimal)> = requirements
        .iter()
        .filter(|(id, needed)| workspace.get(*id).is_some_and(|a| *needed > a.quantity()))
        .copied()
        .collect();

    let mut fallback_transfers = Vec::new();
    if !short.is_empty() {
        match policy {
            FallbackPolicy::Disabled => {
                let mut report = ShortageReport::new();
                for (id, needed) in &short {
                    if let Some(account) = workspace.get(*id) {
                        report.push(account.shortage(*needed));
                    }
                }
                return Err(InventoryError::InsufficientStock(report));
            }
            FallbackPolicy::Warehouse => {
                fallback_transfers = top_up_from_warehouse(units, &short, snapshot, &mut workspace)?;
            }
        }
    }

    let mut deductions = Vec::with_capacity(requirements.len());
    let mut report = ShortageReport::new();
    for (id, needed) in &requirements {
        let Some(account) = workspace.get(*id) else {
            continue;
        };
        if *needed > account.quantity() {
            report.push(account.shortage(*needed));
            continue;
        }
        deductions.push(Deduction {
            account_id: *id,
            item_id: account.item_id(),
            item_name: account.item_name().to_string(),
            quantity: *needed,
            unit: account.unit().clone(),
            unit_cost: account.cost_per_unit(),
        });
    }
    if !report.is_empty() {
        return Err(InventoryError::InsufficientStock(report));
    }

    for deduction in &deductions {
        if let Some(account) = workspace.get(deduction.account_id) {
            let after = account.deduct(deduction.quantity)?;
            workspace.put(after);
        }
    }

    Ok(ConsumptionPlan {
        invocation_id: Uuid::now_v7(),
        recipe_id: recipe.id(),
        product: recipe.product().to_string(),
        servings,
        fallback_transfers,
        deductions,
        accounts: workspace.into_accounts(),
    })
}

/// Total needed per ingredient account, in the account's unit, in recipe order.
fn requirements(
    units: &UnitTable,
    recipe: &Recipe,
    servings: u32,
    location: &Location,
    snapshot: &StockSnapshot,
    workspace: &mut Workspace,
) -> InventoryResult<Vec<(AccountId, Decimal)>> {
    let mut requirements: Vec<(AccountId, Decimal)> = Vec::new();

    for ingredient in recipe.ingredients() {
        let account = snapshot.get(ingredient.account_id).ok_or_else(|| {
            DomainError::not_found(format!("ingredient account {}", ingredient.account_id))
        })?;

        if account.location() != location {
            return Err(InventoryError::invariant(format!(
                "ingredient {} is held at {}, not at {}",
                account.item_name(),
                account.location(),
                location
            )));
        }

        let per_recipe = ingredient
            .quantity_per_serving
            .checked_mul(Decimal::from(servings))
            .ok_or_else(|| InventoryError::validation("required quantity overflowed"))?;
        let needed = units.convert(per_recipe, &ingredient.unit, account.unit())?;

        match requirements.iter_mut().find(|(id, _)| *id == ingredient.account_id) {
            Some((_, total)) => {
                *total = total
                    .checked_add(needed)
                    .ok_or_else(|| InventoryError::validation("required quantity overflowed"))?;
            }
            None => {
                requirements.push((ingredient.account_id, needed));
                workspace.put(account.clone());
            }
        }
    }

    Ok(requirements)
}

/// Transfer each shortfall from the matching warehouse account.
///
/// Fails with the complete list of shortfalls the warehouse cannot cover.
fn top_up_from_warehouse(
    units: &UnitTable,
    short: &[(AccountId, Decimal)],
    snapshot: &StockSnapshot,
    workspace: &mut Workspace,
) -> InventoryResult<Vec<TransferPlan>> {
    let mut transfers = Vec::new();
    let mut unresolved = ShortageReport::new();

    for (id, needed) in short {
        let Some(buffer) = workspace.get(*id).cloned() else {
            continue;
        };

        let warehouse = snapshot
            .warehouse_for(buffer.item_id())
            .and_then(|w| workspace.get(w.id_typed()).or(Some(w)))
            .cloned();
        let Some(warehouse) = warehouse else {
            unresolved.push(buffer.shortage(*needed));
            continue;
        };

        let shortfall = *needed - buffer.quantity();
        let pull = units
            .convert(shortfall, buffer.unit(), warehouse.unit())?
            .round_dp_with_strategy(FALLBACK_PULL_SCALE, RoundingStrategy::AwayFromZero);

        if pull > warehouse.quantity() {
            let mut shortage = buffer.shortage(*needed);
            shortage.warehouse_available =
                Some(units.convert(warehouse.quantity(), warehouse.unit(), buffer.unit())?);
            unresolved.push(shortage);
            continue;
        }

        let plan = plan_transfer(units, &warehouse, &buffer, pull, CapacityMode::Unbounded)?;
        workspace.put(plan.source.clone());
        workspace.put(plan.destination.clone());
        transfers.push(plan);
    }

    if !unresolved.is_empty() {
        return Err(InventoryError::InsufficientStock(unresolved));
    }
    Ok(transfers)
}
