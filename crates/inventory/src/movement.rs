use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_core::{AccountId, ItemId, MovementId};
use larder_events::Event;

use crate::account::InventoryAccount;
use crate::unit::Unit;

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Receipt,
    TransferOut,
    TransferIn,
    Consumption,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receipt => "RECEIPT",
            MovementKind::TransferOut => "TRANSFER_OUT",
            MovementKind::TransferIn => "TRANSFER_IN",
            MovementKind::Consumption => "CONSUMPTION",
            MovementKind::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of the stock ledger.
///
/// `quantity_delta` is signed and expressed in `unit` (the account's unit at
/// the time of the movement); `unit_cost` is the per-unit cost the movement was
/// valued at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub account_id: AccountId,
    pub kind: MovementKind,
    pub quantity_delta: Decimal,
    pub unit: Unit,
    pub unit_cost: Decimal,
    /// The other side of a transfer.
    pub counterpart: Option<AccountId>,
    /// Shared by every movement produced by one operation (both legs of a
    /// transfer, all lines of one recipe consumption).
    pub correlation_id: Option<Uuid>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        kind: MovementKind,
        account: &InventoryAccount,
        quantity_delta: Decimal,
        unit_cost: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            item_id: account.item_id(),
            account_id: account.id_typed(),
            kind,
            quantity_delta,
            unit: account.unit().clone(),
            unit_cost,
            counterpart: None,
            correlation_id: None,
            reference: None,
            notes: None,
            occurred_at,
        }
    }

    pub fn with_counterpart(mut self, counterpart: AccountId) -> Self {
        self.counterpart = Some(counterpart);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Signed value of the movement: `quantity_delta × unit_cost`.
    pub fn value(&self) -> Decimal {
        self.quantity_delta * self.unit_cost
    }
}

impl Event for StockMovement {
    fn event_type(&self) -> &'static str {
        match self.kind {
            MovementKind::Receipt => "inventory.movement.receipt",
            MovementKind::TransferOut => "inventory.movement.transfer_out",
            MovementKind::TransferIn => "inventory.movement.transfer_in",
            MovementKind::Consumption => "inventory.movement.consumption",
            MovementKind::Adjustment => "inventory.movement.adjustment",
        }
    }

    fn stream_id(&self) -> AccountId {
        self.account_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
