use chrono::{DateTime, Utc};

use larder_core::AccountId;

/// A fact appended to an account stream.
///
/// Events are never edited; corrections are new events.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, stable across releases (e.g. "inventory.movement.receipt").
    fn event_type(&self) -> &'static str;

    /// Payload schema version; bump when a field changes meaning.
    fn schema_version(&self) -> u32 {
        1
    }

    /// The account stream this event is appended to.
    fn stream_id(&self) -> AccountId;

    /// Business time, as opposed to the ledger's `recorded_at`.
    fn occurred_at(&self) -> DateTime<Utc>;
}
