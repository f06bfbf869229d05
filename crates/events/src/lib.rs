//! Event primitives for the append-only stock ledger.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
