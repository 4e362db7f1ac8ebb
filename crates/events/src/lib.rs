//! Domain event contracts: the `Event` trait, the persisted envelope, and the
//! synchronous sink used to fan committed events out to read models and the
//! audit trail.

pub mod envelope;
pub mod event;
pub mod sink;

pub use envelope::EventEnvelope;
pub use event::Event;
pub use sink::{EventSink, SinkError};
