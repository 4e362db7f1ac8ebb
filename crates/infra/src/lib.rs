//! Infrastructure layer: event store, command dispatch, read models, stores,
//! and the two orchestration services (receiving, fulfillment).

pub mod audit;
pub mod command_dispatcher;
pub mod event_store;
pub mod numbering;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod stores;

#[cfg(test)]
mod integration_tests;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
