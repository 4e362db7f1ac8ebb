//! Command execution pipeline (application-level orchestration).
//!
//! Every mutation in the system runs through [`CommandDispatcher::dispatch`]:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply history)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded) — compare-and-swap
//!   ↓
//! 5. Fan committed events out to sinks (projections, audit)
//! ```
//!
//! Step 4 is the concurrency guard: two callers racing on the same order both
//! load the same version, and whichever appends second fails with
//! [`DispatchError::Concurrency`] instead of silently losing the first write.
//!
//! Sink fan-out is synchronous and best-effort: a sink failure is logged and
//! swallowed, never surfaced to the command's caller. The committed events
//! are durable at that point regardless.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use backroom_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use backroom_events::EventSink;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Domain validation failure (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Domain invariant failure (deterministic).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Domain-level business conflict (e.g. editing a non-draft order).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Per-line failures of a multi-line operation. Nothing was committed.
    #[error("conflict: {}", details.join("; "))]
    LineConflicts { details: Vec<String> },

    /// Referenced aggregate does not exist.
    #[error("not found")]
    NotFound,

    /// Failed to deserialize historical event payloads into the aggregate
    /// event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    /// Persisting to the event store failed.
    #[error("event store error: {0}")]
    Store(#[source] EventStoreError),

    /// A collaborator (catalog, sale store) failed or is unreachable.
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::LineConflicts { details } => DispatchError::LineConflicts { details },
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store so tests run against [`crate::InMemoryEventStore`]
/// and a durable backend can be swapped in without touching domain code.
pub struct CommandDispatcher<S> {
    store: S,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            sinks: Vec::new(),
        }
    }

    /// Register a sink to receive every committed event.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// The `make_aggregate` closure supplies a fresh empty instance (e.g.
    /// `PurchaseOrder::empty(id)`) so the dispatcher stays generic over
    /// aggregate types. Returns the committed events with assigned sequence
    /// numbers; an empty vector means the command was a no-op.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: backroom_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, compare-and-swap on the loaded version)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Fan out to sinks (best-effort, after the append is durable)
        for stored in &committed {
            let envelope = stored.to_envelope();
            for sink in &self.sinks {
                if let Err(err) = sink.accept(&envelope) {
                    tracing::warn!(
                        sink = sink.name(),
                        event_type = %stored.event_type,
                        sequence = stored.sequence_number,
                        error = %err,
                        "event sink rejected committed event"
                    );
                }
            }
        }

        Ok(committed)
    }

    /// Rebuild an aggregate's current state from its stream.
    ///
    /// Used by services that need the post-command state (reads must observe
    /// their own writes).
    pub fn rehydrate<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Guard against a buggy backend returning foreign or reordered events.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!("loaded stream contains wrong aggregate_id at index {idx}"),
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
