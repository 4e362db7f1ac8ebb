//! Synchronous event fan-out.
//!
//! Committed events are handed to every registered sink **after** a
//! successful append, in commit order, on the caller's thread. Reads in this
//! system must observe their own writes (a receive call returns the updated
//! order), so there is no background distribution: the dispatcher applies
//! sinks inline and treats sink failures as best-effort — logged, never
//! propagated to the command's caller.
//!
//! Sinks must therefore be idempotent with respect to `sequence_number`:
//! a retried command may re-deliver an envelope a sink has already seen.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::envelope::EventEnvelope;

/// Sink-side failure. Never fails the command that produced the event.
#[derive(Debug, Error)]
#[error("sink '{sink}' rejected event: {message}")]
pub struct SinkError {
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Consumer of committed events (projections, audit trail).
pub trait EventSink: Send + Sync {
    /// Stable sink name, used in logs when `accept` fails.
    fn name(&self) -> &'static str;

    /// Apply one committed event. Must be idempotent per sequence number.
    fn accept(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), SinkError>;
}
