//! Best-effort audit trail.
//!
//! The audit sink records every committed event. It runs as one sink among
//! the dispatcher's fan-out, so its failures are logged and swallowed — a
//! broken audit backend never fails the operation being audited.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use backroom_core::AggregateId;
use backroom_events::{EventEnvelope, EventSink, SinkError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub sequence_number: u64,
    pub payload: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory audit trail.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.read() {
            Ok(records) => records.clone(),
            Err(_) => vec![],
        }
    }
}

impl EventSink for AuditTrail {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn accept(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), SinkError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| SinkError::new(self.name(), "lock poisoned"))?;
        records.push(AuditRecord {
            event_id: envelope.event_id(),
            aggregate_id: envelope.aggregate_id(),
            aggregate_type: envelope.aggregate_type().to_string(),
            sequence_number: envelope.sequence_number(),
            payload: envelope.payload().clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
