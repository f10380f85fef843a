//! Ordered event log
//!
//! Events are appended inside the same atomic unit as the state change they
//! describe; there is no outbox and no after-commit publication window.
//! Sequence numbers come from the unit's reservation of the store allocator,
//! so committed events form a dense, gap-free log while aborted units
//! consume nothing.

use crate::{
    error::Result,
    store::UnitOfWork,
    types::{AggregateType, EventKind, EventRecord},
};
use chrono::Utc;
use std::collections::HashMap;

/// Append an event within the current atomic unit.
///
/// Idempotent on `event_id`: appending an id that already exists (committed
/// or staged earlier in this unit) returns the existing record unchanged
/// instead of failing, so retried producers converge on one event.
pub fn append_event(
    uow: &mut UnitOfWork<'_>,
    event_id: impl Into<String>,
    aggregate_type: AggregateType,
    aggregate_id: impl Into<String>,
    kind: EventKind,
    payload: HashMap<String, serde_json::Value>,
) -> Result<EventRecord> {
    let event_id = event_id.into();

    if let Some(existing) = uow.event_by_id(&event_id) {
        return Ok(existing.clone());
    }

    let record = EventRecord {
        event_id,
        sequence: uow.allocate_sequence(),
        aggregate_type,
        aggregate_id: aggregate_id.into(),
        kind,
        payload,
        created_at: Utc::now(),
    };

    uow.stage_event(record.clone())?;

    tracing::debug!(
        event_id = %record.event_id,
        sequence = record.sequence,
        kind = ?record.kind,
        "Event appended"
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn append(store: &Store, event_id: &str) -> EventRecord {
        store
            .atomically(|uow| {
                append_event(
                    uow,
                    event_id,
                    AggregateType::Payout,
                    "p1",
                    EventKind::PayoutCreated,
                    HashMap::new(),
                )
            })
            .unwrap()
    }

    #[test]
    fn test_append_assigns_consecutive_sequences() {
        let store = Store::new();
        assert_eq!(append(&store, "a").sequence, 1);
        assert_eq!(append(&store, "b").sequence, 2);
        assert_eq!(append(&store, "c").sequence, 3);
    }

    #[test]
    fn test_append_is_idempotent_on_event_id() {
        let store = Store::new();
        let first = append(&store, "a");
        let replay = append(&store, "a");

        assert_eq!(replay.sequence, first.sequence);
        assert_eq!(store.read_events(0, 10).len(), 1);
        assert_eq!(store.max_sequence(), 1);
    }

    #[test]
    fn test_append_is_idempotent_within_one_unit() {
        let store = Store::new();
        let (first, second) = store
            .atomically(|uow| -> crate::Result<(EventRecord, EventRecord)> {
                let a = append_event(
                    uow,
                    "a",
                    AggregateType::Payout,
                    "p1",
                    EventKind::PayoutCreated,
                    HashMap::new(),
                )?;
                let b = append_event(
                    uow,
                    "a",
                    AggregateType::Payout,
                    "p1",
                    EventKind::PayoutCreated,
                    HashMap::new(),
                )?;
                Ok((a, b))
            })
            .unwrap();

        assert_eq!(first.sequence, second.sequence);
        assert_eq!(store.max_sequence(), 1);
    }

    #[test]
    fn test_read_events_respects_since_and_limit() {
        let store = Store::new();
        for i in 0..5 {
            append(&store, &format!("evt-{}", i));
        }

        let from_start = store.read_events(0, 2);
        assert_eq!(
            from_start.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let tail = store.read_events(3, 10);
        assert_eq!(
            tail.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[test]
    fn test_aggregate_history_is_ordered_and_filtered() {
        let store = Store::new();
        store
            .atomically(|uow| -> crate::Result<()> {
                append_event(
                    uow,
                    "p1-created",
                    AggregateType::Payout,
                    "p1",
                    EventKind::PayoutCreated,
                    HashMap::new(),
                )?;
                append_event(
                    uow,
                    "p2-created",
                    AggregateType::Payout,
                    "p2",
                    EventKind::PayoutCreated,
                    HashMap::new(),
                )?;
                append_event(
                    uow,
                    "p1-processing",
                    AggregateType::Payout,
                    "p1",
                    EventKind::PayoutProcessingStarted,
                    HashMap::new(),
                )?;
                Ok(())
            })
            .unwrap();

        let history = store.read_aggregate_history(AggregateType::Payout, "p1");
        assert_eq!(history.len(), 2);
        assert!(history[0].sequence < history[1].sequence);
        assert_eq!(history[0].kind, EventKind::PayoutCreated);
        assert_eq!(history[1].kind, EventKind::PayoutProcessingStarted);
    }
}
