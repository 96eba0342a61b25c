use serde_json::json;

use super::*;
use crate::event::{EntityKind, GeoPoint, Slot};

fn create(kind: EntityKind, label: &str) -> Mutation {
    Mutation::CreateEntity {
        kind,
        position: GeoPoint::new(49.5, 6.1),
        label: label.to_owned(),
        style: json!({}),
    }
}

fn remove(slot: usize) -> Mutation {
    Mutation::RemoveEntity { slot: Slot(slot) }
}

fn set_meta(slot: usize, text: &str) -> Mutation {
    Mutation::SetMetadata { slot: Slot(slot), text: text.to_owned() }
}

/// A well-formed two-entity relaxation event.
fn relax_event() -> TraceEvent {
    TraceEvent {
        forward: vec![
            create(EntityKind::From, "from"),
            set_meta(0, "id: 1, rank: 2"),
            create(EntityKind::To, "to"),
            set_meta(1, "id: 3, rank: 4"),
        ],
        inverse: vec![remove(1), remove(0)],
    }
}

// =============================================================
// Construction and access
// =============================================================

#[test]
fn empty_trace_is_valid() {
    let trace = Trace::from_events(vec![]).unwrap();
    assert_eq!(trace.len(), 0);
    assert!(trace.is_empty());
}

#[test]
fn well_formed_events_validate() {
    let trace = Trace::from_events(vec![relax_event(), relax_event()]).unwrap();
    assert_eq!(trace.len(), 2);
    assert!(!trace.is_empty());
}

#[test]
fn at_returns_event_in_range() {
    let trace = Trace::from_events(vec![relax_event()]).unwrap();
    let event = trace.at(0).unwrap();
    assert_eq!(event.slots(), 2);
}

#[test]
fn at_out_of_range_fails() {
    let trace = Trace::from_events(vec![relax_event()]).unwrap();
    let err = trace.at(1).unwrap_err();
    assert_eq!(err, TraceError::IndexOutOfRange { index: 1, len: 1 });
}

#[test]
fn at_on_empty_trace_fails() {
    let trace = Trace::from_events(vec![]).unwrap();
    let err = trace.at(0).unwrap_err();
    assert_eq!(err, TraceError::IndexOutOfRange { index: 0, len: 0 });
}

#[test]
fn events_iterates_in_order() {
    let mut second = relax_event();
    second.forward.push(create(EntityKind::To, "extra"));
    second.inverse.insert(0, remove(2));
    let trace = Trace::from_events(vec![relax_event(), second]).unwrap();
    let slot_counts: Vec<usize> = trace.events().map(TraceEvent::slots).collect();
    assert_eq!(slot_counts, vec![2, 3]);
}

// =============================================================
// Validation: corrupt inverses
// =============================================================

#[test]
fn inverse_referencing_unproduced_slot_is_corrupt() {
    // Event 2's inverse names a slot its forward never created.
    let mut corrupt = relax_event();
    corrupt.inverse = vec![remove(1), remove(0), remove(5)];
    let err = Trace::from_events(vec![relax_event(), relax_event(), corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::UnknownSlot { event: 2, slot: 5 })
    );
}

#[test]
fn inverse_missing_a_removal_leaks() {
    let mut corrupt = relax_event();
    corrupt.inverse = vec![remove(1)];
    let err = Trace::from_events(vec![corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::NonZeroNet { event: 0, leaked: 1 })
    );
}

#[test]
fn inverse_removing_twice_is_corrupt() {
    let mut corrupt = relax_event();
    corrupt.inverse = vec![remove(1), remove(0), remove(0)];
    let err = Trace::from_events(vec![corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::DoubleRemove { event: 0, slot: 0 })
    );
}

#[test]
fn inverse_creating_entities_is_corrupt() {
    let mut corrupt = relax_event();
    corrupt.inverse.push(create(EntityKind::From, "sneaky"));
    let err = Trace::from_events(vec![corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::CreateInInverse { event: 0 })
    );
}

#[test]
fn inverse_metadata_on_unknown_slot_is_corrupt() {
    let mut corrupt = relax_event();
    corrupt.inverse.insert(0, set_meta(7, "ghost"));
    let err = Trace::from_events(vec![corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::UnknownSlot { event: 0, slot: 7 })
    );
}

// =============================================================
// Validation: corrupt forwards
// =============================================================

#[test]
fn forward_metadata_before_creation_is_corrupt() {
    let corrupt = TraceEvent {
        forward: vec![set_meta(0, "early"), create(EntityKind::From, "late")],
        inverse: vec![remove(0)],
    };
    let err = Trace::from_events(vec![corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::SlotNotYetCreated { event: 0, index: 0, slot: 0 })
    );
}

#[test]
fn forward_removing_its_own_slot_then_inverse_removing_again_is_corrupt() {
    let corrupt = TraceEvent {
        forward: vec![create(EntityKind::From, "blink"), remove(0)],
        inverse: vec![remove(0)],
    };
    let err = Trace::from_events(vec![corrupt]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::DoubleRemove { event: 0, slot: 0 })
    );
}

#[test]
fn forward_removing_its_own_slot_nets_zero() {
    // A transient entity fully contained within forward is valid.
    let event = TraceEvent {
        forward: vec![create(EntityKind::From, "blink"), remove(0)],
        inverse: vec![],
    };
    assert!(Trace::from_events(vec![event]).is_ok());
}

#[test]
fn validation_reports_first_corrupt_event() {
    let mut corrupt = relax_event();
    corrupt.inverse = vec![remove(1)];
    let err = Trace::from_events(vec![relax_event(), corrupt, relax_event()]).unwrap_err();
    assert_eq!(
        err,
        TraceError::Corrupt(CorruptTrace::NonZeroNet { event: 1, leaked: 1 })
    );
}

// =============================================================
// Error display
// =============================================================

#[test]
fn corrupt_error_names_the_event() {
    let err = CorruptTrace::UnknownSlot { event: 2, slot: 5 };
    let message = err.to_string();
    assert!(message.contains("event 2"));
    assert!(message.contains("slot 5"));
}

#[test]
fn out_of_range_error_names_index_and_length() {
    let err = TraceError::IndexOutOfRange { index: 9, len: 3 };
    let message = err.to_string();
    assert!(message.contains('9'));
    assert!(message.contains('3'));
}
