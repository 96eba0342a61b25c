//! Immutable trace store and load-time validation.

#[cfg(test)]
#[path = "trace_test.rs"]
mod trace_test;

use crate::event::{Mutation, TraceEvent};

/// Reasons an event fails load-time validation.
///
/// Every variant carries the index of the offending event so a corrupt
/// recording can be located in its source file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptTrace {
    /// A forward mutation referenced a slot before the forward list created it.
    #[error("event {event}: forward mutation {index} references slot {slot} before it is created")]
    SlotNotYetCreated { event: usize, index: usize, slot: usize },
    /// An inverse mutation referenced a slot the paired forward never produced.
    #[error("event {event}: inverse references slot {slot}, which the forward list never produced")]
    UnknownSlot { event: usize, slot: usize },
    /// A slot was removed twice across the forward and inverse lists.
    #[error("event {event}: slot {slot} removed twice")]
    DoubleRemove { event: usize, slot: usize },
    /// The inverse list tried to create an entity. Inverses only undo;
    /// a creation there has no slot to thread a handle through.
    #[error("event {event}: inverse list may not create entities")]
    CreateInInverse { event: usize },
    /// Applying forward then inverse left entities behind.
    #[error("event {event}: {leaked} entities left after forward and inverse, expected 0")]
    NonZeroNet { event: usize, leaked: usize },
}

/// Errors from trace construction and access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("index {index} out of range for trace of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Corrupt(#[from] CorruptTrace),
}

/// An immutable, ordered log of recorded events for one algorithm run.
///
/// Built once by a producer and read-only thereafter. Construction validates
/// every event, so a cursor is never handed a trace whose inverses cannot
/// undo their forwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    /// Build a trace, validating every event once.
    ///
    /// Validation simulates apply + revert for each event against an
    /// abstract slot-liveness model, without touching any surface.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Corrupt`] if any event references a slot its
    /// forward list did not produce, removes a slot twice, creates from an
    /// inverse list, or does not return the entity count to zero.
    pub fn from_events(events: Vec<TraceEvent>) -> Result<Self, TraceError> {
        for (index, event) in events.iter().enumerate() {
            validate_event(index, event)?;
        }
        Ok(Self { events })
    }

    /// Number of events in the trace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the trace holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::IndexOutOfRange`] if `index >= len()`.
    pub fn at(&self, index: usize) -> Result<&TraceEvent, TraceError> {
        let len = self.events.len();
        self.events.get(index).ok_or(TraceError::IndexOutOfRange { index, len })
    }

    /// Events in recorded order.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&TraceEvent> {
        self.events.get(index)
    }
}

/// Simulate one event's forward and inverse lists against a slot-liveness
/// model: which slots exist, and which are still alive.
fn validate_event(event_index: usize, event: &TraceEvent) -> Result<(), CorruptTrace> {
    let mut alive: Vec<bool> = Vec::new();

    for (index, mutation) in event.forward.iter().enumerate() {
        match mutation {
            Mutation::CreateEntity { .. } => alive.push(true),
            Mutation::SetMetadata { slot, .. } => {
                if slot.0 >= alive.len() {
                    return Err(CorruptTrace::SlotNotYetCreated {
                        event: event_index,
                        index,
                        slot: slot.0,
                    });
                }
            }
            Mutation::RemoveEntity { slot } => {
                if slot.0 >= alive.len() {
                    return Err(CorruptTrace::SlotNotYetCreated {
                        event: event_index,
                        index,
                        slot: slot.0,
                    });
                }
                if !alive[slot.0] {
                    return Err(CorruptTrace::DoubleRemove {
                        event: event_index,
                        slot: slot.0,
                    });
                }
                alive[slot.0] = false;
            }
        }
    }

    for mutation in &event.inverse {
        match mutation {
            Mutation::CreateEntity { .. } => {
                return Err(CorruptTrace::CreateInInverse { event: event_index });
            }
            Mutation::SetMetadata { slot, .. } => {
                if slot.0 >= alive.len() {
                    return Err(CorruptTrace::UnknownSlot {
                        event: event_index,
                        slot: slot.0,
                    });
                }
            }
            Mutation::RemoveEntity { slot } => {
                if slot.0 >= alive.len() {
                    return Err(CorruptTrace::UnknownSlot {
                        event: event_index,
                        slot: slot.0,
                    });
                }
                if !alive[slot.0] {
                    return Err(CorruptTrace::DoubleRemove {
                        event: event_index,
                        slot: slot.0,
                    });
                }
                alive[slot.0] = false;
            }
        }
    }

    let leaked = alive.iter().filter(|live| **live).count();
    if leaked > 0 {
        return Err(CorruptTrace::NonZeroNet {
            event: event_index,
            leaked,
        });
    }
    Ok(())
}
