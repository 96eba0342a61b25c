//! Event model: reversible mutations and recorded forward/inverse pairs.
//!
//! A producer (an instrumented graph search) emits one [`TraceEvent`] per
//! relaxation/visit step. Each event is a closed, replayable unit: its
//! `forward` list describes what appears on the surface, its `inverse` list
//! describes how to take it away again. Neither list names concrete surface
//! handles (handles only exist once a cursor applies the forward list), so
//! mutations refer to entities by [`Slot`], the index of a creation within
//! the same event.

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;

use serde::{Deserialize, Serialize};

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// The role of a point entity within a recorded step.
///
/// Opaque to the engine beyond display: a `From` point is the node being
/// settled or expanded, a `To` point is a neighbour reached by the relaxed
/// edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    From,
    To,
}

impl EntityKind {
    /// Stable lowercase name, matching the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
        }
    }
}

/// Index of a creation within the same event's forward list.
///
/// `Slot(0)` is the first entity the forward list creates, `Slot(1)` the
/// second, and so on. The cursor records the concrete handle produced for
/// each slot when it applies the forward list and substitutes it wherever
/// the slot is referenced later, including in the inverse list, which may
/// run long after (or be rolled back and re-run with fresh handles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot(pub usize);

/// An atomic, reversible operation against a render surface.
///
/// Mutations are pure with respect to the trace; all side effects go through
/// the surface the cursor drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Create a point entity. Produces the event's next slot.
    CreateEntity {
        kind: EntityKind,
        position: GeoPoint,
        label: String,
        /// Open-ended display styling (color, icon, ...), opaque to the engine.
        style: serde_json::Value,
    },
    /// Replace the display metadata text of a previously created slot.
    SetMetadata { slot: Slot, text: String },
    /// Remove the entity held by a slot.
    RemoveEntity { slot: Slot },
}

/// One recorded step: a forward mutation list and the inverse list that
/// undoes it.
///
/// Both lists are fully determined at construction time. The invariant,
/// enforced by trace validation rather than here, is that applying `forward`
/// then `inverse` leaves any surface's entity set net-unchanged: the inverse
/// removes exactly the slots the forward list created, in reverse order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub forward: Vec<Mutation>,
    pub inverse: Vec<Mutation>,
}

impl TraceEvent {
    /// Number of entities the forward list creates.
    #[must_use]
    pub fn slots(&self) -> usize {
        self.forward
            .iter()
            .filter(|m| matches!(m, Mutation::CreateEntity { .. }))
            .count()
    }
}
