//! Render-surface capability contract and the in-memory reference surface.
//!
//! The engine never draws anything itself. A host provides something that
//! implements [`RenderSurface`] (a map widget, a TUI panel) and the cursor
//! drives it. [`InMemorySurface`] is the deterministic reference
//! implementation used by the CLI inspector and by tests.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::{EntityKind, GeoPoint};

/// Opaque identifier for a live entity on a surface.
pub type EntityHandle = u64;

/// Errors surfaced by a render backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The handle was never created or was already removed. This indicates
    /// broken handle bookkeeping in the caller, not a recoverable condition.
    #[error("unknown entity handle {0}")]
    UnknownHandle(EntityHandle),
    /// The backend rejected an otherwise well-formed operation.
    #[error("render backend failure: {0}")]
    Backend(String),
}

/// Capability interface the cursor drives.
///
/// Exactly one cursor may drive a given surface at a time; the cursor either
/// owns its surface or holds it via `&mut`, so exclusivity is enforced by
/// the borrow rules rather than by a runtime lock.
pub trait RenderSurface {
    /// Create a point entity, returning its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Backend`] if the backend rejects the entity.
    fn create_entity(
        &mut self,
        kind: EntityKind,
        position: GeoPoint,
        label: &str,
        style: &serde_json::Value,
    ) -> Result<EntityHandle, SurfaceError>;

    /// Replace the display metadata text of an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownHandle`] if `handle` is not live.
    fn set_metadata(&mut self, handle: EntityHandle, text: &str) -> Result<(), SurfaceError>;

    /// Remove an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownHandle`] if `handle` was already
    /// removed or never created.
    fn remove_entity(&mut self, handle: EntityHandle) -> Result<(), SurfaceError>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for &mut S {
    fn create_entity(
        &mut self,
        kind: EntityKind,
        position: GeoPoint,
        label: &str,
        style: &serde_json::Value,
    ) -> Result<EntityHandle, SurfaceError> {
        (**self).create_entity(kind, position, label, style)
    }

    fn set_metadata(&mut self, handle: EntityHandle, text: &str) -> Result<(), SurfaceError> {
        (**self).set_metadata(handle, text)
    }

    fn remove_entity(&mut self, handle: EntityHandle) -> Result<(), SurfaceError> {
        (**self).remove_entity(handle)
    }
}

/// A live entity on the in-memory surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub handle: EntityHandle,
    pub kind: EntityKind,
    pub position: GeoPoint,
    pub label: String,
    /// Open-ended display styling, carried through untouched.
    pub style: serde_json::Value,
    /// Display metadata text, if any was set.
    pub metadata: Option<String>,
}

/// One successful operation applied to an [`InMemorySurface`].
///
/// The journal records applications in order, which is what the determinism
/// property compares: two replays of the same trace on fresh surfaces must
/// produce identical journals.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Create {
        handle: EntityHandle,
        kind: EntityKind,
        position: GeoPoint,
        label: String,
    },
    SetMetadata {
        handle: EntityHandle,
        text: String,
    },
    Remove {
        handle: EntityHandle,
    },
}

/// Deterministic in-memory render surface.
///
/// Handles are sequential per surface, so a replay from a fresh surface is
/// reproducible. Doubles as the entity store behind the CLI inspector.
#[derive(Debug, Default)]
pub struct InMemorySurface {
    entities: HashMap<EntityHandle, Entity>,
    next_handle: EntityHandle,
    journal: Vec<SurfaceOp>,
}

impl InMemorySurface {
    /// Create an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Return a live entity by handle.
    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(&handle)
    }

    /// All live entities ordered by handle, for stable display.
    #[must_use]
    pub fn sorted_entities(&self) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> = self.entities.values().collect();
        entities.sort_by_key(|entity| entity.handle);
        entities
    }

    /// Every successful operation applied so far, in application order.
    #[must_use]
    pub fn journal(&self) -> &[SurfaceOp] {
        &self.journal
    }
}

impl RenderSurface for InMemorySurface {
    fn create_entity(
        &mut self,
        kind: EntityKind,
        position: GeoPoint,
        label: &str,
        style: &serde_json::Value,
    ) -> Result<EntityHandle, SurfaceError> {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.entities.insert(
            handle,
            Entity {
                handle,
                kind,
                position,
                label: label.to_owned(),
                style: style.clone(),
                metadata: None,
            },
        );
        self.journal.push(SurfaceOp::Create {
            handle,
            kind,
            position,
            label: label.to_owned(),
        });
        Ok(handle)
    }

    fn set_metadata(&mut self, handle: EntityHandle, text: &str) -> Result<(), SurfaceError> {
        let Some(entity) = self.entities.get_mut(&handle) else {
            return Err(SurfaceError::UnknownHandle(handle));
        };
        entity.metadata = Some(text.to_owned());
        self.journal.push(SurfaceOp::SetMetadata {
            handle,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn remove_entity(&mut self, handle: EntityHandle) -> Result<(), SurfaceError> {
        if self.entities.remove(&handle).is_none() {
            return Err(SurfaceError::UnknownHandle(handle));
        }
        self.journal.push(SurfaceOp::Remove { handle });
        Ok(())
    }
}
