//! Stateful navigator that replays a trace against a render surface.
//!
//! The cursor is the only mutable object in the engine. It holds a position
//! in `[0, trace.len()]` (position 0 means nothing applied, position N
//! means the first N events are applied) and moves one event at a time,
//! driving its surface through the event's forward or inverse mutation
//! list. Seeks are loops of single steps, never jumps: each event's
//! correctness depends on the handle state its neighbours left behind.

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;

use crate::event::{Mutation, Slot, TraceEvent};
use crate::surface::{EntityHandle, RenderSurface, SurfaceError};
use crate::trace::Trace;

/// Errors from cursor navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// The seek target lies outside `[0, trace.len()]`. No state changed.
    #[error("seek target {target} out of range for trace of length {len}")]
    OutOfRange { target: usize, len: usize },
    /// A navigation call was issued while another was in flight.
    #[error("navigation already in progress")]
    Busy,
    /// A mutation failed against the render surface. The offending event
    /// was rolled back; the cursor sits at the last consistent boundary.
    #[error("render surface rejected mutation: {0}")]
    Surface(#[from] SurfaceError),
}

/// Stateful pointer into a trace, driving a render surface as it moves.
///
/// The cursor takes its surface by value; pass `&mut surface` to keep
/// ownership in the host (the blanket [`RenderSurface`] impl for `&mut S`
/// covers that case). Either way the borrow rules give the cursor exclusive
/// access for its lifetime. On drop the cursor steps back to position 0 so
/// a closed debug view releases every entity it created.
pub struct Cursor<'t, S: RenderSurface> {
    trace: &'t Trace,
    surface: S,
    position: usize,
    /// Concrete handles produced per applied event, indexed by slot.
    /// Invariant: `applied.len() == position`.
    applied: Vec<Vec<EntityHandle>>,
    navigating: bool,
}

impl<'t, S: RenderSurface> Cursor<'t, S> {
    /// Create a cursor at position 0 over a validated trace.
    #[must_use]
    pub fn new(trace: &'t Trace, surface: S) -> Self {
        Self {
            trace,
            surface,
            position: 0,
            applied: Vec::new(),
            navigating: false,
        }
    }

    /// Number of events currently applied.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The trace this cursor navigates.
    #[must_use]
    pub fn trace(&self) -> &Trace {
        self.trace
    }

    /// Read access to the driven surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Apply the next event's forward list and advance.
    ///
    /// A cursor already at the end is a no-op returning the unchanged
    /// position; stepping past the last event is a debug affordance, not
    /// an error.
    ///
    /// # Errors
    ///
    /// [`CursorError::Busy`] if a navigation is already in flight;
    /// [`CursorError::Surface`] if the surface rejected a mutation (the
    /// event is rolled back and the position is unchanged).
    pub fn step_forward(&mut self) -> Result<usize, CursorError> {
        if self.navigating {
            return Err(CursorError::Busy);
        }
        self.navigating = true;
        let result = self.step_forward_inner();
        self.navigating = false;
        result.map(|()| self.position)
    }

    /// Apply the previous event's inverse list and retreat.
    ///
    /// A cursor already at position 0 is a no-op.
    ///
    /// # Errors
    ///
    /// [`CursorError::Busy`] if a navigation is already in flight;
    /// [`CursorError::Surface`] if the surface rejected a mutation (already
    /// undone mutations are restored and the position is unchanged).
    pub fn step_backward(&mut self) -> Result<usize, CursorError> {
        if self.navigating {
            return Err(CursorError::Busy);
        }
        self.navigating = true;
        let result = self.step_backward_inner();
        self.navigating = false;
        result.map(|()| self.position)
    }

    /// Walk to `target` one step at a time.
    ///
    /// # Errors
    ///
    /// [`CursorError::OutOfRange`] if `target > trace.len()` (no state
    /// change); [`CursorError::Busy`] if a navigation is already in flight;
    /// [`CursorError::Surface`] if a step failed (the cursor stops at the
    /// last fully applied boundary).
    pub fn seek(&mut self, target: usize) -> Result<usize, CursorError> {
        if self.navigating {
            return Err(CursorError::Busy);
        }
        let len = self.trace.len();
        if target > len {
            return Err(CursorError::OutOfRange { target, len });
        }
        self.navigating = true;
        tracing::debug!(from = self.position, to = target, "seek");
        let result = self.seek_inner(target);
        self.navigating = false;
        result.map(|()| self.position)
    }

    /// Step back to position 0, releasing every applied entity.
    ///
    /// # Errors
    ///
    /// Same as [`Cursor::seek`] with target 0.
    pub fn reset(&mut self) -> Result<usize, CursorError> {
        self.seek(0)
    }

    fn seek_inner(&mut self, target: usize) -> Result<(), CursorError> {
        while self.position < target {
            self.step_forward_inner()?;
        }
        while self.position > target {
            self.step_backward_inner()?;
        }
        Ok(())
    }

    fn step_forward_inner(&mut self) -> Result<(), CursorError> {
        let trace = self.trace;
        let Some(event) = trace.get(self.position) else {
            return Ok(());
        };
        let slots = self.apply_forward(event)?;
        self.applied.push(slots);
        self.position += 1;
        Ok(())
    }

    fn step_backward_inner(&mut self) -> Result<(), CursorError> {
        if self.position == 0 {
            return Ok(());
        }
        let trace = self.trace;
        let index = self.position - 1;
        let Some(event) = trace.get(index) else {
            return Ok(());
        };
        self.apply_inverse(event, index)?;
        self.applied.pop();
        self.position -= 1;
        Ok(())
    }

    /// Apply a forward list, recording the handle each creation produced.
    /// On failure the partially applied event is removed from the surface
    /// before the error is returned.
    fn apply_forward(&mut self, event: &TraceEvent) -> Result<Vec<EntityHandle>, SurfaceError> {
        let mut slots: Vec<EntityHandle> = Vec::new();
        let mut removed: Vec<usize> = Vec::new();
        for mutation in &event.forward {
            // Slot validity is guaranteed by Trace::from_events.
            let result = match mutation {
                Mutation::CreateEntity {
                    kind,
                    position,
                    label,
                    style,
                } => self
                    .surface
                    .create_entity(*kind, *position, label, style)
                    .map(|handle| slots.push(handle)),
                Mutation::SetMetadata { slot, text } => {
                    self.surface.set_metadata(slots[slot.0], text)
                }
                Mutation::RemoveEntity { slot } => self
                    .surface
                    .remove_entity(slots[slot.0])
                    .map(|()| removed.push(slot.0)),
            };
            if let Err(error) = result {
                self.rollback_partial_forward(&slots, &removed);
                return Err(error);
            }
        }
        Ok(slots)
    }

    /// Remove the entities a half-applied forward list created, newest
    /// first, skipping slots the forward list itself already removed.
    fn rollback_partial_forward(&mut self, slots: &[EntityHandle], removed: &[usize]) {
        for (slot, &handle) in slots.iter().enumerate().rev() {
            if removed.contains(&slot) {
                continue;
            }
            if let Err(error) = self.surface.remove_entity(handle) {
                tracing::error!(
                    handle,
                    error = %error,
                    "rollback of half-applied event failed; surface may retain a stray entity"
                );
            }
        }
    }

    /// Apply an inverse list with the event's recorded handles substituted.
    /// On failure the already-undone mutations are restored so the event
    /// stays fully applied.
    fn apply_inverse(&mut self, event: &TraceEvent, index: usize) -> Result<(), SurfaceError> {
        let mut undone: Vec<Slot> = Vec::new();
        for mutation in &event.inverse {
            let result = match mutation {
                Mutation::RemoveEntity { slot } => {
                    let handle = self.applied[index][slot.0];
                    self.surface
                        .remove_entity(handle)
                        .map(|()| undone.push(*slot))
                }
                Mutation::SetMetadata { slot, text } => {
                    let handle = self.applied[index][slot.0];
                    self.surface.set_metadata(handle, text)
                }
                // Rejected at validation; an inverse list never creates.
                Mutation::CreateEntity { .. } => Ok(()),
            };
            if let Err(error) = result {
                self.restore_partial_inverse(event, index, &undone);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Re-create the entities a half-applied inverse list removed, from the
    /// forward list's recorded creation parameters. Recreated entities get
    /// fresh handles; the slot table is updated to match.
    fn restore_partial_inverse(&mut self, event: &TraceEvent, index: usize, undone: &[Slot]) {
        for slot in undone.iter().rev() {
            self.recreate_slot(event, index, *slot);
        }
    }

    fn recreate_slot(&mut self, event: &TraceEvent, index: usize, slot: Slot) {
        let mut created = 0usize;
        let mut fresh: Option<EntityHandle> = None;
        for mutation in &event.forward {
            match mutation {
                Mutation::CreateEntity {
                    kind,
                    position,
                    label,
                    style,
                } => {
                    if created == slot.0 {
                        match self.surface.create_entity(*kind, *position, label, style) {
                            Ok(handle) => {
                                self.applied[index][slot.0] = handle;
                                fresh = Some(handle);
                            }
                            Err(error) => {
                                tracing::error!(
                                    slot = slot.0,
                                    error = %error,
                                    "could not restore entity after failed step back"
                                );
                                return;
                            }
                        }
                    }
                    created += 1;
                }
                Mutation::SetMetadata {
                    slot: meta_slot,
                    text,
                } if *meta_slot == slot => {
                    if let Some(handle) = fresh {
                        if let Err(error) = self.surface.set_metadata(handle, text) {
                            tracing::error!(
                                slot = slot.0,
                                error = %error,
                                "could not restore entity metadata after failed step back"
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl<S: RenderSurface> Drop for Cursor<'_, S> {
    fn drop(&mut self) {
        // A closing debug view must not leak entities into the surface.
        while self.position > 0 {
            if let Err(error) = self.step_backward_inner() {
                tracing::warn!(
                    position = self.position,
                    error = %error,
                    "cursor dropped without releasing all entities"
                );
                break;
            }
        }
    }
}
