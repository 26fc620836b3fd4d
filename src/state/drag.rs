//! Drag-and-drop reorder controller.
//!
//! SYSTEM CONTEXT
//! ==============
//! The controller turns pointer gestures into one `reorder_list` call. It
//! never computes sibling positions itself: it only picks the target slot and
//! lets the Kanban store ask the server to do the move.
//!
//! DESIGN
//! ======
//! Drop targets are slot markers, one per gap between a column's cards plus a
//! trailing one, each with a vertical offset. A renderer may supply measured
//! offsets; [`DropZones::for_column`] derives evenly pitched ones from the
//! ordered card list. The target is the marker nearest the pointer's y, with
//! ties going to the lower index. Hover resolution is throttled to one per
//! frame budget; the proxy position is updated on every move. A release
//! always resolves against the pointer position it was given, so moves
//! skipped by the throttle never decide where the card lands.
//!
//! Two index corrections apply inside the card's own column. While hovering,
//! the marker directly below the card (`p + 1`) is shown as `p`, since both
//! mean "leave it where it is". On commit, an index past the card's old slot
//! is shifted down by one because removing the card closes its gap.

#[cfg(test)]
#[path = "drag_test.rs"]
mod drag_test;

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::kanban::{KanbanState, KanbanStore};
use crate::error::ClientError;
use crate::net::api::KanbanApi;
use crate::net::types::Card;

// =============================================================================
// DROP ZONES
// =============================================================================

/// Slot markers of one column, in slot order.
#[derive(Clone, Debug, PartialEq)]
pub struct DropZones {
    column_id: String,
    offsets: Vec<f64>,
}

impl DropZones {
    /// Use offsets measured by whatever renders the column.
    #[must_use]
    pub fn measured(column_id: impl Into<String>, offsets: Vec<f64>) -> Self {
        Self { column_id: column_id.into(), offsets }
    }

    /// Derive `cards + 1` markers for a column laid out from `top`, one card
    /// every `pitch` units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn for_column(state: &KanbanState, column_id: &str, top: f64, pitch: f64) -> Self {
        let slots = state.column_cards(column_id).len() + 1;
        let offsets = (0..slots).map(|slot| top + slot as f64 * pitch).collect();
        Self::measured(column_id, offsets)
    }

    #[must_use]
    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    #[must_use]
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Index of the marker nearest to `y`, or `None` if there are none.
    #[must_use]
    pub fn nearest(&self, y: f64) -> Option<usize> {
        nearest_slot(&self.offsets, y)
    }
}

/// Nearest offset by absolute distance; the first index wins a tie.
#[must_use]
pub fn nearest_slot(offsets: &[f64], y: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, offset) in offsets.iter().enumerate() {
        let distance = (offset - y).abs();
        if best.is_none_or(|(_, closest)| distance < closest) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Hover correction: in the card's own column, the slot right after it is
/// reported as the card's own slot.
#[must_use]
pub fn adjust_hover_index(index: usize, same_column: bool, origin_position: i32) -> usize {
    let origin = usize::try_from(origin_position).ok();
    if same_column && origin.is_some_and(|origin| index == origin + 1) {
        index - 1
    } else {
        index
    }
}

/// Final target position for a drop at slot `index`.
#[must_use]
pub fn commit_position(index: usize, same_column: bool, origin_position: i32) -> i32 {
    let index = i32::try_from(index).unwrap_or(i32::MAX);
    if same_column && index > origin_position { index - 1 } else { index }
}

// =============================================================================
// FRAME THROTTLE
// =============================================================================

/// Admits at most one tick per `budget`.
#[derive(Clone, Debug)]
pub struct FrameThrottle {
    budget: Duration,
    last: Option<Instant>,
}

impl FrameThrottle {
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self { budget, last: None }
    }

    /// True if `now` starts a new frame; the frame is then consumed.
    pub fn admit(&mut self, now: Instant) -> bool {
        let due = self.last.is_none_or(|last| now.saturating_duration_since(last) >= self.budget);
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// State held while a card is being dragged.
#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub card_id: String,
    pub origin_column: String,
    pub origin_position: i32,
    /// Where the floating proxy is drawn.
    pub proxy: (f64, f64),
    pub drop_column: Option<String>,
    /// Hover-adjusted slot index within `drop_column`.
    pub drop_zone: Option<usize>,
}

impl DragSession {
    /// Resolve the hover-adjusted slot under `y` and record it as the target.
    fn retarget(&mut self, zones: &DropZones, y: f64) -> Option<usize> {
        let same_column = zones.column_id() == self.origin_column;
        let slot = zones
            .nearest(y)
            .map(|index| adjust_hover_index(index, same_column, self.origin_position));
        self.drop_column = Some(zones.column_id().to_owned());
        self.drop_zone = slot;
        slot
    }
}

/// A resolved drop, ready to hand to the Kanban store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderIntent {
    pub from_column: String,
    pub to_column: String,
    pub to_position: i32,
    pub card_id: String,
}

impl ReorderIntent {
    /// Ask the store to perform the move.
    ///
    /// # Errors
    ///
    /// Whatever `reorder_list` fails with.
    pub async fn commit<A: KanbanApi + ?Sized>(&self, store: &mut KanbanStore<A>) -> Result<(), ClientError> {
        store
            .reorder_list(&self.from_column, &self.to_column, self.to_position, &self.card_id)
            .await
    }
}

#[derive(Debug)]
pub struct DragController {
    session: Option<DragSession>,
    throttle: FrameThrottle,
}

impl DragController {
    #[must_use]
    pub fn new(frame_budget: Duration) -> Self {
        Self { session: None, throttle: FrameThrottle::new(frame_budget) }
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Pick up `card`, replacing any drag already in progress.
    pub fn begin(&mut self, card: &Card) {
        debug!(card_id = %card.id, column_id = %card.column_id, "drag started");
        self.throttle.reset();
        self.session = Some(DragSession {
            card_id: card.id.clone(),
            origin_column: card.column_id.clone(),
            origin_position: card.position,
            proxy: (0.0, 0.0),
            drop_column: None,
            drop_zone: None,
        });
    }

    /// Move the proxy while the pointer is off every column. Any hover target
    /// is cleared.
    pub fn move_proxy(&mut self, x: f64, y: f64) {
        if let Some(session) = self.session.as_mut() {
            session.proxy = (x, y);
            session.drop_column = None;
            session.drop_zone = None;
        }
    }

    /// Pointer moved over the column described by `zones`. Returns the
    /// hover slot, which only changes once per frame budget.
    pub fn pointer_moved(&mut self, x: f64, y: f64, zones: &DropZones, now: Instant) -> Option<usize> {
        let session = self.session.as_mut()?;
        session.proxy = (x, y);
        if !self.throttle.admit(now) {
            return session.drop_zone;
        }
        session.retarget(zones, y)
    }

    /// Drop the card with the pointer at `y` over the column `over`.
    ///
    /// The slot is resolved from this position, not from the last hover.
    /// Returns the move to perform and goes idle, or returns `None` and keeps
    /// dragging when the pointer is not over a column or the column has no
    /// slot markers.
    pub fn release(&mut self, y: f64, over: Option<&DropZones>) -> Option<ReorderIntent> {
        let session = self.session.as_mut()?;
        let Some(zones) = over else {
            debug!(card_id = %session.card_id, "release off every column ignored");
            return None;
        };
        let Some(zone) = session.retarget(zones, y) else {
            debug!(card_id = %session.card_id, column_id = %zones.column_id(), "release without a drop slot ignored");
            return None;
        };

        let same_column = zones.column_id() == session.origin_column;
        let intent = ReorderIntent {
            from_column: session.origin_column.clone(),
            to_column: zones.column_id().to_owned(),
            to_position: commit_position(zone, same_column, session.origin_position),
            card_id: session.card_id.clone(),
        };
        info!(
            card_id = %intent.card_id,
            from = %intent.from_column,
            to = %intent.to_column,
            position = intent.to_position,
            "drag released"
        );
        self.session = None;
        self.throttle.reset();
        Some(intent)
    }

    /// Abandon the drag. Returns whether one was in progress.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.session.take().is_some();
        if was_dragging {
            debug!("drag cancelled");
        }
        was_dragging
    }
}
