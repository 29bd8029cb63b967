use tracing::{debug, info};

use crate::calendar::{snap_days, CalendarWindow, Day};
use crate::limits::MAX_STAY_DAYS;
use crate::model::*;
use crate::observability::{record_conflict, record_drag};

use super::{Scheduler, SchedulerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Drag the whole bar: changes room and/or dates, keeps the length.
    Move,
    /// Drag the right edge: changes the check-out day only.
    Resize,
}

impl Gesture {
    pub fn as_str(self) -> &'static str {
        match self {
            Gesture::Move => "move",
            Gesture::Resize => "resize",
        }
    }
}

/// Pointer position in timeline pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Everything captured at pointer-down. The reservation itself may change
/// underneath (a refresh, a settlement); the gesture is computed from these
/// values only.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub id: ReservationId,
    pub gesture: Gesture,
    pub origin: Point,
    pub room: RoomId,
    pub start: Day,
    pub nights: i64,
}

impl DragSession {
    pub fn capture(reservation: &Reservation, gesture: Gesture, origin: Point) -> Self {
        Self {
            id: reservation.id,
            gesture,
            origin,
            room: reservation.room.clone(),
            start: reservation.stay.start,
            nights: reservation.stay.nights(),
        }
    }

    pub fn original(&self) -> (RoomId, Stay) {
        (self.room.clone(), Stay::with_nights(self.start, self.nights))
    }

    pub fn day_delta(&self, pointer: Point, window: &CalendarWindow) -> i64 {
        snap_days(pointer.x - self.origin.x, window.cell_width)
    }

    /// Room and stay the reservation would get if released at `pointer`.
    /// `None` when the dates fall off the calendar.
    pub fn target(&self, pointer: Point, window: &CalendarWindow, catalog: &RoomCatalog) -> Option<(RoomId, Stay)> {
        let day_delta = self.day_delta(pointer, window);
        match self.gesture {
            Gesture::Move => {
                let room = window
                    .room_row_at(pointer.y, catalog.len())
                    .and_then(|row| catalog.get(row))
                    .cloned()
                    .unwrap_or_else(|| self.room.clone());
                let start = self.start.checked_add_days(day_delta)?;
                let end = start.checked_add_days(self.nights)?;
                Some((room, Stay::try_new(start, end)?))
            }
            Gesture::Resize => {
                let nights = self.nights.saturating_add(day_delta).max(1);
                let end = self.start.checked_add_days(nights)?;
                Some((self.room.clone(), Stay::try_new(self.start, end)?))
            }
        }
    }

    /// Visual feedback only.
    pub fn preview(&self, pointer: Point, window: &CalendarWindow, catalog: &RoomCatalog) -> DragPreview {
        let dx = pointer.x - self.origin.x;
        match self.gesture {
            Gesture::Move => DragPreview::Move {
                dx,
                dy: pointer.y - self.origin.y,
                row: window.room_row_at(pointer.y, catalog.len()),
            },
            Gesture::Resize => DragPreview::Resize {
                width: (self.nights as f64 * window.cell_width + dx).max(window.cell_width),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragPreview {
    /// Pixel offset of the bar from where it was picked up, and the row under the pointer.
    Move { dx: f64, dy: f64, row: Option<usize> },
    /// Bar width in pixels, never narrower than one cell.
    Resize { width: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Target range overlaps this reservation.
    Conflict(ReservationId),
    /// Released where it started, after snapping.
    NoChange,
    /// The reservation was deleted or cancelled mid-gesture.
    Vanished,
    /// The stay would run past the longest allowed, in nights.
    TooLong(i64),
    /// Released so far out that the dates are not representable.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    Committed {
        id: ReservationId,
        room: RoomId,
        stay: Stay,
    },
    Aborted {
        id: ReservationId,
        reason: AbortReason,
    },
}

impl DragOutcome {
    pub fn id(&self) -> ReservationId {
        match self {
            DragOutcome::Committed { id, .. } | DragOutcome::Aborted { id, .. } => *id,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, DragOutcome::Committed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DragOutcome::Committed { .. } => "committed",
            DragOutcome::Aborted { reason: AbortReason::Conflict(_), .. } => "conflict",
            DragOutcome::Aborted { reason: AbortReason::NoChange, .. } => "no_change",
            DragOutcome::Aborted { reason: AbortReason::Vanished, .. } => "vanished",
            DragOutcome::Aborted { reason: AbortReason::TooLong(_), .. } => "too_long",
            DragOutcome::Aborted { reason: AbortReason::OutOfRange, .. } => "out_of_range",
        }
    }
}

/// Holds the one drag session slot.
#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn begin(&mut self, session: DragSession) -> Result<(), SchedulerError> {
        if let Some(active) = &self.session {
            return Err(SchedulerError::DragInProgress(active.id));
        }
        self.session = Some(session);
        Ok(())
    }

    pub fn active(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Take the session for release. The slot is empty afterwards whatever
    /// the outcome.
    pub fn finish(&mut self) -> Result<DragSession, SchedulerError> {
        self.session.take().ok_or(SchedulerError::NoActiveDrag)
    }

    pub fn cancel(&mut self) -> Option<DragSession> {
        self.session.take()
    }
}

impl Scheduler {
    /// Pointer-down on a reservation bar.
    pub fn begin_drag(&mut self, id: ReservationId, gesture: Gesture, origin: Point) -> Result<(), SchedulerError> {
        let reservation = self.merged(&id).ok_or(SchedulerError::NotFound(id))?;
        self.drag.begin(DragSession::capture(&reservation, gesture, origin))?;
        debug!(%id, gesture = gesture.as_str(), "drag started");
        Ok(())
    }

    /// Pointer-move. Computes feedback only; nothing else changes.
    pub fn update_drag(&self, pointer: Point) -> Result<DragPreview, SchedulerError> {
        let session = self.drag.active().ok_or(SchedulerError::NoActiveDrag)?;
        Ok(session.preview(pointer, &self.window, &self.catalog))
    }

    /// Pointer-up. A clear target is applied optimistically and written in
    /// the background; anything else aborts with no side effects.
    pub fn end_drag(&mut self, pointer: Point) -> Result<DragOutcome, SchedulerError> {
        let session = self.drag.finish()?;
        let id = session.id;

        let outcome = match self.proposal(&session, pointer) {
            Err(reason) => DragOutcome::Aborted { id, reason },
            Ok((room, stay)) => {
                self.apply(id, ReservationPatch::placement(room.clone(), stay));
                DragOutcome::Committed { id, room, stay }
            }
        };

        record_drag(session.gesture, &outcome);
        match &outcome {
            DragOutcome::Committed { room, stay, .. } => {
                info!(%id, %room, %stay, gesture = session.gesture.as_str(), "drag committed");
            }
            DragOutcome::Aborted { reason, .. } => {
                debug!(%id, ?reason, gesture = session.gesture.as_str(), "drag aborted");
            }
        }
        Ok(outcome)
    }

    /// Where the released reservation would go, or why it stays put.
    fn proposal(&self, session: &DragSession, pointer: Point) -> Result<(RoomId, Stay), AbortReason> {
        let current = self.merged(&session.id).ok_or(AbortReason::Vanished)?;
        let (room, stay) = session
            .target(pointer, &self.window, &self.catalog)
            .ok_or(AbortReason::OutOfRange)?;
        if room == current.room && stay == current.stay {
            return Err(AbortReason::NoChange);
        }
        if stay.nights() > MAX_STAY_DAYS {
            return Err(AbortReason::TooLong(stay.nights()));
        }
        if let Some(other) = self.board.find_conflict(&room, &stay, Some(session.id)) {
            record_conflict("drag");
            return Err(AbortReason::Conflict(other));
        }
        Ok((room, stay))
    }

    /// Pointer-cancel or escape: drop the session without touching anything.
    pub fn cancel_drag(&mut self) -> Option<ReservationId> {
        self.drag.cancel().map(|s| s.id)
    }

    pub fn active_drag(&self) -> Option<&DragSession> {
        self.drag.active()
    }
}
