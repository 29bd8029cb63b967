use crate::calendar::CalendarWindow;
use crate::directory::CustomerDirectory;
use crate::model::*;

use super::{Scheduler, SchedulerError};

/// A reservation positioned on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Snapshot with any pending overlay applied.
    pub reservation: Reservation,
    /// Index into the room catalog.
    pub row: usize,
    /// Left edge of the check-in day; negative when it starts before the window.
    pub x: f64,
    pub width: f64,
    /// Shown from an optimistic write the store has not confirmed yet.
    pub pending: bool,
}

impl Scheduler {
    /// Everything to draw for `window`: active reservations in catalog rooms
    /// that intersect it, by row and then by check-in day.
    pub fn current_view(&self, window: &CalendarWindow) -> Vec<Placement> {
        let Some(visible) = Stay::try_new(window.base, window.end()) else {
            return Vec::new();
        };
        let mut placements = Vec::new();
        for (row, room) in self.catalog.rooms().iter().enumerate() {
            let Some(lane) = self.board.lane(room) else {
                continue;
            };
            for (id, stay) in lane.overlapping(&visible) {
                let Some(reservation) = self.merged(id) else {
                    continue;
                };
                placements.push(Placement {
                    row,
                    x: window.to_coordinate(stay.start),
                    width: stay.nights() as f64 * window.cell_width,
                    pending: self.overlay.contains(id),
                    reservation,
                });
            }
        }
        placements
    }

    /// Displayed state of one active reservation.
    pub fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.merged(&id)
    }

    /// All active reservations as displayed, by room then check-in.
    pub fn reservations(&self) -> Vec<Reservation> {
        let mut all: Vec<Reservation> = self
            .snapshot
            .keys()
            .filter_map(|id| self.merged(id))
            .collect();
        all.sort_by(|a, b| (&a.room, a.stay.start).cmp(&(&b.room, b.stay.start)));
        all
    }

    /// Would `stay` in `room` overlap an active reservation other than `exclude`?
    pub fn overlaps(&self, room: &RoomId, stay: &Stay, exclude: Option<ReservationId>) -> bool {
        self.board.overlaps(room, stay, exclude)
    }

    /// Catalog rooms free for the whole of `stay`, in catalog order.
    pub fn vacant_rooms(&self, stay: &Stay) -> Vec<RoomId> {
        self.catalog
            .rooms()
            .iter()
            .filter(|room| !self.board.overlaps(room, stay, None))
            .cloned()
            .collect()
    }

    /// Pre-filled one-night draft for the grid cell under `(x, y)`, or `None`
    /// outside the grid or on an occupied cell.
    pub fn draft_at(&self, x: f64, y: f64) -> Option<ReservationDraft> {
        let day = self.window.day_at(x)?;
        let row = self.window.room_row_at(y, self.catalog.len())?;
        let room = self.catalog.get(row)?.clone();
        let draft = ReservationDraft::for_cell(room, day);
        let stay = draft.stay()?;
        (!self.board.overlaps(&draft.room, &stay, None)).then_some(draft)
    }

    pub async fn search_customers(
        &self,
        directory: &dyn CustomerDirectory,
        term: &str,
    ) -> Result<Vec<Guest>, SchedulerError> {
        Ok(directory.search(term).await?)
    }

    pub fn is_pending(&self, id: &ReservationId) -> bool {
        self.overlay.contains(id)
    }

    pub fn pending_count(&self) -> usize {
        self.overlay.len()
    }

    /// Writes issued but not yet settled (superseded ones included).
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Last refused form save, cleared by the next successful one.
    pub fn last_error(&self) -> Option<&SchedulerError> {
        self.last_error.as_ref()
    }
}
