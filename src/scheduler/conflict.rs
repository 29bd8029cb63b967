use std::collections::HashMap;

use crate::model::*;

use super::SchedulerError;

/// One room's active stays, sorted by `stay.start`.
#[derive(Debug, Clone, Default)]
pub struct RoomLane {
    entries: Vec<(ReservationId, Stay)>,
}

impl RoomLane {
    /// Insert maintaining sort order by start.
    pub fn insert(&mut self, id: ReservationId, stay: Stay) {
        let pos = self
            .entries
            .binary_search_by_key(&stay.start, |(_, s)| s.start)
            .unwrap_or_else(|e| e);
        self.entries.insert(pos, (id, stay));
    }

    pub fn remove(&mut self, id: ReservationId) -> Option<Stay> {
        let pos = self.entries.iter().position(|(rid, _)| *rid == id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Stays that overlap `query`. Everything from the first entry starting on
    /// or after `query.end` onward is skipped without being looked at.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &(ReservationId, Stay)> {
        let right_bound = self.entries.partition_point(|(_, s)| s.start < query.end);
        self.entries[..right_bound]
            .iter()
            .filter(move |(_, s)| s.end > query.start)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ReservationId, Stay)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Room-indexed view of every active reservation as currently displayed
/// (snapshot with the overlay applied).
#[derive(Debug, Default)]
pub struct Board {
    lanes: HashMap<RoomId, RoomLane>,
    /// Reverse lookup: reservation id → room it occupies.
    placed: HashMap<ReservationId, RoomId>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)index one reservation. Cancelled ones are dropped from the board.
    pub fn place(&mut self, reservation: &Reservation) {
        self.remove(reservation.id);
        if !reservation.is_active() {
            return;
        }
        self.lanes
            .entry(reservation.room.clone())
            .or_default()
            .insert(reservation.id, reservation.stay);
        self.placed.insert(reservation.id, reservation.room.clone());
    }

    pub fn remove(&mut self, id: ReservationId) -> Option<Stay> {
        let room = self.placed.remove(&id)?;
        self.lanes.get_mut(&room).and_then(|lane| lane.remove(id))
    }

    pub fn clear(&mut self) {
        self.lanes.clear();
        self.placed.clear();
    }

    pub fn lane(&self, room: &RoomId) -> Option<&RoomLane> {
        self.lanes.get(room)
    }

    pub fn room_of(&self, id: &ReservationId) -> Option<&RoomId> {
        self.placed.get(id)
    }

    /// First active reservation in `room` overlapping `stay`, ignoring `exclude`.
    /// Only that room's lane is scanned.
    pub fn find_conflict(
        &self,
        room: &RoomId,
        stay: &Stay,
        exclude: Option<ReservationId>,
    ) -> Option<ReservationId> {
        self.lanes
            .get(room)?
            .overlapping(stay)
            .find(|(id, _)| Some(*id) != exclude)
            .map(|(id, _)| *id)
    }

    pub fn overlaps(&self, room: &RoomId, stay: &Stay, exclude: Option<ReservationId>) -> bool {
        self.find_conflict(room, stay, exclude).is_some()
    }
}

pub(crate) fn check_no_conflict(
    board: &Board,
    room: &RoomId,
    stay: &Stay,
    exclude: Option<ReservationId>,
) -> Result<(), SchedulerError> {
    match board.find_conflict(room, stay, exclude) {
        Some(other) => Err(SchedulerError::Conflict(other)),
        None => Ok(()),
    }
}
