use std::collections::HashMap;

use crate::model::*;

/// One optimistic mutation waiting on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Bumped on every apply; a settlement for an older generation is stale.
    pub generation: u64,
    pub patch: ReservationPatch,
}

/// Locally applied mutations keyed by reservation id, layered over the last
/// known snapshot. An entry wins over the snapshot field by field.
///
/// At most one write per id is on its way to the store. Mutations made
/// meanwhile fold into the entry and go out when that write settles.
#[derive(Debug, Default)]
pub struct Overlay {
    entries: HashMap<ReservationId, PendingWrite>,
    /// Generation of the write in flight, per id.
    sent: HashMap<ReservationId, u64>,
    next_generation: u64,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `patch` for `id`. A still-pending entry is superseded: its
    /// fields are folded under the new ones and the result gets a fresh
    /// generation, so the write issued next carries the whole local truth.
    ///
    /// Returns the write to send now, or `None` while an earlier write for
    /// `id` is in flight.
    pub fn apply(&mut self, id: ReservationId, patch: ReservationPatch) -> Option<PendingWrite> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let merged = match self.entries.remove(&id) {
            Some(mut older) => {
                older.patch.merge(patch);
                older.patch
            }
            None => patch,
        };
        let pending = PendingWrite {
            generation,
            patch: merged,
        };
        self.entries.insert(id, pending);
        self.dispatch(id)
    }

    /// Hand out the entry for `id` as the next write, unless one is already
    /// in flight or nothing is pending.
    pub fn dispatch(&mut self, id: ReservationId) -> Option<PendingWrite> {
        if self.sent.contains_key(&id) {
            return None;
        }
        let pending = self.entries.get(&id)?.clone();
        self.sent.insert(id, pending.generation);
        Some(pending)
    }

    pub fn in_flight(&self, id: &ReservationId) -> bool {
        self.sent.contains_key(id)
    }

    pub fn contains(&self, id: &ReservationId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_current(&self, id: &ReservationId, generation: u64) -> bool {
        self.entries
            .get(id)
            .is_some_and(|p| p.generation == generation)
    }

    /// The write at `generation` came back. Removes the entry for `id` only
    /// if nothing newer was applied since.
    pub fn settle(&mut self, id: &ReservationId, generation: u64) -> Option<ReservationPatch> {
        if self.sent.get(id) == Some(&generation) {
            self.sent.remove(id);
        }
        if !self.is_current(id, generation) {
            return None;
        }
        self.entries.remove(id).map(|p| p.patch)
    }

    /// Drop the entry unconditionally.
    pub fn discard(&mut self, id: &ReservationId) -> Option<PendingWrite> {
        self.entries.remove(id)
    }

    /// Overlay-wins merge of the entry for `base.id` onto `base`.
    pub fn merged(&self, base: &Reservation) -> Reservation {
        match self.entries.get(&base.id) {
            Some(pending) => pending.patch.apply_to(base),
            None => base.clone(),
        }
    }

    /// After a fresh snapshot: drop entries the snapshot already reflects or
    /// whose reservation is gone. Returns how many were dropped.
    pub fn retain_unreflected(&mut self, snapshot: &HashMap<ReservationId, Reservation>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, pending| {
            snapshot
                .get(id)
                .is_some_and(|row| !pending.patch.is_reflected_in(row))
        });
        before - self.entries.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ReservationId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
