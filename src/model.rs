use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::Day;

pub type ReservationId = Ulid;

/// Identifier of one bookable room, as listed in the room catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, fixed set of rooms. Row `i` of the timeline is `rooms()[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCatalog {
    rooms: Vec<RoomId>,
}

impl RoomCatalog {
    /// Duplicate ids are dropped, keeping the first occurrence.
    pub fn new<R: Into<RoomId>>(rooms: impl IntoIterator<Item = R>) -> Self {
        let mut unique: Vec<RoomId> = Vec::new();
        for room in rooms {
            let room = room.into();
            if !unique.contains(&room) {
                unique.push(room);
            }
        }
        Self { rooms: unique }
    }

    pub fn rooms(&self) -> &[RoomId] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&RoomId> {
        self.rooms.get(row)
    }

    pub fn index_of(&self, room: &RoomId) -> Option<usize> {
        self.rooms.iter().position(|r| r == room)
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.index_of(room).is_some()
    }
}

/// Half-open day range `[start, end)`. `end` is the check-out day, free for
/// the next guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub start: Day,
    pub end: Day,
}

impl Stay {
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start < end, "Stay start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn try_new(start: Day, end: Day) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Stay of `nights` (at least one) beginning on `start`.
    pub fn with_nights(start: Day, nights: i64) -> Self {
        Self::new(start, start.add_days(nights.max(1)))
    }

    pub fn nights(&self) -> i64 {
        self.start.days_until(self.end)
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_day(&self, day: Day) -> bool {
        self.start <= day && day < self.end
    }
}

impl fmt::Display for Stay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Consulting,
    #[default]
    Confirmed,
    Cancelled,
}

impl Status {
    /// Cancelled reservations occupy nothing.
    pub fn is_active(self) -> bool {
        !matches!(self, Status::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Consulting => "consulting",
            Status::Confirmed => "confirmed",
            Status::Cancelled => "cancelled",
        }
    }
}

/// Customer and dog identity. Opaque to scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Guest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub customer_name: String,
    #[serde(default)]
    pub dog_name: String,
}

impl Guest {
    pub fn new(customer_name: impl Into<String>, dog_name: impl Into<String>) -> Self {
        Self {
            customer_id: None,
            customer_name: customer_name.into(),
            dog_name: dog_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room: RoomId,
    #[serde(flatten)]
    pub stay: Stay,
    #[serde(default)]
    pub status: Status,
    #[serde(flatten)]
    pub guest: Guest,
    #[serde(default)]
    pub memo: String,
    /// Owner asked us to pick the dog up.
    #[serde(default)]
    pub pickup: bool,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Partial field set: `None` leaves the field untouched.
///
/// This is both the optimistic overlay entry and the payload of a
/// persistence `update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stay: Option<Stay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<Guest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<bool>,
}

impl ReservationPatch {
    pub fn placement(room: RoomId, stay: Stay) -> Self {
        Self {
            room: Some(room),
            stay: Some(stay),
            ..Self::default()
        }
    }

    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// The fields of `new` that differ from `old`.
    pub fn between(old: &Reservation, new: &Reservation) -> Self {
        fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
            (old != new).then(|| new.clone())
        }
        Self {
            room: changed(&old.room, &new.room),
            stay: changed(&old.stay, &new.stay),
            status: changed(&old.status, &new.status),
            guest: changed(&old.guest, &new.guest),
            memo: changed(&old.memo, &new.memo),
            pickup: changed(&old.pickup, &new.pickup),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay-wins merge: every field set on the patch replaces the base value.
    pub fn apply_to(&self, base: &Reservation) -> Reservation {
        let mut merged = base.clone();
        if let Some(room) = &self.room {
            merged.room = room.clone();
        }
        if let Some(stay) = self.stay {
            merged.stay = stay;
        }
        if let Some(status) = self.status {
            merged.status = status;
        }
        if let Some(guest) = &self.guest {
            merged.guest = guest.clone();
        }
        if let Some(memo) = &self.memo {
            merged.memo = memo.clone();
        }
        if let Some(pickup) = self.pickup {
            merged.pickup = pickup;
        }
        merged
    }

    /// Fold a newer patch into this one; the newer value wins field by field.
    pub fn merge(&mut self, newer: ReservationPatch) {
        if newer.room.is_some() {
            self.room = newer.room;
        }
        if newer.stay.is_some() {
            self.stay = newer.stay;
        }
        if newer.status.is_some() {
            self.status = newer.status;
        }
        if newer.guest.is_some() {
            self.guest = newer.guest;
        }
        if newer.memo.is_some() {
            self.memo = newer.memo;
        }
        if newer.pickup.is_some() {
            self.pickup = newer.pickup;
        }
    }

    /// True when `reservation` already carries every value this patch sets.
    pub fn is_reflected_in(&self, reservation: &Reservation) -> bool {
        self.apply_to(reservation) == *reservation
    }
}

/// Edit buffer behind the create/edit form. Every field has a value from
/// construction onward; `id` is `None` for a reservation not yet created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationDraft {
    pub id: Option<ReservationId>,
    pub room: RoomId,
    pub start: Day,
    pub end: Day,
    pub status: Status,
    pub guest: Guest,
    pub memo: String,
    pub pickup: bool,
}

impl ReservationDraft {
    /// One night in `room` starting on `day`, as pre-filled from an empty grid cell.
    pub fn for_cell(room: RoomId, day: Day) -> Self {
        Self {
            id: None,
            room,
            start: day,
            end: day.add_days(1),
            status: Status::default(),
            guest: Guest::default(),
            memo: String::new(),
            pickup: false,
        }
    }

    /// Pre-filled from a customer lookup.
    pub fn for_guest(guest: Guest, room: RoomId, start: Day) -> Self {
        Self {
            guest,
            ..Self::for_cell(room, start)
        }
    }

    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            id: Some(reservation.id),
            room: reservation.room.clone(),
            start: reservation.stay.start,
            end: reservation.stay.end,
            status: reservation.status,
            guest: reservation.guest.clone(),
            memo: reservation.memo.clone(),
            pickup: reservation.pickup,
        }
    }

    pub fn stay(&self) -> Option<Stay> {
        Stay::try_new(self.start, self.end)
    }

    /// Materialize under `id`. `None` if the date range is empty or inverted.
    pub fn to_reservation(&self, id: ReservationId) -> Option<Reservation> {
        Some(Reservation {
            id,
            room: self.room.clone(),
            stay: self.stay()?,
            status: self.status,
            guest: self.guest.clone(),
            memo: self.memo.clone(),
            pickup: self.pickup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_date;

    fn d(s: &str) -> Day {
        parse_date(s).unwrap()
    }

    fn stay(start: &str, end: &str) -> Stay {
        Stay::new(d(start), d(end))
    }

    fn reservation() -> Reservation {
        Reservation {
            id: Ulid::new(),
            room: RoomId::from("A"),
            stay: stay("2025-06-01", "2025-06-03"),
            status: Status::Confirmed,
            guest: Guest::new("Sato", "Pochi"),
            memo: String::new(),
            pickup: false,
        }
    }

    #[test]
    fn stay_basics() {
        let s = stay("2025-06-01", "2025-06-03");
        assert_eq!(s.nights(), 2);
        assert!(s.contains_day(d("2025-06-01")));
        assert!(s.contains_day(d("2025-06-02")));
        assert!(!s.contains_day(d("2025-06-03"))); // check-out day is free
        assert_eq!(s.to_string(), "2025-06-01..2025-06-03");
    }

    #[test]
    fn stay_overlap() {
        let a = stay("2025-06-01", "2025-06-03");
        let b = stay("2025-06-02", "2025-06-04");
        let c = stay("2025-06-03", "2025-06-05");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // same-day check-out/check-in
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn stay_try_new_rejects_empty() {
        assert!(Stay::try_new(d("2025-06-01"), d("2025-06-01")).is_none());
        assert!(Stay::try_new(d("2025-06-02"), d("2025-06-01")).is_none());
        assert_eq!(Stay::with_nights(d("2025-06-01"), 0).nights(), 1);
        assert_eq!(Stay::with_nights(d("2025-06-01"), 3).end, d("2025-06-04"));
    }

    #[test]
    fn catalog_keeps_order_and_drops_duplicates() {
        let catalog = RoomCatalog::new(["B", "A", "B", "C"]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.index_of(&"A".into()), Some(1));
        assert_eq!(catalog.get(2), Some(&RoomId::from("C")));
        assert!(!catalog.contains(&"D".into()));
    }

    #[test]
    fn patch_overlay_wins() {
        let base = reservation();
        let patch = ReservationPatch::placement("B".into(), stay("2025-06-05", "2025-06-07"));
        let merged = patch.apply_to(&base);
        assert_eq!(merged.room, RoomId::from("B"));
        assert_eq!(merged.stay, stay("2025-06-05", "2025-06-07"));
        assert_eq!(merged.guest, base.guest); // untouched fields survive
        assert!(patch.is_reflected_in(&merged));
        assert!(!patch.is_reflected_in(&base));
    }

    #[test]
    fn patch_merge_newer_wins() {
        let mut older = ReservationPatch::placement("B".into(), stay("2025-06-05", "2025-06-07"));
        older.merge(ReservationPatch {
            stay: Some(stay("2025-06-05", "2025-06-06")),
            memo: Some("late arrival".into()),
            ..ReservationPatch::default()
        });
        assert_eq!(older.room, Some(RoomId::from("B")));
        assert_eq!(older.stay, Some(stay("2025-06-05", "2025-06-06")));
        assert_eq!(older.memo.as_deref(), Some("late arrival"));
    }

    #[test]
    fn patch_between_only_changed_fields() {
        let old = reservation();
        let mut new = old.clone();
        new.memo = "allergic to chicken".into();
        new.pickup = true;
        let patch = ReservationPatch::between(&old, &new);
        assert_eq!(patch.memo.as_deref(), Some("allergic to chicken"));
        assert_eq!(patch.pickup, Some(true));
        assert!(patch.room.is_none() && patch.stay.is_none() && patch.guest.is_none());
        assert!(ReservationPatch::between(&old, &old).is_empty());
    }

    #[test]
    fn draft_defaults() {
        let draft = ReservationDraft::for_cell("A".into(), d("2025-06-01"));
        assert_eq!(draft.end, d("2025-06-02"));
        assert_eq!(draft.status, Status::Confirmed);
        assert!(draft.guest.customer_name.is_empty());
        assert!(draft.id.is_none());

        let r = reservation();
        let edit = ReservationDraft::from_reservation(&r);
        assert_eq!(edit.to_reservation(r.id), Some(r));
    }

    #[test]
    fn reservation_json_shape() {
        let json = r#"{
            "id": "01J0000000000000000000000A",
            "room": "A",
            "start": "2025-06-01T10:00:00+09:00",
            "end": "2025-06-03",
            "customer_name": "Sato",
            "dog_name": "Pochi"
        }"#;
        let r: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(r.stay, stay("2025-06-01", "2025-06-03"));
        assert_eq!(r.status, Status::Confirmed);
        assert!(!r.pickup);
        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out["start"], "2025-06-01");
        assert_eq!(out["status"], "confirmed");
    }
}
