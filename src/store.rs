use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(ReservationId),
    /// The store re-validated the write and found an overlapping reservation.
    Conflict(ReservationId),
    /// The store refused the payload itself.
    Rejected(String),
    /// Network or server failure; nothing was written.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "reservation not found: {id}"),
            StoreError::Conflict(id) => write!(f, "overlaps reservation {id}"),
            StoreError::Rejected(msg) => write!(f, "rejected: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The remote reservation store. The scheduler only ever talks to it through
/// this trait.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create(&self, draft: &ReservationDraft) -> Result<ReservationId, StoreError>;

    async fn update(&self, id: ReservationId, patch: &ReservationPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: ReservationId) -> Result<(), StoreError>;

    /// Current active (non-cancelled) reservations.
    async fn snapshot(&self) -> Result<Vec<Reservation>, StoreError>;
}

/// In-process store. Writes are serialized and re-checked against the
/// no-overlap invariant, so two schedulers sharing one `MemoryStore` cannot
/// both commit overlapping stays.
pub struct MemoryStore {
    reservations: DashMap<ReservationId, Reservation>,
    write_lock: Mutex<()>,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            reservations: DashMap::new(),
            write_lock: Mutex::new(()),
            offline: AtomicBool::new(false),
            latency: None,
        }
    }

    /// Seed with existing rows, unchecked.
    pub fn with_reservations(rows: impl IntoIterator<Item = Reservation>) -> Self {
        let store = Self::new();
        for r in rows {
            store.reservations.insert(r.id, r);
        }
        store
    }

    /// Seed from a JSON array of reservations, as exported by `snapshot`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<Reservation> = serde_json::from_str(json)?;
        Ok(Self::with_reservations(rows))
    }

    /// Delay every call by `latency` before it touches the data.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get(&self, id: &ReservationId) -> Option<Reservation> {
        self.reservations.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    async fn round_trip(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }

    fn check_no_overlap(&self, candidate: &Reservation) -> Result<(), StoreError> {
        if !candidate.is_active() {
            return Ok(());
        }
        for entry in self.reservations.iter() {
            let other = entry.value();
            if other.id != candidate.id
                && other.is_active()
                && other.room == candidate.room
                && other.stay.overlaps(&candidate.stay)
            {
                return Err(StoreError::Conflict(other.id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn create(&self, draft: &ReservationDraft) -> Result<ReservationId, StoreError> {
        self.round_trip().await?;
        let id = Ulid::new();
        let reservation = draft
            .to_reservation(id)
            .ok_or_else(|| StoreError::Rejected("start must be before end".into()))?;

        let _guard = self.write_lock.lock().await;
        self.check_no_overlap(&reservation)?;
        self.reservations.insert(id, reservation);
        Ok(id)
    }

    async fn update(&self, id: ReservationId, patch: &ReservationPatch) -> Result<(), StoreError> {
        self.round_trip().await?;
        let _guard = self.write_lock.lock().await;
        let current = self.get(&id).ok_or(StoreError::NotFound(id))?;
        let updated = patch.apply_to(&current);
        if updated.stay.start >= updated.stay.end {
            return Err(StoreError::Rejected("start must be before end".into()));
        }
        self.check_no_overlap(&updated)?;
        self.reservations.insert(id, updated);
        Ok(())
    }

    async fn delete(&self, id: ReservationId) -> Result<(), StoreError> {
        self.round_trip().await?;
        let _guard = self.write_lock.lock().await;
        self.reservations
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn snapshot(&self) -> Result<Vec<Reservation>, StoreError> {
        self.round_trip().await?;
        let mut rows: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().is_active())
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| (&a.room, a.stay.start).cmp(&(&b.room, b.stay.start)));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{parse_date, Day};

    fn d(s: &str) -> Day {
        parse_date(s).unwrap()
    }

    fn draft(room: &str, start: &str, end: &str) -> ReservationDraft {
        ReservationDraft {
            end: d(end),
            guest: Guest::new("Tanaka", "Hachi"),
            ..ReservationDraft::for_cell(room.into(), d(start))
        }
    }

    #[tokio::test]
    async fn create_then_snapshot() {
        let store = MemoryStore::new();
        let id = store.create(&draft("A", "2025-06-01", "2025-06-03")).await.unwrap();
        let rows = store.snapshot().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].guest.dog_name, "Hachi");
    }

    #[tokio::test]
    async fn create_revalidates_overlap() {
        let store = MemoryStore::new();
        let first = store.create(&draft("A", "2025-06-01", "2025-06-03")).await.unwrap();
        let result = store.create(&draft("A", "2025-06-02", "2025-06-04")).await;
        assert_eq!(result, Err(StoreError::Conflict(first)));
        // Adjacent and other-room stays are fine.
        store.create(&draft("A", "2025-06-03", "2025-06-05")).await.unwrap();
        store.create(&draft("B", "2025-06-02", "2025-06-04")).await.unwrap();
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn create_rejects_inverted_range() {
        let store = MemoryStore::new();
        let result = store.create(&draft("A", "2025-06-03", "2025-06-01")).await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_applies_patch_and_checks_overlap() {
        let store = MemoryStore::new();
        let a = store.create(&draft("A", "2025-06-01", "2025-06-03")).await.unwrap();
        let b = store.create(&draft("B", "2025-06-01", "2025-06-03")).await.unwrap();

        let onto_a = ReservationPatch::placement("A".into(), Stay::new(d("2025-06-02"), d("2025-06-04")));
        assert_eq!(store.update(b, &onto_a).await, Err(StoreError::Conflict(a)));
        assert_eq!(store.get(&b).unwrap().room, RoomId::from("B"));

        let after_a = ReservationPatch::placement("A".into(), Stay::new(d("2025-06-03"), d("2025-06-05")));
        store.update(b, &after_a).await.unwrap();
        assert_eq!(store.get(&b).unwrap().room, RoomId::from("A"));
    }

    #[tokio::test]
    async fn cancelled_rows_leave_snapshot_and_free_the_room() {
        let store = MemoryStore::new();
        let a = store.create(&draft("A", "2025-06-01", "2025-06-03")).await.unwrap();
        store.update(a, &ReservationPatch::status(Status::Cancelled)).await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
        store.create(&draft("A", "2025-06-01", "2025-06-03")).await.unwrap();
    }

    #[tokio::test]
    async fn missing_ids() {
        let store = MemoryStore::new();
        let id = Ulid::new();
        assert_eq!(store.delete(id).await, Err(StoreError::NotFound(id)));
        assert_eq!(
            store.update(id, &ReservationPatch::status(Status::Consulting)).await,
            Err(StoreError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn seeds_from_json() {
        let json = r#"[
            {"id": "01HZX0000000000000000000A1", "room": "A", "start": "2025-06-01", "end": "2025-06-03",
             "customer_name": "Ogawa", "dog_name": "Maru", "pickup": true},
            {"id": "01HZX0000000000000000000A2", "room": "A", "start": "2025/06/03", "end": "2025/06/04",
             "status": "cancelled", "customer_name": "Ogawa", "dog_name": "Maru"}
        ]"#;
        let store = MemoryStore::from_json(json).unwrap();
        assert_eq!(store.len(), 2);
        let rows = store.snapshot().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].pickup);
        assert!(MemoryStore::from_json("{}").is_err());
    }

    #[tokio::test]
    async fn offline_fails_everything() {
        let store = MemoryStore::new();
        let id = store.create(&draft("A", "2025-06-01", "2025-06-03")).await.unwrap();
        store.set_offline(true);
        assert!(matches!(store.delete(id).await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.snapshot().await, Err(StoreError::Unavailable(_))));
        store.set_offline(false);
        store.delete(id).await.unwrap();
    }
}
