use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::observability::*;
use crate::store::StoreError;

use super::conflict::check_no_conflict;
use super::overlay::PendingWrite;
use super::{Scheduler, SchedulerError, ValidationError, WriteOutcome};

/// How one optimistic write ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The store accepted the write; the snapshot now carries it.
    Confirmed(ReservationId),
    /// The store refused or failed; the overlay entry is gone and the
    /// reservation shows its last known remote state again.
    RolledBack {
        id: ReservationId,
        error: SchedulerError,
    },
    /// A newer local mutation (or a delete) replaced this one before it settled.
    Superseded(ReservationId),
}

impl Settlement {
    pub fn id(&self) -> ReservationId {
        match self {
            Settlement::Confirmed(id) | Settlement::Superseded(id) => *id,
            Settlement::RolledBack { id, .. } => *id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Settlement::Confirmed(_) => "confirmed",
            Settlement::RolledBack { .. } => "rolled_back",
            Settlement::Superseded(_) => "superseded",
        }
    }
}

impl Scheduler {
    /// Create/edit form submit. Creates when `draft.id` is `None`, updates
    /// otherwise.
    pub async fn save(&mut self, draft: ReservationDraft) -> Result<ReservationId, SchedulerError> {
        match draft.id {
            None => self.create_reservation(draft).await,
            Some(id) => self.update_reservation(id, draft).map(|()| id),
        }
    }

    /// Validate, then create through the store and add the new row to the
    /// cached snapshot.
    pub async fn create_reservation(&mut self, mut draft: ReservationDraft) -> Result<ReservationId, SchedulerError> {
        draft.id = None;
        let result = self.create_checked(&draft).await;
        self.track(result)
    }

    async fn create_checked(&mut self, draft: &ReservationDraft) -> Result<ReservationId, SchedulerError> {
        self.validate(draft)?;
        let id = self.store.create(draft).await.inspect_err(|e| {
            if matches!(e, StoreError::Conflict(_)) {
                record_conflict("store");
            }
        })?;
        if let Some(row) = draft.to_reservation(id)
            && row.is_active()
        {
            self.snapshot.insert(id, row);
            self.reindex(id);
        }
        info!(%id, room = %draft.room, start = %draft.start, end = %draft.end, "reservation created");
        Ok(id)
    }

    /// Validate the edited field set and apply the difference optimistically.
    pub fn update_reservation(&mut self, id: ReservationId, mut draft: ReservationDraft) -> Result<(), SchedulerError> {
        draft.id = Some(id);
        let result = self.update_checked(id, &draft);
        self.track(result)
    }

    fn update_checked(&mut self, id: ReservationId, draft: &ReservationDraft) -> Result<(), SchedulerError> {
        let current = self.merged(&id).ok_or(SchedulerError::NotFound(id))?;
        self.validate(draft)?;
        let updated = draft
            .to_reservation(id)
            .ok_or(SchedulerError::Validation(ValidationError::EmptyStay))?;
        let patch = ReservationPatch::between(&current, &updated);
        if !patch.is_empty() {
            self.apply(id, patch);
        }
        Ok(())
    }

    /// Soft delete: status becomes cancelled through the optimistic path, so
    /// the room is free immediately.
    pub fn cancel_reservation(&mut self, id: ReservationId) -> Result<(), SchedulerError> {
        if self.merged(&id).is_none() {
            return Err(SchedulerError::NotFound(id));
        }
        self.apply(id, ReservationPatch::status(Status::Cancelled));
        info!(%id, "reservation cancelled");
        Ok(())
    }

    /// Hard delete, awaited. Any pending overlay entry is dropped first; a
    /// write still in flight for it will settle as superseded.
    pub async fn delete_reservation(&mut self, id: ReservationId) -> Result<(), SchedulerError> {
        if self.merged(&id).is_none() {
            return Err(SchedulerError::NotFound(id));
        }
        if self.overlay.discard(&id).is_some() {
            self.reindex(id);
            metrics::gauge!(OVERLAY_PENDING).set(self.overlay.len() as f64);
        }

        match self.store.delete(id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                self.snapshot.remove(&id);
                self.board.remove(id);
                info!(%id, "reservation deleted");
                Ok(())
            }
            Err(e) => {
                warn!(%id, error = %e, "delete failed");
                Err(e.into())
            }
        }
    }

    /// Required fields, date order, limits, then overlap with anything
    /// displayed in the target room other than the reservation itself.
    pub(super) fn validate(&self, draft: &ReservationDraft) -> Result<Stay, SchedulerError> {
        if draft.guest.customer_name.trim().is_empty() {
            return Err(ValidationError::MissingCustomer.into());
        }
        let stay = draft.stay().ok_or(ValidationError::EmptyStay)?;
        if !self.catalog.contains(&draft.room) {
            return Err(ValidationError::UnknownRoom(draft.room.clone()).into());
        }
        if stay.nights() > MAX_STAY_DAYS {
            return Err(ValidationError::StayTooLong {
                stay,
                max_nights: MAX_STAY_DAYS,
            }
            .into());
        }
        if draft.guest.customer_name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::FieldTooLong("customer name").into());
        }
        if draft.guest.dog_name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::FieldTooLong("dog name").into());
        }
        if draft.memo.chars().count() > MAX_MEMO_LEN {
            return Err(ValidationError::FieldTooLong("memo").into());
        }
        if draft.status.is_active() {
            check_no_conflict(&self.board, &draft.room, &stay, draft.id).inspect_err(|_| record_conflict("form"))?;
        }
        Ok(stay)
    }

    /// Remember the outcome of a form save; success clears the error state.
    fn track<T>(&mut self, result: Result<T, SchedulerError>) -> Result<T, SchedulerError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                if let SchedulerError::Validation(v) = e {
                    metrics::counter!(VALIDATION_FAILURES_TOTAL, "kind" => v.kind()).increment(1);
                }
                debug!(error = %e, "save refused");
                self.last_error = Some(e.clone());
            }
        }
        result
    }

    /// Put `patch` in the overlay now and write it in the background. If a
    /// write for `id` is still out, the merged entry is sent once it settles,
    /// so the store sees writes for one reservation in order.
    pub(super) fn apply(&mut self, id: ReservationId, patch: ReservationPatch) {
        let ready = self.overlay.apply(id, patch);
        self.reindex(id);
        match ready {
            Some(pending) => self.spawn_write(id, pending),
            None => debug!(%id, "write queued behind one in flight"),
        }
        metrics::gauge!(OVERLAY_PENDING).set(self.overlay.len() as f64);
    }

    /// Fold a confirmed patch into the last known remote state.
    fn promote(&mut self, id: ReservationId, patch: &ReservationPatch) {
        if let Some(base) = self.snapshot.get(&id) {
            let promoted = patch.apply_to(base);
            if promoted.is_active() {
                self.snapshot.insert(id, promoted);
            } else {
                self.snapshot.remove(&id);
            }
        }
    }

    fn spawn_write(&mut self, id: ReservationId, pending: PendingWrite) {
        let store = Arc::clone(&self.store);
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;
        metrics::counter!(OPTIMISTIC_WRITES_TOTAL).increment(1);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = store.update(id, &pending.patch).await;
            metrics::histogram!(WRITE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
            // Receiver gone means the scheduler was dropped; nobody to tell.
            let _ = tx
                .send(WriteOutcome {
                    id,
                    generation: pending.generation,
                    patch: pending.patch,
                    result,
                })
                .await;
        });
    }

    /// Apply every write outcome that has already arrived, without waiting.
    pub fn poll_settled(&mut self) -> Vec<Settlement> {
        let mut settled = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            settled.push(self.settle_one(outcome));
        }
        settled
    }

    /// Wait until every write issued so far has settled.
    pub async fn settle(&mut self) -> Vec<Settlement> {
        let mut settled = self.poll_settled();
        while self.in_flight > 0 {
            match self.outcome_rx.recv().await {
                Some(outcome) => settled.push(self.settle_one(outcome)),
                None => break,
            }
        }
        settled
    }

    fn settle_one(&mut self, outcome: WriteOutcome) -> Settlement {
        self.in_flight = self.in_flight.saturating_sub(1);
        let WriteOutcome {
            id,
            generation,
            patch,
            result,
        } = outcome;
        let current = self.overlay.settle(&id, generation).is_some();

        let settlement = match result {
            Ok(()) if current => {
                self.promote(id, &patch);
                self.reindex(id);
                Settlement::Confirmed(id)
            }
            Ok(()) => {
                // The store holds this older write now. Keep the snapshot in
                // step so a failure of the newer one rolls back to it.
                if self.overlay.contains(&id) {
                    self.promote(id, &patch);
                }
                debug!(%id, generation, "superseded write settled");
                Settlement::Superseded(id)
            }
            Err(e) if current => {
                if matches!(e, StoreError::NotFound(_)) {
                    self.snapshot.remove(&id);
                }
                if matches!(e, StoreError::Conflict(_)) {
                    record_conflict("store");
                }
                self.reindex(id);
                let error = SchedulerError::from(e);
                metrics::counter!(ROLLBACKS_TOTAL, "kind" => error.kind()).increment(1);
                warn!(%id, %error, "optimistic write rolled back");
                Settlement::RolledBack { id, error }
            }
            Err(e) => {
                debug!(%id, generation, error = %e, "superseded write failed");
                Settlement::Superseded(id)
            }
        };

        // A newer mutation waited for this write; send it now.
        if let Some(next) = self.overlay.dispatch(id) {
            self.spawn_write(id, next);
        }

        metrics::counter!(SETTLEMENTS_TOTAL, "result" => settlement.label()).increment(1);
        metrics::gauge!(OVERLAY_PENDING).set(self.overlay.len() as f64);
        settlement
    }
}
