mod conflict;
mod error;
mod interaction;
mod mutations;
mod overlay;
mod queries;

pub use conflict::{Board, RoomLane};
pub use error::{SchedulerError, ValidationError};
pub use interaction::{AbortReason, DragOutcome, DragPreview, DragSession, Gesture, Point};
pub use mutations::Settlement;
pub use overlay::{Overlay, PendingWrite};
pub use queries::Placement;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::calendar::{CalendarWindow, Day};
use crate::limits::*;
use crate::model::*;
use crate::observability::{OVERLAY_PENDING, SNAPSHOT_RESERVATIONS};
use crate::store::{ReservationStore, StoreError};

use interaction::DragController;

/// Result of one background write, sent back to the scheduler.
pub(super) struct WriteOutcome {
    id: ReservationId,
    generation: u64,
    patch: ReservationPatch,
    result: Result<(), StoreError>,
}

/// The room timeline: cached snapshot, optimistic overlay, per-room index and
/// the drag controller, driven one UI event at a time through `&mut self`.
///
/// Writes run as spawned tasks; their outcomes come back over a channel and
/// are applied by [`poll_settled`](Self::poll_settled) or
/// [`settle`](Self::settle). Must be used inside a Tokio runtime.
pub struct Scheduler {
    catalog: RoomCatalog,
    window: CalendarWindow,
    store: Arc<dyn ReservationStore>,
    /// Last known remote state, active reservations only.
    snapshot: HashMap<ReservationId, Reservation>,
    overlay: Overlay,
    /// Index of what is displayed: snapshot with the overlay applied.
    board: Board,
    drag: DragController,
    outcome_tx: mpsc::Sender<WriteOutcome>,
    outcome_rx: mpsc::Receiver<WriteOutcome>,
    in_flight: usize,
    last_error: Option<SchedulerError>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        catalog: RoomCatalog,
        window: CalendarWindow,
    ) -> Result<Self, SchedulerError> {
        if catalog.is_empty() {
            return Err(SchedulerError::LimitExceeded("room catalog is empty"));
        }
        if catalog.len() > MAX_ROOMS {
            return Err(SchedulerError::LimitExceeded("too many rooms"));
        }
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        Ok(Self {
            catalog,
            window,
            store,
            snapshot: HashMap::new(),
            overlay: Overlay::new(),
            board: Board::new(),
            drag: DragController::default(),
            outcome_tx,
            outcome_rx,
            in_flight: 0,
            last_error: None,
        })
    }

    /// `new` followed by an initial [`refresh`](Self::refresh).
    pub async fn connect(
        store: Arc<dyn ReservationStore>,
        catalog: RoomCatalog,
        window: CalendarWindow,
    ) -> Result<Self, SchedulerError> {
        let mut scheduler = Self::new(store, catalog, window)?;
        scheduler.refresh().await?;
        Ok(scheduler)
    }

    pub fn catalog(&self) -> &RoomCatalog {
        &self.catalog
    }

    pub fn window(&self) -> &CalendarWindow {
        &self.window
    }

    pub fn navigate(&mut self, days: i64) {
        self.window.shift(days);
    }

    pub fn go_to(&mut self, day: Day) {
        self.window.go_to(day);
    }

    pub fn zoom(&mut self, cell_width: f64) {
        self.window.zoom(cell_width);
    }

    /// Pull a fresh snapshot from the store.
    pub async fn refresh(&mut self) -> Result<(), SchedulerError> {
        let rows = self.store.snapshot().await?;
        self.load_snapshot(rows);
        Ok(())
    }

    /// Replace the cached snapshot (pushed or pulled). Overlay entries the new
    /// rows already reflect are cleared; the rest keep winning.
    pub fn load_snapshot(&mut self, rows: Vec<Reservation>) {
        self.snapshot.clear();
        for row in rows {
            if !row.is_active() {
                continue;
            }
            if row.stay.start >= row.stay.end {
                warn!(id = %row.id, stay = %row.stay, "skipping reservation with empty stay");
                continue;
            }
            if !self.catalog.contains(&row.room) {
                warn!(id = %row.id, room = %row.room, "reservation in a room outside the catalog");
            }
            self.snapshot.insert(row.id, row);
        }

        let cleared = self.overlay.retain_unreflected(&self.snapshot);
        if cleared > 0 {
            debug!(cleared, "overlay entries reflected by snapshot");
        }
        self.rebuild_board();
        metrics::gauge!(SNAPSHOT_RESERVATIONS).set(self.snapshot.len() as f64);
        metrics::gauge!(OVERLAY_PENDING).set(self.overlay.len() as f64);
        info!(
            reservations = self.snapshot.len(),
            pending = self.overlay.len(),
            "snapshot loaded"
        );
    }

    /// Displayed state of one reservation: snapshot with its overlay entry
    /// applied. `None` if unknown or cancelled.
    pub(super) fn merged(&self, id: &ReservationId) -> Option<Reservation> {
        self.snapshot
            .get(id)
            .map(|base| self.overlay.merged(base))
            .filter(Reservation::is_active)
    }

    /// Bring the board in line with the displayed state of `id`.
    pub(super) fn reindex(&mut self, id: ReservationId) {
        match self.merged(&id) {
            Some(r) => self.board.place(&r),
            None => {
                self.board.remove(id);
            }
        }
    }

    fn rebuild_board(&mut self) {
        self.board.clear();
        for base in self.snapshot.values() {
            self.board.place(&self.overlay.merged(base));
        }
    }
}
