use std::fmt;

use crate::model::{ReservationId, RoomId, Stay};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingCustomer,
    /// `start >= end`.
    EmptyStay,
    UnknownRoom(RoomId),
    StayTooLong { stay: Stay, max_nights: i64 },
    FieldTooLong(&'static str),
    /// The store refused the payload.
    Rejected(String),
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingCustomer => "missing_customer",
            ValidationError::EmptyStay => "empty_stay",
            ValidationError::UnknownRoom(_) => "unknown_room",
            ValidationError::StayTooLong { .. } => "stay_too_long",
            ValidationError::FieldTooLong(_) => "field_too_long",
            ValidationError::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingCustomer => write!(f, "customer name is required"),
            ValidationError::EmptyStay => write!(f, "check-in must be before check-out"),
            ValidationError::UnknownRoom(room) => write!(f, "unknown room: {room}"),
            ValidationError::StayTooLong { stay, max_nights } => {
                write!(f, "stay {stay} is longer than {max_nights} nights")
            }
            ValidationError::FieldTooLong(field) => write!(f, "{field} is too long"),
            ValidationError::Rejected(msg) => write!(f, "rejected by store: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    Validation(ValidationError),
    Conflict(ReservationId),
    NotFound(ReservationId),
    Persistence(String),
    DragInProgress(ReservationId),
    NoActiveDrag,
    LimitExceeded(&'static str),
}

impl SchedulerError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::Validation(_) => "validation",
            SchedulerError::Conflict(_) => "conflict",
            SchedulerError::NotFound(_) => "not_found",
            SchedulerError::Persistence(_) => "persistence",
            SchedulerError::DragInProgress(_) => "drag_in_progress",
            SchedulerError::NoActiveDrag => "no_active_drag",
            SchedulerError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Validation(e) => write!(f, "invalid reservation: {e}"),
            SchedulerError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            SchedulerError::NotFound(id) => write!(f, "not found: {id}"),
            SchedulerError::Persistence(e) => write!(f, "persistence error: {e}"),
            SchedulerError::DragInProgress(id) => {
                write!(f, "a drag of reservation {id} is already in progress")
            }
            SchedulerError::NoActiveDrag => write!(f, "no drag in progress"),
            SchedulerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<ValidationError> for SchedulerError {
    fn from(e: ValidationError) -> Self {
        SchedulerError::Validation(e)
    }
}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => SchedulerError::NotFound(id),
            StoreError::Conflict(id) => SchedulerError::Conflict(id),
            StoreError::Rejected(msg) => SchedulerError::Validation(ValidationError::Rejected(msg)),
            StoreError::Unavailable(msg) => SchedulerError::Persistence(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn store_errors_map_to_scheduler_kinds() {
        let id = Ulid::new();
        let cases = [
            (StoreError::NotFound(id), "not_found"),
            (StoreError::Conflict(id), "conflict"),
            (StoreError::Rejected("bad row".into()), "validation"),
            (StoreError::Unavailable("down".into()), "persistence"),
        ];
        for (store_error, kind) in cases {
            assert_eq!(SchedulerError::from(store_error).kind(), kind);
        }
    }
}
