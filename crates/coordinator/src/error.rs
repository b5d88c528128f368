use planta_storage::StoreError;

use crate::access::Denial;

/// Errors returned by every coordinator operation.
///
/// Nothing is retried or recovered locally: store creates are not
/// idempotent, so every failure goes back to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A referenced shift, equipment, or record id does not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Ownership or role check failed. Carries who holds the active shift
    /// and since when, so the caller can explain the refusal.
    #[error("forbidden: {0}")]
    Forbidden(Denial),

    /// An On transition was attempted without every checklist item answered.
    #[error("startup checklist incomplete, missing: {}", .missing.join(", "))]
    IncompleteChecklist { missing: Vec<String> },

    /// `open_shift` found another shift still active.
    #[error("a shift is already active: {shift_id} opened by {owner} at {started_at}")]
    ShiftAlreadyActive {
        shift_id: String,
        owner: String,
        started_at: String,
    },

    /// `close_shift` targeted a shift that already has an end timestamp.
    #[error("shift {shift_id} was already closed at {ended_at}")]
    ShiftAlreadyClosed { shift_id: String, ended_at: String },

    /// The On state record was written but its checklist record was not.
    /// The startup is left without its audit trail and must be reconciled.
    #[error(
        "startup {state_record_id} of equipment {equipment_id} has no checklist record: {source}"
    )]
    PartialWriteInconsistency {
        equipment_id: String,
        state_record_id: String,
        #[source]
        source: StoreError,
    },

    /// A monitoring counter was NaN or infinite. Rejected before any write,
    /// since the store cannot hold it and the interval would stay open.
    #[error("invalid readings: {field} must be a finite number, got {value}")]
    InvalidReadings { field: &'static str, value: f64 },

    /// A stored row could not be decoded into its domain type.
    #[error("malformed {table} record {id}: {message}")]
    MalformedRecord {
        table: &'static str,
        id: String,
        message: String,
    },

    /// The record store rejected or failed a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    /// Map a store `NotFound` onto a domain `NotFound` for `kind`.
    pub(crate) fn from_lookup(err: StoreError, kind: &'static str) -> Self {
        match err {
            StoreError::NotFound { id, .. } => CoordinatorError::NotFound { kind, id },
            other => CoordinatorError::Store(other),
        }
    }
}
