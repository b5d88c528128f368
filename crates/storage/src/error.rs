/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No record with the given id exists in the table.
    #[error("record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    /// The store rejected the request with an explicit status code.
    #[error("store returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// A backend-specific failure (transport, serialization, poisoned lock, ...).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// HTTP-style status code for this error, if the backend reported one.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::NotFound { .. } => Some(404),
            StoreError::Status { status, .. } => Some(*status),
            StoreError::Backend(_) => None,
        }
    }
}
