use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{Fields, Query, Record};

/// The storage trait consumed by the Planta coordinator.
///
/// A `RecordStore` is a tabular store addressed by table name and record id.
/// The coordinator never assumes a particular wire format: everything it
/// persists goes through these four calls.
///
/// ## Write semantics
///
/// - `create` assigns the record id and returns the stored record.
/// - `update` merges the given fields into the existing record (PATCH
///   semantics). A JSON `null` value clears the field.
///
/// There are no multi-record transactions. Callers that need two writes to
/// behave as one unit must detect and surface partial failure themselves.
///
/// ## Query semantics
///
/// Filters support equality, blank checks, inclusive ranges, and AND. Sorting
/// is on one field; ties keep insertion order for ascending sorts and reverse
/// insertion order for descending sorts, so "latest wins" projections over
/// append-only tables resolve deterministically.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Insert a new record into `table`.
    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Merge `fields` into the record `id` of `table`.
    ///
    /// Returns `Err(StoreError::NotFound)` if the record does not exist.
    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Read a single record by id.
    ///
    /// Returns `Err(StoreError::NotFound)` if the record does not exist.
    async fn get(&self, table: &str, id: &str) -> Result<Record, StoreError>;

    /// Scan `table` with the given filter, sort, and limit.
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError>;
}
