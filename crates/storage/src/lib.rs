mod error;
mod memory;
mod record;
mod traits;

#[cfg(feature = "airtable")]
pub mod airtable;
pub mod conformance;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{format_timestamp, Fields, Filter, Query, Record, Sort, SortDirection};
pub use traits::RecordStore;
