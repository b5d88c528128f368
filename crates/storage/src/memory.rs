//! In-process record store.
//!
//! Tables are plain vectors guarded by a mutex; every row carries an
//! insertion sequence number so sorts with equal keys stay deterministic.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::record::{compare_values, format_timestamp, Fields, Query, Record, SortDirection};
use crate::traits::RecordStore;

/// Length of the random part of generated record ids.
const ID_SUFFIX_LEN: usize = 14;

#[derive(Debug)]
struct StoredRow {
    seq: u64,
    record: Record,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: HashMap<String, Vec<StoredRow>>,
    next_seq: u64,
}

/// A `RecordStore` that keeps everything in memory.
///
/// Cloning is cheap and clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with a caller-chosen id (seeding static tables).
    ///
    /// Replaces the fields of an existing record with the same id.
    pub fn insert_with_id(
        &self,
        table: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Record, StoreError> {
        let mut inner = self.lock()?;
        let seq = inner.bump_seq();
        let rows = inner.tables.entry(table.to_string()).or_default();
        if let Some(row) = rows.iter_mut().find(|r| r.record.id == id) {
            row.record.fields = fields;
            return Ok(row.record.clone());
        }
        let record = Record {
            id: id.to_string(),
            created_time: format_timestamp(OffsetDateTime::now_utc()),
            fields,
        };
        rows.push(StoredRow {
            seq,
            record: record.clone(),
        });
        Ok(record)
    }

    /// Number of records currently stored in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.lock()
            .map(|inner| inner.tables.get(table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl MemoryInner {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError> {
        let mut inner = self.lock()?;
        let seq = inner.bump_seq();
        let record = Record {
            id: generate_id(),
            created_time: format_timestamp(OffsetDateTime::now_utc()),
            fields: strip_nulls(fields),
        };
        tracing::debug!(table, id = %record.id, "memory store create");
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(StoredRow {
                seq,
                record: record.clone(),
            });
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError> {
        let mut inner = self.lock()?;
        let row = inner
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.record.id == id))
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        for (key, value) in fields {
            if value.is_null() {
                row.record.fields.remove(&key);
            } else {
                row.record.fields.insert(key, value);
            }
        }
        tracing::debug!(table, id, "memory store update");
        Ok(row.record.clone())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        let inner = self.lock()?;
        inner
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.record.id == id))
            .map(|r| r.record.clone())
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        let inner = self.lock()?;
        let Some(rows) = inner.tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&StoredRow> = rows
            .iter()
            .filter(|r| {
                query
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&r.record.fields))
            })
            .collect();

        if let Some(sort) = &query.sort {
            matched.sort_by(|a, b| {
                let ord = compare_field(
                    a.record.fields.get(&sort.field),
                    b.record.fields.get(&sort.field),
                )
                .then(a.seq.cmp(&b.seq));
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let out: Vec<Record> = matched
            .into_iter()
            .take(limit)
            .map(|r| r.record.clone())
            .collect();
        tracing::debug!(table, returned = out.len(), "memory store query");
        Ok(out)
    }
}

/// Missing and null values sort before everything else.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

fn strip_nulls(fields: Fields) -> Fields {
    fields.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("rec{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;
    use crate::record::{Filter, Sort};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn memory_store_passes_conformance_suite() {
        let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
        assert_eq!(report.failed, 0, "{report}");
        assert!(report.total > 0);
    }

    #[tokio::test]
    async fn generated_ids_are_prefixed_and_unique() {
        let store = MemoryStore::new();
        let a = store.create("T", Fields::new()).await.unwrap();
        let b = store.create("T", Fields::new()).await.unwrap();
        assert!(a.id.starts_with("rec"));
        assert_eq!(a.id.len(), 3 + ID_SUFFIX_LEN);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn created_time_is_fixed_width_utc() {
        let store = MemoryStore::new();
        let created = store.create("T", Fields::new()).await.unwrap();
        let t = &created.created_time;
        assert_eq!(t.len(), "2026-01-01T00:00:00.000Z".len());
        assert!(t.ends_with('Z'));
        assert_eq!(&t[10..11], "T");
        assert_eq!(&t[19..20], ".");
    }

    #[tokio::test]
    async fn descending_sort_breaks_ties_by_latest_insertion() {
        let store = MemoryStore::new();
        let first = store
            .create("Log", fields(json!({"Fecha": "2026-01-01T00:00:00.000Z"})))
            .await
            .unwrap();
        let second = store
            .create("Log", fields(json!({"Fecha": "2026-01-01T00:00:00.000Z"})))
            .await
            .unwrap();

        let desc = store
            .query("Log", &Query::new().sort(Sort::desc("Fecha")).limit(1))
            .await
            .unwrap();
        assert_eq!(desc[0].id, second.id);

        let asc = store
            .query("Log", &Query::new().sort(Sort::asc("Fecha")).limit(1))
            .await
            .unwrap();
        assert_eq!(asc[0].id, first.id);
    }

    #[tokio::test]
    async fn insert_with_id_seeds_and_replaces() {
        let store = MemoryStore::new();
        store
            .insert_with_id("Motores", "motor-1", fields(json!({"Nombre": "Motor 1"})))
            .unwrap();
        store
            .insert_with_id("Motores", "motor-1", fields(json!({"Nombre": "Jenbacher"})))
            .unwrap();
        assert_eq!(store.len("Motores"), 1);
        let rec = store.get("Motores", "motor-1").await.unwrap();
        assert_eq!(rec.fields["Nombre"], json!("Jenbacher"));
    }

    #[tokio::test]
    async fn create_drops_null_fields() {
        let store = MemoryStore::new();
        let rec = store
            .create("T", fields(json!({"a": 1, "b": null})))
            .await
            .unwrap();
        assert!(!rec.fields.contains_key("b"));
        let blank = store
            .query("T", &Query::new().filter(Filter::blank("b")))
            .await
            .unwrap();
        assert_eq!(blank.len(), 1);
    }
}
