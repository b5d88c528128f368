//! Shared fixtures for coordinator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use planta_coordinator::schema::tables;
use planta_coordinator::{Clock, Coordinator, ManualClock, Operator, Readings, RolePolicy};
use planta_storage::{Fields, MemoryStore, Query, Record, RecordStore, StoreError};
use serde_json::json;
use time::macros::datetime;

pub const MOTORS: [(&str, &str); 3] = [
    ("motor-1", "Motor 1 (Jenbacher)"),
    ("motor-2", "Motor 2 (MWM)"),
    ("motor-3", "Motor 3 (Caterpillar)"),
];

pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for (id, name) in MOTORS {
        let mut fields = Fields::new();
        fields.insert("Nombre".to_string(), json!(name));
        store
            .insert_with_id(tables::EQUIPMENT, id, fields)
            .expect("seed equipment");
    }
    store
}

pub fn test_clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(datetime!(2026-05-01 06:00:00 UTC)))
}

pub fn coordinator() -> (Arc<MemoryStore>, Coordinator<MemoryStore>) {
    let store = Arc::new(seeded_store());
    let coordinator = Coordinator::new(Arc::clone(&store), test_clock(), RolePolicy::default());
    (store, coordinator)
}

pub fn operator(id: &str, name: &str) -> Operator {
    Operator::new(id, name, "Operador")
}

pub fn readings(horometer: f64, starts: f64, m3: f64, kw: f64) -> Readings {
    Readings {
        horometer,
        starts,
        m3,
        kw,
    }
}

/// A memory store whose creates on one table fail while `failing` is set.
pub struct FailingStore {
    pub inner: MemoryStore,
    table: &'static str,
    failing: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: MemoryStore, table: &'static str) -> Self {
        Self {
            inner,
            table,
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError> {
        if table == self.table && self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        self.inner.create(table, fields).await
    }

    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError> {
        self.inner.update(table, id, fields).await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        self.inner.get(table, id).await
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.inner.query(table, query).await
    }
}
