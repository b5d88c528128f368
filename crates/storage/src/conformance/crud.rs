use std::future::Future;

use serde_json::json;

use super::{expect_eq, fields, TestResult};
use crate::{Fields, RecordStore};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "crud",
        "create_assigns_unique_ids",
        create_assigns_unique_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "create_returns_written_fields",
        create_returns_written_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "get_round_trips_created_record",
        get_round_trips_created_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "update_merges_fields",
        update_merges_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "update_null_clears_field",
        update_null_clears_field(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "tables_are_independent",
        tables_are_independent(factory).await,
    ));

    results
}

async fn create_assigns_unique_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s.create("T", Fields::new()).await.map_err(|e| e.to_string())?;
    let b = s.create("T", Fields::new()).await.map_err(|e| e.to_string())?;
    if a.id.is_empty() || b.id.is_empty() {
        return Err("create returned an empty id".to_string());
    }
    if a.id == b.id {
        return Err(format!("two creates returned the same id {}", a.id));
    }
    Ok(())
}

async fn create_returns_written_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create("T", fields(json!({"Nombre": "Motor 1", "Kw": 50})))
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("Nombre", rec.fields.get("Nombre"), Some(&json!("Motor 1")))?;
    expect_eq("Kw", rec.fields.get("Kw"), Some(&json!(50)))
}

async fn get_round_trips_created_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("T", fields(json!({"Estado": "Encendido"})))
        .await
        .map_err(|e| e.to_string())?;
    let read = s.get("T", &created.id).await.map_err(|e| e.to_string())?;
    expect_eq("id", &read.id, &created.id)?;
    expect_eq("fields", &read.fields, &created.fields)
}

async fn update_merges_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("T", fields(json!({"a": 1, "b": 2})))
        .await
        .map_err(|e| e.to_string())?;
    let updated = s
        .update("T", &created.id, fields(json!({"b": 3, "c": 4})))
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("a", updated.fields.get("a"), Some(&json!(1)))?;
    expect_eq("b", updated.fields.get("b"), Some(&json!(3)))?;
    expect_eq("c", updated.fields.get("c"), Some(&json!(4)))?;

    let read = s.get("T", &created.id).await.map_err(|e| e.to_string())?;
    expect_eq("persisted fields", &read.fields, &updated.fields)
}

async fn update_null_clears_field<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("T", fields(json!({"a": 1, "b": 2})))
        .await
        .map_err(|e| e.to_string())?;
    let updated = s
        .update("T", &created.id, fields(json!({"b": null})))
        .await
        .map_err(|e| e.to_string())?;
    if updated.field("b").is_some() {
        return Err(format!("field b still set: {:?}", updated.fields.get("b")));
    }
    expect_eq("a", updated.fields.get("a"), Some(&json!(1)))
}

async fn tables_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create("Turnos", fields(json!({"x": 1})))
        .await
        .map_err(|e| e.to_string())?;
    if s.get("Motores", &rec.id).await.is_ok() {
        return Err("record visible from a different table".to_string());
    }
    let others = s
        .query("Motores", &crate::Query::new())
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("rows in other table", others.len(), 0)
}
