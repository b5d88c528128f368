use std::future::Future;

use serde_json::json;

use super::{expect_eq, fields, TestResult};
use crate::{Filter, Query, RecordStore, Sort};

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "query",
        "empty_table_returns_nothing",
        empty_table_returns_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "equality_filter",
        equality_filter(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "blank_filter_finds_open_rows",
        blank_filter_finds_open_rows(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "and_filter_requires_all",
        and_filter_requires_all(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "range_filter_is_inclusive",
        range_filter_is_inclusive(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "sort_descending_by_timestamp",
        sort_descending_by_timestamp(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "sort_ascending_by_number",
        sort_ascending_by_number(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "limit_truncates_after_sort",
        limit_truncates_after_sort(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "updated_rows_leave_blank_filter",
        updated_rows_leave_blank_filter(factory).await,
    ));

    results
}

/// Seed three rows with distinct timestamps into table "Log".
async fn seed_log<S: RecordStore>(s: &S) -> Result<(), String> {
    for (motor, fecha, kw) in [
        ("m1", "2026-01-01T08:00:00.000Z", 10),
        ("m2", "2026-01-01T09:00:00.000Z", 20),
        ("m1", "2026-01-01T10:00:00.000Z", 30),
    ] {
        s.create(
            "Log",
            fields(json!({"Motor": motor, "Fecha": fecha, "Kw": kw})),
        )
        .await
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn kws(records: &[crate::Record]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| r.fields.get("Kw").and_then(|v| v.as_i64()))
        .collect()
}

async fn empty_table_returns_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rows = s
        .query("Nope", &Query::new().sort(Sort::desc("Fecha")).limit(1))
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("rows", rows.len(), 0)
}

async fn equality_filter<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_log(&s).await?;
    let rows = s
        .query(
            "Log",
            &Query::new()
                .filter(Filter::eq("Motor", "m1"))
                .sort(Sort::asc("Fecha")),
        )
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("kw values", kws(&rows), vec![10, 30])
}

async fn blank_filter_finds_open_rows<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create("Turnos", fields(json!({"Operador": "Ana", "Fecha Fin": "x"})))
        .await
        .map_err(|e| e.to_string())?;
    let open = s
        .create("Turnos", fields(json!({"Operador": "Luis"})))
        .await
        .map_err(|e| e.to_string())?;
    let rows = s
        .query("Turnos", &Query::new().filter(Filter::blank("Fecha Fin")))
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("open rows", rows.len(), 1)?;
    expect_eq("open id", &rows[0].id, &open.id)
}

async fn and_filter_requires_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_log(&s).await?;
    let rows = s
        .query(
            "Log",
            &Query::new().filter(Filter::eq("Motor", "m1").and(Filter::eq("Kw", 30))),
        )
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("kw values", kws(&rows), vec![30])
}

async fn range_filter_is_inclusive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_log(&s).await?;
    let rows = s
        .query(
            "Log",
            &Query::new()
                .filter(Filter::gte("Kw", 20).and(Filter::lte("Kw", 30)))
                .sort(Sort::asc("Kw")),
        )
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("kw values", kws(&rows), vec![20, 30])
}

async fn sort_descending_by_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_log(&s).await?;
    let rows = s
        .query("Log", &Query::new().sort(Sort::desc("Fecha")))
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("kw values", kws(&rows), vec![30, 20, 10])
}

async fn sort_ascending_by_number<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for kw in [5, 100, 42] {
        s.create("Log", fields(json!({"Kw": kw})))
            .await
            .map_err(|e| e.to_string())?;
    }
    let rows = s
        .query("Log", &Query::new().sort(Sort::asc("Kw")))
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("kw values", kws(&rows), vec![5, 42, 100])
}

async fn limit_truncates_after_sort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_log(&s).await?;
    let rows = s
        .query(
            "Log",
            &Query::new()
                .filter(Filter::eq("Motor", "m1"))
                .sort(Sort::desc("Fecha"))
                .limit(1),
        )
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("kw values", kws(&rows), vec![30])
}

async fn updated_rows_leave_blank_filter<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create("Monitoreo", fields(json!({"Motor": "m1", "Horómetro Inicio": 100})))
        .await
        .map_err(|e| e.to_string())?;
    s.update("Monitoreo", &rec.id, fields(json!({"Horómetro Fin": 120})))
        .await
        .map_err(|e| e.to_string())?;
    let open = s
        .query(
            "Monitoreo",
            &Query::new().filter(Filter::eq("Motor", "m1").and(Filter::blank("Horómetro Fin"))),
        )
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("open rows", open.len(), 0)
}
