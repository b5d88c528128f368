use std::future::Future;

use serde_json::json;

use super::{fields, TestResult};
use crate::{RecordStore, StoreError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_missing_returns_not_found",
        get_missing_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_missing_returns_not_found",
        update_missing_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "not_found_reports_404",
        not_found_reports_404(factory).await,
    ));

    results
}

async fn get_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("Turnos", "recMissing").await {
        Err(StoreError::NotFound { table, id }) => {
            if table == "Turnos" && id == "recMissing" {
                Ok(())
            } else {
                Err(format!("NotFound carried wrong key {table}/{id}"))
            }
        }
        Ok(rec) => Err(format!("expected NotFound, got record {}", rec.id)),
        Err(other) => Err(format!("expected NotFound, got {other}")),
    }
}

async fn update_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s
        .update("Turnos", "recMissing", fields(json!({"a": 1})))
        .await
    {
        Err(StoreError::NotFound { .. }) => Ok(()),
        Ok(rec) => Err(format!("expected NotFound, got record {}", rec.id)),
        Err(other) => Err(format!("expected NotFound, got {other}")),
    }
}

async fn not_found_reports_404<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let err = s
        .get("Turnos", "recMissing")
        .await
        .err()
        .ok_or_else(|| "expected an error".to_string())?;
    match err.status() {
        Some(404) => Ok(()),
        other => Err(format!("expected status 404, got {other:?}")),
    }
}
