use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use super::{expect_eq, fields, TestResult};
use crate::{Query, RecordStore};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_creates_all_land",
        concurrent_creates_all_land(factory).await,
    ));

    results
}

/// N tasks create rows in the same table at once. Every create succeeds and
/// every id is distinct.
async fn concurrent_creates_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .create("Estado Motores", fields(json!({"n": i})))
                .await
                .map(|r| r.id)
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let id = handle
            .await
            .map_err(|e| format!("task panicked: {e}"))?
            .map_err(|e| e.to_string())?;
        ids.insert(id);
    }
    expect_eq("distinct ids", ids.len(), N)?;

    let rows = store
        .query("Estado Motores", &Query::new())
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("stored rows", rows.len(), N)
}
