//! Detection of startups that lost their checklist.
//!
//! An On record and its checklist are two separate writes. When the second
//! fails the On record stays in the log without an audit trail; this scan
//! finds those records so an operator can follow up.

use std::collections::HashSet;

use planta_storage::{Filter, Query, RecordStore, Sort};

use crate::error::CoordinatorError;
use crate::model::{EquipmentStateRecord, PowerState, StartupChecklistRecord};
use crate::schema::{checklist, equipment_state as f, tables};

/// On state records with no checklist record referencing them, oldest first.
/// Pass an equipment id to scope the scan to one unit.
pub async fn find_unaudited_startups<S: RecordStore + ?Sized>(
    store: &S,
    equipment_id: Option<&str>,
) -> Result<Vec<EquipmentStateRecord>, CoordinatorError> {
    let mut on_filter = Filter::eq(f::STATE, PowerState::On.label());
    let mut checklist_query = Query::new();
    if let Some(id) = equipment_id {
        on_filter = on_filter.and(Filter::eq(f::EQUIPMENT, id));
        checklist_query = checklist_query.filter(Filter::eq(checklist::EQUIPMENT, id));
    }

    let startups = store
        .query(
            tables::EQUIPMENT_STATE,
            &Query::new().filter(on_filter).sort(Sort::asc(f::RECORDED_AT)),
        )
        .await?;
    let audited: HashSet<String> = store
        .query(tables::STARTUP_CHECKLIST, &checklist_query)
        .await?
        .iter()
        .map(StartupChecklistRecord::from_record)
        .map(|r| r.map(|c| c.state_record_id))
        .collect::<Result<_, _>>()?;

    let unaudited: Vec<EquipmentStateRecord> = startups
        .iter()
        .filter(|r| !audited.contains(&r.id))
        .map(EquipmentStateRecord::from_record)
        .collect::<Result<_, _>>()?;
    if !unaudited.is_empty() {
        tracing::warn!(count = unaudited.len(), "startups without checklist records");
    }
    Ok(unaudited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planta_storage::{Fields, MemoryStore};
    use serde_json::json;

    fn row(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn state(store: &MemoryStore, id: &str, motor: &str, estado: &str, fecha: &str) {
        store
            .insert_with_id(
                tables::EQUIPMENT_STATE,
                id,
                row(json!({
                    "Motor ID": motor,
                    "Estado": estado,
                    "Fecha": fecha,
                    "Realizado Por": "Ana",
                })),
            )
            .unwrap();
    }

    fn checklist_for(store: &MemoryStore, state_id: &str, motor: &str) {
        store
            .insert_with_id(
                tables::STARTUP_CHECKLIST,
                &format!("chk-{state_id}"),
                row(json!({"Motor ID": motor, "Estado Motor ID": state_id,
                           "Realizado Por": "Ana", "Fecha": "2026-05-01T06:00:00.000Z"})),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn reports_only_on_records_without_checklist() {
        let store = MemoryStore::new();
        state(&store, "recOn1", "motor-1", "Encendido", "2026-05-01T06:00:01.000Z");
        state(&store, "recOff", "motor-1", "Apagado", "2026-05-01T06:00:02.000Z");
        state(&store, "recOn2", "motor-1", "Encendido", "2026-05-01T06:00:03.000Z");
        state(&store, "recOn3", "motor-2", "Encendido", "2026-05-01T06:00:04.000Z");
        checklist_for(&store, "recOn1", "motor-1");

        let all = find_unaudited_startups(&store, None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["recOn2", "recOn3"]);

        let scoped = find_unaudited_startups(&store, Some("motor-2")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "recOn3");
    }

    #[tokio::test]
    async fn empty_log_is_clean() {
        let store = MemoryStore::new();
        assert!(find_unaudited_startups(&store, None).await.unwrap().is_empty());
    }
}
