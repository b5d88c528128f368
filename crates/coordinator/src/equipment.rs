//! Equipment power-state machine.
//!
//! State is an append-only log per equipment; the current state is the
//! record with the latest timestamp. Turning a unit On requires a complete
//! startup checklist, written right after the On record and bound to it.

use std::sync::Arc;

use planta_storage::{Filter, Query, RecordStore, Sort};
use serde::Serialize;
use serde_json::Value;

use crate::access::{AccessGate, ShiftScopedAction};
use crate::checklist::{ChecklistValidation, StartupChecklist, StartupChecklistGate};
use crate::clock::{format_timestamp, Clock};
use crate::error::CoordinatorError;
use crate::lock::KeyedLocks;
use crate::model::{
    fields, Equipment, EquipmentStateRecord, Operator, PowerState, StartupChecklistRecord,
};
use crate::schema::{equipment as eq, equipment_state as f, tables};

/// Result of a successful `set_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub record: EquipmentStateRecord,
    /// Present for On transitions.
    pub checklist: Option<StartupChecklistRecord>,
    /// Checklist items answered "No".
    pub negative_items: Vec<String>,
}

pub struct EquipmentStateMachine<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    gate: Arc<AccessGate<S>>,
    checklists: StartupChecklistGate<S>,
    locks: KeyedLocks,
}

impl<S: RecordStore + ?Sized> EquipmentStateMachine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, gate: Arc<AccessGate<S>>) -> Self {
        Self {
            checklists: StartupChecklistGate::new(Arc::clone(&store)),
            store,
            clock,
            gate,
            locks: KeyedLocks::new(),
        }
    }

    pub fn checklists(&self) -> &StartupChecklistGate<S> {
        &self.checklists
    }

    /// Append a state record for `equipment_id`.
    ///
    /// Checks run in order: shift ownership, equipment existence, checklist
    /// completeness (On only). Nothing is written unless all pass. If the On
    /// record is written but its checklist is not, the error names the
    /// orphaned state record.
    pub async fn set_state(
        &self,
        equipment_id: &str,
        target: PowerState,
        operator: &Operator,
        checklist: Option<&StartupChecklist>,
        notes: Option<&str>,
    ) -> Result<Transition, CoordinatorError> {
        let _guard = self.locks.lock(equipment_id).await;

        let shift = self
            .gate
            .admit(operator, ShiftScopedAction::EquipmentToggle)
            .await?;
        self.get_equipment(equipment_id).await?;

        let checklist = match target {
            PowerState::Off => None,
            PowerState::On => {
                let submitted = checklist.cloned().unwrap_or_default();
                if let ChecklistValidation::Incomplete { missing } = submitted.validate() {
                    tracing::warn!(
                        equipment_id,
                        missing = missing.len(),
                        "startup checklist incomplete"
                    );
                    return Err(CoordinatorError::IncompleteChecklist { missing });
                }
                Some(submitted)
            }
        };

        let recorded_at = format_timestamp(self.clock.now());
        let created = self
            .store
            .create(
                tables::EQUIPMENT_STATE,
                fields([
                    (f::EQUIPMENT, Value::from(equipment_id)),
                    (f::STATE, Value::from(target.label())),
                    (f::RECORDED_AT, Value::from(recorded_at)),
                    (f::OPERATOR_NAME, Value::from(operator.name.as_str())),
                    (f::NOTES, notes.filter(|n| !n.trim().is_empty()).into()),
                    (f::SHIFT, shift.map(|s| s.id).into()),
                ]),
            )
            .await?;
        let record = EquipmentStateRecord::from_record(&created)?;

        let Some(checklist) = checklist else {
            tracing::info!(
                equipment_id,
                state = %target,
                operator = %operator.name,
                "equipment state recorded"
            );
            return Ok(Transition {
                record,
                checklist: None,
                negative_items: Vec::new(),
            });
        };

        let negative_items: Vec<String> = checklist
            .negative_items()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !negative_items.is_empty() {
            tracing::warn!(
                equipment_id,
                state_record_id = %record.id,
                items = ?negative_items,
                "startup checklist has negative answers"
            );
        }

        let checklist_record = match self.checklists.record(&record, &checklist).await {
            Ok(written) => written,
            Err(err) => {
                tracing::warn!(
                    equipment_id,
                    state_record_id = %record.id,
                    error = %err,
                    "startup recorded without its checklist"
                );
                let source = match err {
                    CoordinatorError::Store(source) => source,
                    other => planta_storage::StoreError::Backend(other.to_string()),
                };
                return Err(CoordinatorError::PartialWriteInconsistency {
                    equipment_id: equipment_id.to_string(),
                    state_record_id: record.id,
                    source,
                });
            }
        };

        tracing::info!(
            equipment_id,
            state = %target,
            operator = %operator.name,
            "equipment state recorded"
        );
        Ok(Transition {
            record,
            checklist: Some(checklist_record),
            negative_items,
        })
    }

    /// The latest state record for `equipment_id`, if any exists.
    pub async fn get_current_state(
        &self,
        equipment_id: &str,
    ) -> Result<Option<EquipmentStateRecord>, CoordinatorError> {
        latest_state(&*self.store, equipment_id).await
    }

    /// State records of one equipment, newest first.
    pub async fn history(
        &self,
        equipment_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<EquipmentStateRecord>, CoordinatorError> {
        let mut query = Query::new()
            .filter(Filter::eq(f::EQUIPMENT, equipment_id))
            .sort(Sort::desc(f::RECORDED_AT));
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.store
            .query(tables::EQUIPMENT_STATE, &query)
            .await?
            .iter()
            .map(EquipmentStateRecord::from_record)
            .collect()
    }

    pub async fn get_equipment(&self, equipment_id: &str) -> Result<Equipment, CoordinatorError> {
        lookup_equipment(&*self.store, equipment_id).await
    }

    pub async fn list_equipment(&self) -> Result<Vec<Equipment>, CoordinatorError> {
        let query = Query::new().sort(Sort::asc(eq::NAME));
        self.store
            .query(tables::EQUIPMENT, &query)
            .await?
            .iter()
            .map(Equipment::from_record)
            .collect()
    }
}

pub(crate) async fn lookup_equipment<S: RecordStore + ?Sized>(
    store: &S,
    equipment_id: &str,
) -> Result<Equipment, CoordinatorError> {
    let record = store
        .get(tables::EQUIPMENT, equipment_id)
        .await
        .map_err(|e| CoordinatorError::from_lookup(e, "equipment"))?;
    Equipment::from_record(&record)
}

pub(crate) async fn latest_state<S: RecordStore + ?Sized>(
    store: &S,
    equipment_id: &str,
) -> Result<Option<EquipmentStateRecord>, CoordinatorError> {
    let query = Query::new()
        .filter(Filter::eq(f::EQUIPMENT, equipment_id))
        .sort(Sort::desc(f::RECORDED_AT))
        .limit(1);
    let records = store.query(tables::EQUIPMENT_STATE, &query).await?;
    records
        .first()
        .map(EquipmentStateRecord::from_record)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{DenialReason, RolePolicy};
    use crate::clock::ManualClock;
    use crate::shift::ShiftManager;
    use planta_storage::MemoryStore;
    use serde_json::json;
    use time::macros::datetime;

    struct Fixture {
        store: Arc<MemoryStore>,
        shifts: Arc<ShiftManager<MemoryStore>>,
        machine: EquipmentStateMachine<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_with_id(
                tables::EQUIPMENT,
                "motor-1",
                json!({"Nombre": "Motor 1"}).as_object().cloned().unwrap(),
            )
            .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(datetime!(2026-05-01 06:00:00 UTC)));
        let shifts = Arc::new(ShiftManager::new(Arc::clone(&store), Arc::clone(&clock)));
        let gate = Arc::new(AccessGate::new(Arc::clone(&shifts), RolePolicy::default()));
        let machine = EquipmentStateMachine::new(Arc::clone(&store), clock, gate);
        Fixture {
            store,
            shifts,
            machine,
        }
    }

    fn ana() -> Operator {
        Operator::new("op-1", "Ana", "Operador")
    }

    #[tokio::test]
    async fn off_transition_tags_active_shift() {
        let fx = fixture();
        let shift = fx.shifts.open_shift("op-1", "Ana").await.unwrap();

        let t = fx
            .machine
            .set_state("motor-1", PowerState::Off, &ana(), None, Some("parada programada"))
            .await
            .unwrap();
        assert_eq!(t.record.state, PowerState::Off);
        assert_eq!(t.record.shift_id, Some(shift.id));
        assert_eq!(t.record.notes.as_deref(), Some("parada programada"));
        assert!(t.checklist.is_none());
        assert_eq!(fx.store.len(tables::STARTUP_CHECKLIST), 0);
    }

    #[tokio::test]
    async fn on_with_full_checklist_writes_both_records() {
        let fx = fixture();
        fx.shifts.open_shift("op-1", "Ana").await.unwrap();

        let t = fx
            .machine
            .set_state(
                "motor-1",
                PowerState::On,
                &ana(),
                Some(&StartupChecklist::all_yes()),
                None,
            )
            .await
            .unwrap();
        let checklist = t.checklist.unwrap();
        assert_eq!(checklist.state_record_id, t.record.id);
        assert_eq!(checklist.equipment_id, "motor-1");
        assert_eq!(fx.store.len(tables::EQUIPMENT_STATE), 1);
        assert_eq!(fx.store.len(tables::STARTUP_CHECKLIST), 1);
    }

    #[tokio::test]
    async fn on_with_incomplete_checklist_writes_nothing() {
        let fx = fixture();
        fx.shifts.open_shift("op-1", "Ana").await.unwrap();
        let mut partial = StartupChecklist::all_yes();
        partial.answers.remove("Presión aceite 3.5 bar");

        let err = fx
            .machine
            .set_state("motor-1", PowerState::On, &ana(), Some(&partial), None)
            .await
            .unwrap_err();
        match err {
            CoordinatorError::IncompleteChecklist { missing } => {
                assert_eq!(missing, vec!["Presión aceite 3.5 bar".to_string()]);
            }
            other => panic!("expected IncompleteChecklist, got {other}"),
        }

        let err = fx
            .machine
            .set_state("motor-1", PowerState::On, &ana(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::IncompleteChecklist { .. }));

        assert_eq!(fx.store.len(tables::EQUIPMENT_STATE), 0);
        assert_eq!(fx.store.len(tables::STARTUP_CHECKLIST), 0);
    }

    #[tokio::test]
    async fn negative_answers_are_reported_not_blocking() {
        let fx = fixture();
        fx.shifts.open_shift("op-1", "Ana").await.unwrap();
        let checklist = StartupChecklist::all_yes().answer("CH4 > 50%", "No");

        let t = fx
            .machine
            .set_state("motor-1", PowerState::On, &ana(), Some(&checklist), None)
            .await
            .unwrap();
        assert_eq!(t.negative_items, vec!["CH4 > 50%".to_string()]);
        assert_eq!(
            t.checklist.unwrap().answers.get("CH4 > 50%").map(String::as_str),
            Some("No")
        );
    }

    #[tokio::test]
    async fn unknown_equipment_is_not_found() {
        let fx = fixture();
        fx.shifts.open_shift("op-1", "Ana").await.unwrap();
        let err = fx
            .machine
            .set_state("motor-9", PowerState::Off, &ana(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::NotFound {
                kind: "equipment",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn non_owner_is_forbidden_before_any_write() {
        let fx = fixture();
        fx.shifts.open_shift("op-1", "Ana").await.unwrap();
        let luis = Operator::new("op-2", "Luis", "Operador");

        let err = fx
            .machine
            .set_state("motor-1", PowerState::Off, &luis, None, None)
            .await
            .unwrap_err();
        match err {
            CoordinatorError::Forbidden(denial) => {
                assert_eq!(denial.reason, DenialReason::NotShiftOwner);
                assert_eq!(denial.shift_owner.as_deref(), Some("Ana"));
            }
            other => panic!("expected Forbidden, got {other}"),
        }
        assert_eq!(fx.store.len(tables::EQUIPMENT_STATE), 0);
    }

    #[tokio::test]
    async fn current_state_is_latest_and_history_keeps_repeats() {
        let fx = fixture();
        fx.shifts.open_shift("op-1", "Ana").await.unwrap();
        assert!(fx.machine.get_current_state("motor-1").await.unwrap().is_none());

        for _ in 0..2 {
            fx.machine
                .set_state("motor-1", PowerState::Off, &ana(), None, None)
                .await
                .unwrap();
        }
        let on = fx
            .machine
            .set_state(
                "motor-1",
                PowerState::On,
                &ana(),
                Some(&StartupChecklist::all_yes()),
                None,
            )
            .await
            .unwrap();

        let current = fx.machine.get_current_state("motor-1").await.unwrap().unwrap();
        assert_eq!(current, on.record);

        let history = fx.machine.history("motor-1", None).await.unwrap();
        let states: Vec<PowerState> = history.iter().map(|r| r.state).collect();
        assert_eq!(states, vec![PowerState::On, PowerState::Off, PowerState::Off]);
    }

    #[tokio::test]
    async fn privileged_operator_toggles_without_shift() {
        let fx = fixture();
        let boss = Operator::new("op-9", "Marta", "Ingeniera - Jefe de planta");
        let t = fx
            .machine
            .set_state("motor-1", PowerState::Off, &boss, None, None)
            .await
            .unwrap();
        assert_eq!(t.record.shift_id, None);
        assert_eq!(t.record.operator_name, "Marta");
    }
}
