//! Startup safety checklist.
//!
//! Every On transition carries a submission of the fixed checklist below.
//! Completeness is enforced; the yes/no values themselves are recorded and
//! reported but not evaluated.

use std::collections::BTreeMap;
use std::sync::Arc;

use planta_storage::{Filter, Query, RecordStore, Sort};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoordinatorError;
use crate::model::{fields, EquipmentStateRecord, StartupChecklistRecord};
use crate::schema::{checklist as f, tables};

/// The checklist items, in the order operators fill them in. Each label is
/// also the column name in the checklist table.
pub const CHECKLIST_ITEMS: [&str; 19] = [
    "Elementos de Protección Personal disponibles",
    "Elementos de Protección Personal en buen estado",
    "Aceite al 50% (mirilla)",
    "Presión refrigerante 1.5 bar",
    "CH4 > 50%",
    "O2 < 3%",
    "H2S < 300ppm",
    "Mangueras en buen estado",
    "Válvulas de gas abiertas",
    "Ventiladores encendidos",
    "Equipos Biofiltro funcionando",
    "Encendido correcto",
    "Planilla actualizada",
    "Temperatura refrigerante 80-90°C",
    "Presión aceite 3.5 bar",
    "Carga trabajo < 1000kW",
    "Horómetro inicial registrado",
    "Composición de biogás controlada",
    "Lavado de radiador (si aplica)",
];

/// Free-text notes column.
pub const GENERAL_NOTES: &str = f::NOTES;

pub const YES: &str = "Sí";
pub const NO: &str = "No";

/// One operator's checklist submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupChecklist {
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StartupChecklist {
    /// A submission answering every item with "Sí".
    pub fn all_yes() -> Self {
        Self {
            answers: CHECKLIST_ITEMS
                .iter()
                .map(|item| (item.to_string(), YES.to_string()))
                .collect(),
            notes: None,
        }
    }

    pub fn answer(mut self, item: &str, value: &str) -> Self {
        self.answers.insert(item.to_string(), value.to_string());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checklist items answered "No", in checklist order.
    pub fn negative_items(&self) -> Vec<&'static str> {
        CHECKLIST_ITEMS
            .iter()
            .copied()
            .filter(|item| {
                self.answers
                    .get(*item)
                    .is_some_and(|a| a.trim().eq_ignore_ascii_case(NO))
            })
            .collect()
    }

    pub fn validate(&self) -> ChecklistValidation {
        validate(&self.answers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChecklistValidation {
    Complete,
    Incomplete { missing: Vec<String> },
}

/// Complete iff every checklist item has a non-blank answer. Keys outside
/// the checklist are ignored.
pub fn validate(answers: &BTreeMap<String, String>) -> ChecklistValidation {
    let missing: Vec<String> = CHECKLIST_ITEMS
        .iter()
        .filter(|item| answers.get(**item).map_or(true, |a| a.trim().is_empty()))
        .map(|item| item.to_string())
        .collect();
    if missing.is_empty() {
        ChecklistValidation::Complete
    } else {
        ChecklistValidation::Incomplete { missing }
    }
}

/// Writes and reads checklist records bound to On state records.
pub struct StartupChecklistGate<S: ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> StartupChecklistGate<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist `checklist` against the On record that triggered it. The
    /// record shares the state record's timestamp, operator and shift.
    pub async fn record(
        &self,
        state_record: &EquipmentStateRecord,
        checklist: &StartupChecklist,
    ) -> Result<StartupChecklistRecord, CoordinatorError> {
        let mut row = fields([
            (f::EQUIPMENT, Value::from(state_record.equipment_id.as_str())),
            (f::STATE_RECORD, Value::from(state_record.id.as_str())),
            (f::OPERATOR_NAME, Value::from(state_record.operator_name.as_str())),
            (f::RECORDED_AT, Value::from(state_record.recorded_at.as_str())),
            (f::SHIFT, state_record.shift_id.clone().into()),
            (f::NOTES, checklist.notes.clone().into()),
        ]);
        for item in CHECKLIST_ITEMS {
            if let Some(answer) = checklist.answers.get(item) {
                row.insert(item.to_string(), Value::from(answer.trim()));
            }
        }
        let created = self.store.create(tables::STARTUP_CHECKLIST, row).await?;
        StartupChecklistRecord::from_record(&created)
    }

    /// The checklist bound to a given state record, if one was written.
    pub async fn find_for_state_record(
        &self,
        state_record_id: &str,
    ) -> Result<Option<StartupChecklistRecord>, CoordinatorError> {
        let query = Query::new()
            .filter(Filter::eq(f::STATE_RECORD, state_record_id))
            .sort(Sort::desc(f::RECORDED_AT))
            .limit(1);
        let records = self.store.query(tables::STARTUP_CHECKLIST, &query).await?;
        records
            .first()
            .map(StartupChecklistRecord::from_record)
            .transpose()
    }

    /// All checklist records of one equipment, oldest first.
    pub async fn list_for_equipment(
        &self,
        equipment_id: &str,
    ) -> Result<Vec<StartupChecklistRecord>, CoordinatorError> {
        let query = Query::new()
            .filter(Filter::eq(f::EQUIPMENT, equipment_id))
            .sort(Sort::asc(f::RECORDED_AT));
        self.store
            .query(tables::STARTUP_CHECKLIST, &query)
            .await?
            .iter()
            .map(StartupChecklistRecord::from_record)
            .collect()
    }
}
