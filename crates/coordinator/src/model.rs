//! Domain types and their mapping to store records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use planta_storage::{Fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoordinatorError;
use crate::schema::{self, tables};

/// An authenticated operator, supplied by the external identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
    /// Free-form role label, e.g. "Operador" or "CTO".
    pub role: String,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }
}

/// Equipment power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    #[serde(rename = "Encendido")]
    On,
    #[serde(rename = "Apagado")]
    Off,
}

impl PowerState {
    pub fn label(self) -> &'static str {
        match self {
            PowerState::On => "Encendido",
            PowerState::Off => "Apagado",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PowerState {
    type Err = String;

    /// Accepts the stored labels and the English shorthands `on` / `off`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "encendido" | "on" => Ok(PowerState::On),
            "apagado" | "off" => Ok(PowerState::Off),
            other => Err(format!(
                "unknown power state '{}' (expected Encendido or Apagado)",
                other
            )),
        }
    }
}

/// One operating period. Active while `ended_at` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub operator_id: String,
    pub operator_name: String,
    pub started_at: String,
    pub ended_at: Option<String>,
}

impl Shift {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub(crate) fn from_record(record: &Record) -> Result<Self, CoordinatorError> {
        let d = Decoder::new(tables::SHIFTS, record);
        Ok(Shift {
            id: record.id.clone(),
            operator_id: d.string(schema::shift::OPERATOR_ID)?,
            operator_name: d.string(schema::shift::OPERATOR_NAME)?,
            started_at: d.string(schema::shift::STARTED_AT)?,
            ended_at: d.opt_string(schema::shift::ENDED_AT),
        })
    }
}

/// A controllable generator unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
}

impl Equipment {
    pub(crate) fn from_record(record: &Record) -> Result<Self, CoordinatorError> {
        let d = Decoder::new(tables::EQUIPMENT, record);
        Ok(Equipment {
            id: record.id.clone(),
            name: d.string(schema::equipment::NAME)?,
        })
    }
}

/// One timestamped observation of an equipment's power state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentStateRecord {
    pub id: String,
    pub equipment_id: String,
    pub state: PowerState,
    pub recorded_at: String,
    pub operator_name: String,
    pub notes: Option<String>,
    pub shift_id: Option<String>,
}

impl EquipmentStateRecord {
    pub(crate) fn from_record(record: &Record) -> Result<Self, CoordinatorError> {
        use schema::equipment_state as f;
        let d = Decoder::new(tables::EQUIPMENT_STATE, record);
        let state = d
            .string(f::STATE)?
            .parse::<PowerState>()
            .map_err(|message| d.malformed(message))?;
        Ok(EquipmentStateRecord {
            id: record.id.clone(),
            equipment_id: d.string(f::EQUIPMENT)?,
            state,
            recorded_at: d.string(f::RECORDED_AT)?,
            operator_name: d.string(f::OPERATOR_NAME)?,
            notes: d.opt_string(f::NOTES),
            shift_id: d.opt_string(f::SHIFT),
        })
    }
}

/// The checklist submission bound to one On transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupChecklistRecord {
    pub id: String,
    pub equipment_id: String,
    pub state_record_id: String,
    pub operator_name: String,
    pub recorded_at: String,
    pub answers: BTreeMap<String, String>,
    pub notes: Option<String>,
    pub shift_id: Option<String>,
}

impl StartupChecklistRecord {
    pub(crate) fn from_record(record: &Record) -> Result<Self, CoordinatorError> {
        use schema::checklist as f;
        let d = Decoder::new(tables::STARTUP_CHECKLIST, record);
        let answers = crate::checklist::CHECKLIST_ITEMS
            .iter()
            .filter_map(|item| d.opt_string(item).map(|a| (item.to_string(), a)))
            .collect();
        Ok(StartupChecklistRecord {
            id: record.id.clone(),
            equipment_id: d.string(f::EQUIPMENT)?,
            state_record_id: d.string(f::STATE_RECORD)?,
            operator_name: d.string(f::OPERATOR_NAME)?,
            recorded_at: d.string(f::RECORDED_AT)?,
            answers,
            notes: d.opt_string(f::NOTES),
            shift_id: d.opt_string(f::SHIFT),
        })
    }
}

/// The four counters read off a generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    /// Horómetro: running hour-meter.
    pub horometer: f64,
    /// Arranques: engine-start counter.
    pub starts: f64,
    /// M3: cumulative gas volume.
    pub m3: f64,
    /// Kw: cumulative power.
    pub kw: f64,
}

impl Readings {
    /// Every counter must be finite to be stored as a number.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        let counters = [
            ("horometer", self.horometer),
            ("starts", self.starts),
            ("m3", self.m3),
            ("kw", self.kw),
        ];
        match counters.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, value)) => Err(CoordinatorError::InvalidReadings { field, value }),
            None => Ok(()),
        }
    }
}

/// One segment of an equipment's counter ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringInterval {
    pub id: String,
    pub equipment_id: String,
    pub operator_name: String,
    pub recorded_at: String,
    pub initial: Readings,
    /// `None` while this is the equipment's open interval.
    pub final_readings: Option<Readings>,
    pub shift_id: Option<String>,
    pub state_record_id: Option<String>,
}

impl MonitoringInterval {
    pub fn is_open(&self) -> bool {
        self.final_readings.is_none()
    }

    pub(crate) fn from_record(record: &Record) -> Result<Self, CoordinatorError> {
        use schema::monitoring as f;
        let d = Decoder::new(tables::MONITORING, record);
        let initial = Readings {
            horometer: d.number(f::HOROMETER_START)?,
            starts: d.number(f::STARTS_START)?,
            m3: d.number(f::M3_START)?,
            kw: d.number(f::KW_START)?,
        };
        let final_readings = match d.opt_number(f::HOROMETER_END) {
            None => None,
            Some(horometer) => Some(Readings {
                horometer,
                starts: d.number(f::STARTS_END)?,
                m3: d.number(f::M3_END)?,
                kw: d.number(f::KW_END)?,
            }),
        };
        Ok(MonitoringInterval {
            id: record.id.clone(),
            equipment_id: d.string(f::EQUIPMENT)?,
            operator_name: d.string(f::OPERATOR_NAME)?,
            recorded_at: d.string(f::RECORDED_AT)?,
            initial,
            final_readings,
            shift_id: d.opt_string(f::SHIFT),
            state_record_id: d.opt_string(f::STATE_RECORD),
        })
    }
}

/// Initial-reading columns of a monitoring row.
pub(crate) fn initial_fields(readings: &Readings) -> Fields {
    use schema::monitoring as f;
    fields([
        (f::HOROMETER_START, readings.horometer.into()),
        (f::STARTS_START, readings.starts.into()),
        (f::M3_START, readings.m3.into()),
        (f::KW_START, readings.kw.into()),
    ])
}

/// Final-reading columns of a monitoring row.
pub(crate) fn final_fields(readings: &Readings) -> Fields {
    use schema::monitoring as f;
    fields([
        (f::HOROMETER_END, readings.horometer.into()),
        (f::STARTS_END, readings.starts.into()),
        (f::M3_END, readings.m3.into()),
        (f::KW_END, readings.kw.into()),
    ])
}

/// Build a field map, dropping `null` values.
pub(crate) fn fields<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Fields {
    pairs
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Typed field access over one record, producing `MalformedRecord` errors
/// that name the table and record.
struct Decoder<'a> {
    table: &'static str,
    record: &'a Record,
}

impl<'a> Decoder<'a> {
    fn new(table: &'static str, record: &'a Record) -> Self {
        Self { table, record }
    }

    fn malformed(&self, message: String) -> CoordinatorError {
        CoordinatorError::MalformedRecord {
            table: self.table,
            id: self.record.id.clone(),
            message,
        }
    }

    fn opt_string(&self, field: &str) -> Option<String> {
        match self.record.field(field)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            // Linked-record columns come back as a one-element list.
            Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
            other => Some(other.to_string()),
        }
    }

    fn string(&self, field: &str) -> Result<String, CoordinatorError> {
        self.opt_string(field)
            .ok_or_else(|| self.malformed(format!("missing field '{}'", field)))
    }

    fn opt_number(&self, field: &str) -> Option<f64> {
        match self.record.field(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn number(&self, field: &str) -> Result<f64, CoordinatorError> {
        self.opt_number(field)
            .ok_or_else(|| self.malformed(format!("missing or non-numeric field '{}'", field)))
    }
}
