//! Table and column names of the plant log.
//!
//! References between tables are stored as plain id text columns so that
//! equality filters work the same in every backend.

/// Table names.
pub mod tables {
    pub const SHIFTS: &str = "Turnos";
    pub const EQUIPMENT: &str = "Motores";
    pub const EQUIPMENT_STATE: &str = "Estado Motores";
    pub const STARTUP_CHECKLIST: &str = "Protocolo Encendido";
    pub const MONITORING: &str = "Monitoreo Motores";
}

pub mod shift {
    pub const OPERATOR_ID: &str = "Operador ID";
    pub const OPERATOR_NAME: &str = "Operador";
    pub const STARTED_AT: &str = "Fecha Inicio";
    pub const ENDED_AT: &str = "Fecha Fin";
}

pub mod equipment {
    pub const NAME: &str = "Nombre";
}

pub mod equipment_state {
    pub const EQUIPMENT: &str = "Motor ID";
    pub const STATE: &str = "Estado";
    pub const RECORDED_AT: &str = "Fecha";
    pub const OPERATOR_NAME: &str = "Realizado Por";
    pub const NOTES: &str = "Observaciones";
    pub const SHIFT: &str = "Turno ID";
}

pub mod checklist {
    pub const EQUIPMENT: &str = "Motor ID";
    pub const STATE_RECORD: &str = "Estado Motor ID";
    pub const OPERATOR_NAME: &str = "Realizado Por";
    pub const RECORDED_AT: &str = "Fecha";
    pub const SHIFT: &str = "Turno ID";
    pub const NOTES: &str = "Observaciones generales";
}

pub mod monitoring {
    pub const EQUIPMENT: &str = "Motor ID";
    pub const OPERATOR_NAME: &str = "Realizado Por";
    pub const RECORDED_AT: &str = "Fecha";
    pub const SHIFT: &str = "Turno ID";
    pub const STATE_RECORD: &str = "Estado Motor ID";

    pub const HOROMETER_START: &str = "Horómetro Inicio";
    pub const HOROMETER_END: &str = "Horómetro Fin";
    pub const STARTS_START: &str = "Arranques Inicio";
    pub const STARTS_END: &str = "Arranques Fin";
    pub const M3_START: &str = "M3 Inicio";
    pub const M3_END: &str = "M3 Fin";
    pub const KW_START: &str = "Kw Inicio";
    pub const KW_END: &str = "Kw Fin";
}
