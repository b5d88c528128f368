//! Shift and equipment state coordination for a biogas plant log.
//!
//! The coordinator enforces four rules over a generic [`RecordStore`]:
//! at most one active shift, only the shift owner (or a privileged role)
//! mutates equipment state, every startup carries a complete safety
//! checklist, and monitoring intervals chain without gaps.
//!
//! [`RecordStore`]: planta_storage::RecordStore

pub mod access;
pub mod checklist;
pub mod clock;
mod coordinator;
pub mod equipment;
pub mod error;
mod lock;
pub mod model;
pub mod monitoring;
pub mod reconcile;
pub mod schema;
pub mod shift;

pub use access::{
    AccessDecision, AccessGate, Capabilities, Denial, DenialReason, RolePolicy,
    ShiftScopedAction, PRIVILEGED_ROLES,
};
pub use checklist::{
    ChecklistValidation, StartupChecklist, StartupChecklistGate, CHECKLIST_ITEMS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::Coordinator;
pub use equipment::{EquipmentStateMachine, Transition};
pub use error::CoordinatorError;
pub use model::{
    Equipment, EquipmentStateRecord, MonitoringInterval, Operator, PowerState, Readings, Shift,
    StartupChecklistRecord,
};
pub use monitoring::{IntervalOutcome, LedgerGap, LedgerReport, MonitoringChain};
pub use shift::ShiftManager;
