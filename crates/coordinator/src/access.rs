//! Access gate for shift-scoped actions.
//!
//! Only the operator who opened the active shift may mutate live equipment
//! state. Roles that carry the `bypass_shift_ownership` capability skip the
//! check entirely.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use planta_storage::RecordStore;
use serde::{Deserialize, Serialize};

use crate::error::CoordinatorError;
use crate::model::{Operator, Shift};
use crate::shift::ShiftManager;

/// Role labels that bypass shift ownership by default.
pub const PRIVILEGED_ROLES: [&str; 5] = [
    "Ingeniera - Jefe de planta",
    "Jefe director de planta",
    "Desarrollador",
    "CTO",
    "CEO",
];

/// Actions that require owning the active shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShiftScopedAction {
    EquipmentToggle,
    RecordMonitoring,
}

impl ShiftScopedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftScopedAction::EquipmentToggle => "equipment-toggle",
            ShiftScopedAction::RecordMonitoring => "record-monitoring",
        }
    }
}

/// What a role is allowed to do beyond the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub bypass_shift_ownership: bool,
}

/// Maps role labels to capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    bypass_roles: BTreeSet<String>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::with_bypass_roles(PRIVILEGED_ROLES)
    }
}

impl RolePolicy {
    pub fn with_bypass_roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            bypass_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn capabilities(&self, role: &str) -> Capabilities {
        Capabilities {
            bypass_shift_ownership: self.bypass_roles.contains(role),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenialReason {
    NoActiveShift,
    NotShiftOwner,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::NoActiveShift => "no-active-shift",
            DenialReason::NotShiftOwner => "not-shift-owner",
        }
    }
}

/// Why a shift-scoped action was refused, with enough context to explain it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenialReason,
    pub shift_id: Option<String>,
    pub shift_owner: Option<String>,
    pub shift_started_at: Option<String>,
}

impl Denial {
    fn no_active_shift() -> Self {
        Self {
            reason: DenialReason::NoActiveShift,
            shift_id: None,
            shift_owner: None,
            shift_started_at: None,
        }
    }

    fn not_owner(shift: &Shift) -> Self {
        Self {
            reason: DenialReason::NotShiftOwner,
            shift_id: Some(shift.id.clone()),
            shift_owner: Some(shift.operator_name.clone()),
            shift_started_at: Some(shift.started_at.clone()),
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.reason, &self.shift_owner, &self.shift_started_at) {
            (DenialReason::NoActiveShift, _, _) => write!(f, "no active shift"),
            (DenialReason::NotShiftOwner, Some(owner), Some(started)) => write!(
                f,
                "not the shift owner (shift opened by {} at {})",
                owner, started
            ),
            (DenialReason::NotShiftOwner, _, _) => write!(f, "not the shift owner"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum AccessDecision {
    Allowed,
    Denied(Denial),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

/// Decide given an already-fetched active shift.
pub fn decide(policy: &RolePolicy, operator: &Operator, active: Option<&Shift>) -> AccessDecision {
    if policy.capabilities(&operator.role).bypass_shift_ownership {
        return AccessDecision::Allowed;
    }
    match active {
        None => AccessDecision::Denied(Denial::no_active_shift()),
        Some(shift) if shift.operator_id == operator.id => AccessDecision::Allowed,
        Some(shift) => AccessDecision::Denied(Denial::not_owner(shift)),
    }
}

pub struct AccessGate<S: ?Sized> {
    shifts: Arc<ShiftManager<S>>,
    policy: RolePolicy,
}

impl<S: RecordStore + ?Sized> AccessGate<S> {
    pub fn new(shifts: Arc<ShiftManager<S>>, policy: RolePolicy) -> Self {
        Self { shifts, policy }
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    /// Pure read + decision. Privileged roles are allowed without consulting
    /// the shift log at all.
    pub async fn authorize(
        &self,
        operator: &Operator,
        action: ShiftScopedAction,
    ) -> Result<AccessDecision, CoordinatorError> {
        if self.policy.capabilities(&operator.role).bypass_shift_ownership {
            return Ok(AccessDecision::Allowed);
        }
        let active = self.shifts.get_active_shift().await?;
        let decision = decide(&self.policy, operator, active.as_ref());
        if let AccessDecision::Denied(denial) = &decision {
            tracing::warn!(
                operator = %operator.name,
                action = action.as_str(),
                reason = denial.reason.as_str(),
                "shift-scoped action denied"
            );
        }
        Ok(decision)
    }

    /// Authorize and return the active shift for tagging the write that
    /// follows. Denials become `CoordinatorError::Forbidden`.
    pub async fn admit(
        &self,
        operator: &Operator,
        action: ShiftScopedAction,
    ) -> Result<Option<Shift>, CoordinatorError> {
        let active = self.shifts.get_active_shift().await?;
        match decide(&self.policy, operator, active.as_ref()) {
            AccessDecision::Allowed => Ok(active),
            AccessDecision::Denied(denial) => {
                tracing::warn!(
                    operator = %operator.name,
                    action = action.as_str(),
                    reason = denial.reason.as_str(),
                    "shift-scoped action denied"
                );
                Err(CoordinatorError::Forbidden(denial))
            }
        }
    }
}
