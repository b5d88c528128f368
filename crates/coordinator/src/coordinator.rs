use std::sync::Arc;

use planta_storage::RecordStore;

use crate::access::{AccessDecision, AccessGate, RolePolicy, ShiftScopedAction};
use crate::clock::Clock;
use crate::equipment::EquipmentStateMachine;
use crate::error::CoordinatorError;
use crate::model::{EquipmentStateRecord, Operator, Readings};
use crate::monitoring::{IntervalOutcome, MonitoringChain};
use crate::reconcile;
use crate::shift::ShiftManager;

/// All coordinator components wired over one store and one clock.
pub struct Coordinator<S: ?Sized> {
    store: Arc<S>,
    shifts: Arc<ShiftManager<S>>,
    gate: Arc<AccessGate<S>>,
    equipment: EquipmentStateMachine<S>,
    monitoring: MonitoringChain<S>,
}

impl<S: RecordStore + ?Sized> Coordinator<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: RolePolicy) -> Self {
        let shifts = Arc::new(ShiftManager::new(Arc::clone(&store), Arc::clone(&clock)));
        let gate = Arc::new(AccessGate::new(Arc::clone(&shifts), policy));
        let equipment =
            EquipmentStateMachine::new(Arc::clone(&store), Arc::clone(&clock), Arc::clone(&gate));
        let monitoring = MonitoringChain::new(Arc::clone(&store), clock, Arc::clone(&shifts));
        Self {
            store,
            shifts,
            gate,
            equipment,
            monitoring,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn shifts(&self) -> &ShiftManager<S> {
        &self.shifts
    }

    pub fn gate(&self) -> &AccessGate<S> {
        &self.gate
    }

    pub fn equipment(&self) -> &EquipmentStateMachine<S> {
        &self.equipment
    }

    pub fn monitoring(&self) -> &MonitoringChain<S> {
        &self.monitoring
    }

    pub async fn authorize(
        &self,
        operator: &Operator,
        action: ShiftScopedAction,
    ) -> Result<AccessDecision, CoordinatorError> {
        self.gate.authorize(operator, action).await
    }

    /// Gated entry point to the monitoring chain. The interval is recorded
    /// under the operator's name.
    pub async fn record_monitoring(
        &self,
        operator: &Operator,
        equipment_id: &str,
        initial: Readings,
    ) -> Result<IntervalOutcome, CoordinatorError> {
        self.gate
            .admit(operator, ShiftScopedAction::RecordMonitoring)
            .await?;
        self.monitoring
            .record_interval(equipment_id, &operator.name, initial)
            .await
    }

    pub async fn find_unaudited_startups(
        &self,
        equipment_id: Option<&str>,
    ) -> Result<Vec<EquipmentStateRecord>, CoordinatorError> {
        reconcile::find_unaudited_startups(&*self.store, equipment_id).await
    }
}
