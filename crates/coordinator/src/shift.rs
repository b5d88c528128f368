//! Shift lifecycle: open -> active -> closed.
//!
//! The active shift is the shift row with a blank end timestamp and the
//! latest start. `open_shift` holds a process-wide lock across its
//! check-then-create so two operators cannot both observe "no active shift"
//! and both open one.

use std::sync::Arc;

use planta_storage::{Filter, Query, RecordStore, Sort};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::access::{Denial, DenialReason};
use crate::clock::{format_timestamp, Clock};
use crate::error::CoordinatorError;
use crate::model::{fields, Shift};
use crate::schema::{shift as f, tables};

pub struct ShiftManager<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    open_lock: Mutex<()>,
}

impl<S: RecordStore + ?Sized> ShiftManager<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            open_lock: Mutex::new(()),
        }
    }

    /// Open a new shift owned by the given operator.
    ///
    /// Fails with `ShiftAlreadyActive` while another shift is open.
    pub async fn open_shift(
        &self,
        operator_id: &str,
        operator_name: &str,
    ) -> Result<Shift, CoordinatorError> {
        let _guard = self.open_lock.lock().await;

        if let Some(active) = self.get_active_shift().await? {
            tracing::warn!(
                shift_id = %active.id,
                owner = %active.operator_name,
                requested_by = operator_name,
                "refusing to open a second active shift"
            );
            return Err(CoordinatorError::ShiftAlreadyActive {
                shift_id: active.id,
                owner: active.operator_name,
                started_at: active.started_at,
            });
        }

        let started_at = format_timestamp(self.clock.now());
        let record = self
            .store
            .create(
                tables::SHIFTS,
                fields([
                    (f::OPERATOR_ID, Value::from(operator_id)),
                    (f::OPERATOR_NAME, Value::from(operator_name)),
                    (f::STARTED_AT, Value::from(started_at)),
                ]),
            )
            .await?;
        let shift = Shift::from_record(&record)?;
        tracing::info!(shift_id = %shift.id, operator = operator_name, "shift opened");
        Ok(shift)
    }

    /// The shift with no end timestamp and the latest start, if any.
    pub async fn get_active_shift(&self) -> Result<Option<Shift>, CoordinatorError> {
        let query = Query::new()
            .filter(Filter::blank(f::ENDED_AT))
            .sort(Sort::desc(f::STARTED_AT))
            .limit(1);
        let records = self.store.query(tables::SHIFTS, &query).await?;
        records.first().map(Shift::from_record).transpose()
    }

    pub async fn get_shift(&self, shift_id: &str) -> Result<Shift, CoordinatorError> {
        let record = self
            .store
            .get(tables::SHIFTS, shift_id)
            .await
            .map_err(|e| CoordinatorError::from_lookup(e, "shift"))?;
        Shift::from_record(&record)
    }

    /// Close a shift. Only the operator whose name opened it may close it.
    pub async fn close_shift(
        &self,
        shift_id: &str,
        requesting_operator_name: &str,
    ) -> Result<Shift, CoordinatorError> {
        let shift = self.get_shift(shift_id).await?;

        if shift.operator_name != requesting_operator_name {
            tracing::warn!(
                shift_id,
                owner = %shift.operator_name,
                requested_by = requesting_operator_name,
                "shift close denied"
            );
            return Err(CoordinatorError::Forbidden(Denial {
                reason: DenialReason::NotShiftOwner,
                shift_id: Some(shift.id),
                shift_owner: Some(shift.operator_name),
                shift_started_at: Some(shift.started_at),
            }));
        }

        if let Some(ended_at) = shift.ended_at {
            return Err(CoordinatorError::ShiftAlreadyClosed {
                shift_id: shift.id,
                ended_at,
            });
        }

        let ended_at = format_timestamp(self.clock.now());
        let record = self
            .store
            .update(
                tables::SHIFTS,
                shift_id,
                fields([(f::ENDED_AT, Value::from(ended_at))]),
            )
            .await
            .map_err(|e| CoordinatorError::from_lookup(e, "shift"))?;
        let closed = Shift::from_record(&record)?;
        tracing::info!(shift_id, operator = requesting_operator_name, "shift closed");
        Ok(closed)
    }

    /// Most recent shifts first.
    pub async fn list_shifts(&self, limit: usize) -> Result<Vec<Shift>, CoordinatorError> {
        let query = Query::new().sort(Sort::desc(f::STARTED_AT)).limit(limit);
        self.store
            .query(tables::SHIFTS, &query)
            .await?
            .iter()
            .map(Shift::from_record)
            .collect()
    }
}
