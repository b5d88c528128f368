//! Monitoring continuity chain.
//!
//! Each equipment has a ledger of counter intervals. Recording a new interval
//! first closes the open one by copying the new initial readings into its
//! final readings, so consecutive intervals always meet exactly.

use std::sync::Arc;

use planta_storage::{Filter, Query, RecordStore, Sort};
use serde::Serialize;
use serde_json::Value;

use crate::clock::{format_timestamp, Clock};
use crate::equipment::{latest_state, lookup_equipment};
use crate::error::CoordinatorError;
use crate::lock::KeyedLocks;
use crate::model::{fields, final_fields, initial_fields, MonitoringInterval, Readings};
use crate::schema::{monitoring as f, tables};
use crate::shift::ShiftManager;

/// What `record_interval` changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalOutcome {
    /// The previously open interval, now closed. `None` for the first
    /// interval of an equipment.
    pub closed_previous: Option<MonitoringInterval>,
    pub opened: MonitoringInterval,
}

/// Two neighbouring intervals whose counters do not meet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerGap {
    pub closed_id: String,
    pub next_id: String,
    pub closed_final: Option<Readings>,
    pub next_initial: Readings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReport {
    pub equipment_id: String,
    pub intervals: usize,
    pub open_intervals: usize,
    pub gaps: Vec<LedgerGap>,
}

impl LedgerReport {
    /// A healthy non-empty ledger has no gaps and exactly one open interval,
    /// its latest. Zero open intervals means a close landed without its
    /// matching open.
    pub fn is_contiguous(&self) -> bool {
        let open_ok = match self.intervals {
            0 => self.open_intervals == 0,
            _ => self.open_intervals == 1,
        };
        self.gaps.is_empty() && open_ok
    }
}

pub struct MonitoringChain<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    shifts: Arc<ShiftManager<S>>,
    locks: KeyedLocks,
}

impl<S: RecordStore + ?Sized> MonitoringChain<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, shifts: Arc<ShiftManager<S>>) -> Self {
        Self {
            store,
            clock,
            shifts,
            locks: KeyedLocks::new(),
        }
    }

    /// Close the open interval (if any) with `initial` as its final
    /// readings, then open a new interval starting at `initial`.
    pub async fn record_interval(
        &self,
        equipment_id: &str,
        operator_name: &str,
        initial: Readings,
    ) -> Result<IntervalOutcome, CoordinatorError> {
        initial.validate()?;
        let _guard = self.locks.lock(equipment_id).await;
        lookup_equipment(&*self.store, equipment_id).await?;

        let closed_previous = match self.get_open_interval(equipment_id).await? {
            None => None,
            Some(open) => {
                let updated = self
                    .store
                    .update(tables::MONITORING, &open.id, final_fields(&initial))
                    .await
                    .map_err(|e| CoordinatorError::from_lookup(e, "monitoring interval"))?;
                Some(MonitoringInterval::from_record(&updated)?)
            }
        };

        let shift_id = self.shifts.get_active_shift().await?.map(|s| s.id);
        let state_record_id = latest_state(&*self.store, equipment_id)
            .await?
            .map(|r| r.id);

        let mut row = fields([
            (f::EQUIPMENT, Value::from(equipment_id)),
            (f::OPERATOR_NAME, Value::from(operator_name)),
            (f::RECORDED_AT, Value::from(format_timestamp(self.clock.now()))),
            (f::SHIFT, shift_id.into()),
            (f::STATE_RECORD, state_record_id.into()),
        ]);
        row.extend(initial_fields(&initial));

        let created = match self.store.create(tables::MONITORING, row).await {
            Ok(created) => created,
            Err(err) => {
                if let Some(closed) = &closed_previous {
                    tracing::warn!(
                        equipment_id,
                        closed_id = %closed.id,
                        error = %err,
                        "previous interval closed but new interval not opened"
                    );
                }
                return Err(err.into());
            }
        };
        let opened = MonitoringInterval::from_record(&created)?;

        tracing::info!(
            equipment_id,
            interval_id = %opened.id,
            closed_previous = closed_previous.as_ref().map(|c| c.id.as_str()),
            "monitoring interval recorded"
        );
        Ok(IntervalOutcome {
            closed_previous,
            opened,
        })
    }

    /// The most recent interval of `equipment_id` without final readings.
    pub async fn get_open_interval(
        &self,
        equipment_id: &str,
    ) -> Result<Option<MonitoringInterval>, CoordinatorError> {
        let query = Query::new()
            .filter(Filter::eq(f::EQUIPMENT, equipment_id).and(Filter::blank(f::HOROMETER_END)))
            .sort(Sort::desc(f::RECORDED_AT))
            .limit(1);
        let records = self.store.query(tables::MONITORING, &query).await?;
        records
            .first()
            .map(MonitoringInterval::from_record)
            .transpose()
    }

    /// Every interval of `equipment_id`, oldest first.
    pub async fn ledger(
        &self,
        equipment_id: &str,
    ) -> Result<Vec<MonitoringInterval>, CoordinatorError> {
        let query = Query::new()
            .filter(Filter::eq(f::EQUIPMENT, equipment_id))
            .sort(Sort::asc(f::RECORDED_AT));
        self.store
            .query(tables::MONITORING, &query)
            .await?
            .iter()
            .map(MonitoringInterval::from_record)
            .collect()
    }

    /// Walk the ledger and report breaks in the chain.
    pub async fn verify_ledger(
        &self,
        equipment_id: &str,
    ) -> Result<LedgerReport, CoordinatorError> {
        let ledger = self.ledger(equipment_id).await?;
        Ok(check_continuity(equipment_id, &ledger))
    }
}

/// Every interval but the last must be closed, and its final readings must
/// equal the next interval's initial readings.
pub fn check_continuity(equipment_id: &str, ledger: &[MonitoringInterval]) -> LedgerReport {
    let gaps = ledger
        .windows(2)
        .filter(|pair| pair[0].final_readings != Some(pair[1].initial))
        .map(|pair| LedgerGap {
            closed_id: pair[0].id.clone(),
            next_id: pair[1].id.clone(),
            closed_final: pair[0].final_readings,
            next_initial: pair[1].initial,
        })
        .collect();
    LedgerReport {
        equipment_id: equipment_id.to_string(),
        intervals: ledger.len(),
        open_intervals: ledger.iter().filter(|i| i.is_open()).count(),
        gaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use planta_storage::MemoryStore;
    use serde_json::json;
    use time::macros::datetime;

    type Fixture = (
        Arc<MemoryStore>,
        Arc<ShiftManager<MemoryStore>>,
        MonitoringChain<MemoryStore>,
    );

    fn chain() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        for id in ["motor-1", "motor-2"] {
            store
                .insert_with_id(
                    tables::EQUIPMENT,
                    id,
                    json!({"Nombre": id}).as_object().cloned().unwrap(),
                )
                .unwrap();
        }
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(datetime!(2026-05-01 06:00:00 UTC)));
        let shifts = Arc::new(ShiftManager::new(Arc::clone(&store), Arc::clone(&clock)));
        let chain = MonitoringChain::new(Arc::clone(&store), clock, Arc::clone(&shifts));
        (store, shifts, chain)
    }

    fn readings(horometer: f64, starts: f64, m3: f64, kw: f64) -> Readings {
        Readings {
            horometer,
            starts,
            m3,
            kw,
        }
    }

    #[tokio::test]
    async fn first_interval_has_no_previous_and_stays_open() {
        let (_, _, chain) = chain();
        let out = chain
            .record_interval("motor-1", "Ana", readings(100.0, 5.0, 10.0, 50.0))
            .await
            .unwrap();
        assert!(out.closed_previous.is_none());
        assert!(out.opened.is_open());
        assert_eq!(out.opened.initial, readings(100.0, 5.0, 10.0, 50.0));
        assert_eq!(out.opened.shift_id, None);
    }

    #[tokio::test]
    async fn second_interval_closes_first_with_its_initial_readings() {
        let (_, shifts, chain) = chain();
        let shift = shifts.open_shift("op-1", "Ana").await.unwrap();
        let first = chain
            .record_interval("motor-1", "Ana", readings(100.0, 5.0, 10.0, 50.0))
            .await
            .unwrap()
            .opened;
        let second_start = readings(108.5, 6.0, 250.0, 900.0);
        let out = chain
            .record_interval("motor-1", "Ana", second_start)
            .await
            .unwrap();

        let closed = out.closed_previous.unwrap();
        assert_eq!(closed.id, first.id);
        assert_eq!(closed.final_readings, Some(second_start));
        assert_eq!(closed.initial, first.initial);
        assert_eq!(out.opened.shift_id, Some(shift.id));

        let open = chain.get_open_interval("motor-1").await.unwrap().unwrap();
        assert_eq!(open.id, out.opened.id);
        let ledger = chain.ledger("motor-1").await.unwrap();
        assert_eq!(ledger.iter().filter(|i| i.is_open()).count(), 1);
        assert!(chain.verify_ledger("motor-1").await.unwrap().is_contiguous());
    }

    #[tokio::test]
    async fn chains_are_independent_per_equipment() {
        let (_, _, chain) = chain();
        chain
            .record_interval("motor-1", "Ana", readings(1.0, 1.0, 1.0, 1.0))
            .await
            .unwrap();
        let out = chain
            .record_interval("motor-2", "Ana", readings(2.0, 2.0, 2.0, 2.0))
            .await
            .unwrap();
        assert!(out.closed_previous.is_none());
        assert!(chain.get_open_interval("motor-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_equipment_is_not_found() {
        let (store, _, chain) = chain();
        let err = chain
            .record_interval("motor-9", "Ana", readings(1.0, 1.0, 1.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound { kind: "equipment", .. }));
        assert!(store.is_empty(tables::MONITORING));
    }

    #[tokio::test]
    async fn non_finite_reading_is_rejected_and_ledger_stays_usable() {
        let (store, _, chain) = chain();
        let first = chain
            .record_interval("motor-1", "Ana", readings(100.0, 5.0, 10.0, 50.0))
            .await
            .unwrap()
            .opened;

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = chain
                .record_interval("motor-1", "Ana", readings(bad, 7.0, 12.0, 52.0))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                CoordinatorError::InvalidReadings { field: "horometer", .. }
            ));
        }
        let err = chain
            .record_interval("motor-1", "Ana", readings(120.0, 7.0, 12.0, f64::NAN))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidReadings { field: "kw", .. }));

        // Nothing was written: the first interval is still the open one.
        assert_eq!(store.len(tables::MONITORING), 1);
        let open = chain.get_open_interval("motor-1").await.unwrap().unwrap();
        assert_eq!(open.id, first.id);

        let out = chain
            .record_interval("motor-1", "Ana", readings(120.0, 7.0, 12.0, 52.0))
            .await
            .unwrap();
        assert_eq!(out.closed_previous.unwrap().id, first.id);
        let report = chain.verify_ledger("motor-1").await.unwrap();
        assert_eq!(report.intervals, 2);
        assert!(report.is_contiguous());
    }

    #[tokio::test]
    async fn concurrent_records_keep_a_single_open_interval() {
        let (_, _, chain) = chain();
        let chain = Arc::new(chain);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let chain = Arc::clone(&chain);
                tokio::spawn(async move {
                    let v = f64::from(i);
                    chain
                        .record_interval("motor-1", "Ana", readings(v, v, v, v))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let report = chain.verify_ledger("motor-1").await.unwrap();
        assert_eq!(report.intervals, 8);
        assert_eq!(report.open_intervals, 1);
        assert!(report.gaps.is_empty(), "{:?}", report.gaps);
    }

    #[test]
    fn continuity_check_flags_mismatched_neighbours() {
        let interval = |id: &str, initial: Readings, fin: Option<Readings>| MonitoringInterval {
            id: id.to_string(),
            equipment_id: "motor-1".to_string(),
            operator_name: "Ana".to_string(),
            recorded_at: String::new(),
            initial,
            final_readings: fin,
            shift_id: None,
            state_record_id: None,
        };
        let a = readings(1.0, 1.0, 1.0, 1.0);
        let b = readings(2.0, 2.0, 2.0, 2.0);
        let c = readings(3.0, 3.0, 3.0, 3.0);
        let ledger = vec![
            interval("recA", a, Some(b)),
            interval("recB", c, None),
        ];
        let report = check_continuity("motor-1", &ledger);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].closed_id, "recA");
        assert!(!report.is_contiguous());
    }
}
