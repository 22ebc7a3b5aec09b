use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::warn;

use super::exemption::{
    ExemptionDraft, ExemptionId, ExemptionRecord, ExemptionStatus, HouseholdId, MemberId,
};
use crate::error::EngineError;

/// Storage for exemption records. Writes are compare-and-set on the stored status.
pub trait ExemptionStore: Send + Sync {
    /// Store a new pending record, rejecting an overlap with an active one.
    fn create(
        &self,
        draft: ExemptionDraft,
        now: DateTime<Utc>,
    ) -> Result<ExemptionRecord, EngineError>;

    fn fetch(&self, id: &ExemptionId) -> Result<ExemptionRecord, EngineError>;

    /// Replace a record only if its stored status still equals `expected`.
    fn compare_and_set(
        &self,
        expected: ExemptionStatus,
        record: ExemptionRecord,
    ) -> Result<ExemptionRecord, EngineError>;

    fn for_member(
        &self,
        household: &HouseholdId,
        member: &MemberId,
    ) -> Result<Vec<ExemptionRecord>, EngineError>;
}

#[derive(Debug)]
pub struct InMemoryExemptionStore {
    records: Mutex<BTreeMap<ExemptionId, ExemptionRecord>>,
    sequence: AtomicU64,
}

impl Default for InMemoryExemptionStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            sequence: AtomicU64::new(1),
        }
    }
}

impl InMemoryExemptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ExemptionId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        ExemptionId(format!("exm-{id:06}"))
    }
}

impl ExemptionStore for InMemoryExemptionStore {
    fn create(
        &self,
        draft: ExemptionDraft,
        now: DateTime<Utc>,
    ) -> Result<ExemptionRecord, EngineError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        let clash = guard.values().find(|existing| {
            existing.same_subject(&draft.household, &draft.member)
                && existing.period.overlaps(&draft.period)
                && existing.is_active_at(now)
        });
        if let Some(existing) = clash {
            warn!(
                existing = %existing.id,
                period = %draft.period,
                "overlapping exemption claim rejected"
            );
            return Err(EngineError::conflict(format!(
                "exemption {} already covers part of {} for this member",
                existing.id, draft.period
            )));
        }

        let record = ExemptionRecord::pending(self.next_id(), draft, now);
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ExemptionId) -> Result<ExemptionRecord, EngineError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("exemption", id))
    }

    fn compare_and_set(
        &self,
        expected: ExemptionStatus,
        record: ExemptionRecord,
    ) -> Result<ExemptionRecord, EngineError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let current = guard
            .get(&record.id)
            .ok_or_else(|| EngineError::not_found("exemption", &record.id))?;

        if current.stored_status() != expected {
            warn!(
                id = %record.id,
                expected = expected.label(),
                actual = current.stored_status().label(),
                "stale exemption write rejected"
            );
            return Err(EngineError::conflict(format!(
                "exemption {} is {}, not {}",
                record.id,
                current.stored_status().label(),
                expected.label()
            )));
        }

        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn for_member(
        &self,
        household: &HouseholdId,
        member: &MemberId,
    ) -> Result<Vec<ExemptionRecord>, EngineError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .values()
            .filter(|record| record.same_subject(household, member))
            .cloned()
            .collect())
    }
}
