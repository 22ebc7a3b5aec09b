use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::exemption::{
    ExemptionDraft, ExemptionId, ExemptionRecord, ExemptionStatus, HouseholdId, MemberId, Month,
    StaffDecision,
};
use super::store::ExemptionStore;
use super::tracker::{self, ComplianceStatus};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventPublisher};
use crate::rules::WorkRequirementPolicy;

/// Service composing exemption storage, staff decisions, and the month tracker.
pub struct ExemptionService<S, P> {
    store: Arc<S>,
    events: Arc<P>,
}

impl<S, P> ExemptionService<S, P>
where
    S: ExemptionStore,
    P: EventPublisher,
{
    pub fn new(store: Arc<S>, events: Arc<P>) -> Self {
        Self { store, events }
    }

    /// Record a new exemption claim in `pending`.
    pub fn submit(
        &self,
        draft: ExemptionDraft,
        now: DateTime<Utc>,
    ) -> Result<ExemptionRecord, EngineError> {
        let record = self.store.create(draft, now)?;
        info!(
            id = %record.id,
            exemption_type = record.exemption_type.label(),
            period = %record.period,
            "exemption submitted"
        );
        Ok(record)
    }

    /// Apply a staff decision. `expected` is the status the staff member saw;
    /// a write against a status that has since changed is a conflict.
    pub fn decide(
        &self,
        id: &ExemptionId,
        expected: ExemptionStatus,
        decision: StaffDecision,
        now: DateTime<Utc>,
    ) -> Result<ExemptionRecord, EngineError> {
        let current = self.store.fetch(id)?;
        if current.stored_status() != expected {
            return Err(EngineError::conflict(format!(
                "exemption {id} is {}, not {}",
                current.stored_status().label(),
                expected.label()
            )));
        }

        let updated = current.decide(decision, now)?;
        let stored = self.store.compare_and_set(expected, updated)?;

        info!(
            %id,
            from = expected.label(),
            to = stored.stored_status().label(),
            "exemption status changed"
        );
        self.events.publish(EngineEvent::ExemptionStatusChanged {
            occurred_at: now,
            previous_status: expected,
            record: stored.clone(),
        })?;
        Ok(stored)
    }

    /// Current status with expiry applied; reading never writes.
    pub fn status(
        &self,
        id: &ExemptionId,
        now: DateTime<Utc>,
    ) -> Result<ExemptionStatus, EngineError> {
        Ok(self.store.fetch(id)?.status_at(now))
    }

    pub fn compliance(
        &self,
        household: &HouseholdId,
        member: &MemberId,
        months: &[Month],
        policy: &WorkRequirementPolicy,
    ) -> Result<ComplianceStatus, EngineError> {
        let records = self.store.for_member(household, member)?;
        tracker::evaluate(household, member, months, &records, policy)
    }
}
