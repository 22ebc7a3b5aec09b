use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::allotment::{self, AllotmentResult, Proration};
use super::deductions::{self, DeductionResult};
use super::domain::Household;
use super::evaluator::{self, EligibilityVerdict};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventPublisher};
use crate::rules::{RuleTable, RuleTableKey, RuleTableStore};

/// Asset/resource verification collaborator consulted by the resource gate.
pub trait AssetVerifier: Send + Sync {
    fn resources_within_limit(
        &self,
        household: &Household,
        table: &RuleTable,
    ) -> Result<bool, EngineError>;
}

/// Verifier that relays an answer already obtained by the caller.
#[derive(Debug, Clone, Copy)]
pub struct AttestedResources {
    pub within_limit: bool,
}

impl AssetVerifier for AttestedResources {
    fn resources_within_limit(
        &self,
        _household: &Household,
        _table: &RuleTable,
    ) -> Result<bool, EngineError> {
        Ok(self.within_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminationRequest {
    pub rule_table: RuleTableKey,
    pub household: Household,
    /// Set for an initial-month application so the allotment is prorated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_date: Option<NaiveDate>,
}

/// Fresh, immutable outcome of one determination request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Determination {
    pub deductions: DeductionResult,
    pub verdict: EligibilityVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allotment: Option<AllotmentResult>,
}

/// Service composing the rule table store, deduction stack, evaluator, and allotment.
pub struct DeterminationService<S, V, P> {
    store: Arc<S>,
    assets: Arc<V>,
    events: Arc<P>,
}

impl<S, V, P> DeterminationService<S, V, P>
where
    S: RuleTableStore,
    V: AssetVerifier,
    P: EventPublisher,
{
    pub fn new(store: Arc<S>, assets: Arc<V>, events: Arc<P>) -> Self {
        Self {
            store,
            assets,
            events,
        }
    }

    /// Determine eligibility and, when eligible, the monthly allotment.
    ///
    /// Re-running with changed inputs yields a new determination; nothing
    /// from an earlier call is mutated.
    pub fn determine(&self, request: &DeterminationRequest) -> Result<Determination, EngineError> {
        let table = self.store.rule_table(&request.rule_table)?;
        let household = &request.household;

        let deductions = deductions::compute(household, &table)?;
        let resources_within_limit = self.assets.resources_within_limit(household, &table)?;
        let verdict =
            evaluator::evaluate(household, &deductions, &table, resources_within_limit)?;

        let allotment = if verdict.eligible {
            let result = match request.application_date {
                Some(applied_on) => allotment::compute_prorated(
                    household.size,
                    deductions.net_income,
                    &table,
                    Proration::from_application_date(applied_on)?,
                )?,
                None => allotment::compute(household.size, deductions.net_income, &table)?,
            };
            Some(result)
        } else {
            None
        };

        let determination = Determination {
            deductions,
            verdict,
            allotment,
        };

        self.events.publish(EngineEvent::EligibilityDetermined {
            occurred_at: Utc::now(),
            determination: Box::new(determination.clone()),
        })?;

        Ok(determination)
    }
}
