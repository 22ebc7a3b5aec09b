use serde::{Deserialize, Serialize};
use tracing::debug;

use super::exemption::{
    ExemptionId, ExemptionRecord, ExemptionStatus, HouseholdId, MemberId, Month,
};
use crate::error::EngineError;
use crate::rules::WorkRequirementPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthState {
    Countable,
    Exempt,
    Sanctioned,
}

impl MonthState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Countable => "countable",
            Self::Exempt => "exempt",
            Self::Sanctioned => "sanctioned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthAssessment {
    pub month: Month,
    pub state: MonthState,
    /// Countable months inside the rolling window ending at this month.
    pub countable_in_window: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exemption: Option<ExemptionId>,
}

/// Per-member compliance picture returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub household: HouseholdId,
    pub member: MemberId,
    pub policy: WorkRequirementPolicy,
    pub months: Vec<MonthAssessment>,
    pub countable_months_used: u8,
    pub sanctioned: bool,
}

impl ComplianceStatus {
    pub fn current_state(&self) -> Option<MonthState> {
        self.months.last().map(|assessment| assessment.state)
    }

    pub fn remaining_countable_months(&self) -> u8 {
        self.policy
            .countable_month_limit
            .saturating_sub(self.countable_months_used)
    }
}

/// Walk `months` in calendar order and classify each one.
///
/// A month covered by a verified, unexpired exemption is exempt and lifts any
/// sanction. Otherwise it is sanctioned once the rolling window already holds
/// the countable-month limit, and stays sanctioned until an exempt month.
pub fn evaluate(
    household: &HouseholdId,
    member: &MemberId,
    months: &[Month],
    records: &[ExemptionRecord],
    policy: &WorkRequirementPolicy,
) -> Result<ComplianceStatus, EngineError> {
    if policy.window_months == 0 {
        return Err(EngineError::validation(
            "work requirement window must be at least one month",
        ));
    }

    let mut ordered = months.to_vec();
    ordered.sort_unstable();
    if let Some(pair) = ordered.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(EngineError::validation(format!(
            "month {} is listed more than once",
            pair[0]
        )));
    }

    let verified: Vec<&ExemptionRecord> = records
        .iter()
        .filter(|record| record.same_subject(household, member))
        .filter(|record| record.stored_status() == ExemptionStatus::Verified)
        .collect();

    let window = i64::from(policy.window_months);
    let mut counted: Vec<Month> = Vec::new();
    let mut sanction_in_force = false;
    let mut assessments = Vec::with_capacity(ordered.len());

    for month in ordered {
        let in_window = counted
            .iter()
            .filter(|earlier| month.months_since(**earlier) < window)
            .count();
        let in_window = u8::try_from(in_window).unwrap_or(u8::MAX);
        let covering = covering_record(&verified, month)?;

        let (state, exemption) = match covering {
            Some(record) => {
                sanction_in_force = false;
                (MonthState::Exempt, Some(record.id.clone()))
            }
            None if sanction_in_force || in_window >= policy.countable_month_limit => {
                sanction_in_force = true;
                (MonthState::Sanctioned, None)
            }
            None => {
                counted.push(month);
                (MonthState::Countable, None)
            }
        };

        let countable_in_window = if state == MonthState::Countable {
            in_window.saturating_add(1)
        } else {
            in_window
        };
        debug!(
            %month,
            state = state.label(),
            countable_in_window,
            "work requirement month assessed"
        );
        assessments.push(MonthAssessment {
            month,
            state,
            countable_in_window,
            exemption,
        });
    }

    let countable_months_used = assessments
        .last()
        .map(|assessment| assessment.countable_in_window)
        .unwrap_or(0);

    Ok(ComplianceStatus {
        household: household.clone(),
        member: member.clone(),
        policy: *policy,
        months: assessments,
        countable_months_used,
        sanctioned: sanction_in_force,
    })
}

/// The single verified record suppressing `month`. Two records that both
/// suppress the same month conflict; overlap on paper after one has expired
/// does not.
fn covering_record<'a>(
    verified: &[&'a ExemptionRecord],
    month: Month,
) -> Result<Option<&'a ExemptionRecord>, EngineError> {
    let mut suppressing = verified
        .iter()
        .copied()
        .filter(|record| record.suppresses(month));
    let first = suppressing.next();
    if let (Some(first), Some(second)) = (first, suppressing.next()) {
        return Err(EngineError::conflict(format!(
            "verified exemptions {} and {} both cover {month}",
            first.id, second.id
        )));
    }
    Ok(first)
}
