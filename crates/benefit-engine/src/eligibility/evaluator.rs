use serde::{Deserialize, Serialize};
use tracing::info;

use super::deductions::DeductionResult;
use super::domain::Household;
use crate::error::EngineError;
use crate::money::Money;
use crate::rules::{RuleTable, RuleTableKey};

/// Why a gross-income test was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipBasis {
    CategoricalEligibility,
    ElderlyOrDisabledHousehold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IncomeTest {
    Passed { income: Money, limit: Money },
    Failed { income: Money, limit: Money },
    Skipped { basis: SkipBasis },
    NotEvaluated,
}

impl IncomeTest {
    fn against(income: Money, limit: Money) -> Self {
        if income <= limit {
            Self::Passed { income, limit }
        } else {
            Self::Failed { income, limit }
        }
    }

    pub const fn failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTest {
    Passed,
    Failed,
    NotEvaluated,
}

/// Lifecycle of a determination. `Pending` exists only before evaluation;
/// both other states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeterminationStatus {
    Pending,
    Eligible,
    Ineligible,
}

impl DeterminationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Eligible => "eligible",
            Self::Ineligible => "ineligible",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    AllTestsPassed,
    GrossIncomeExceedsLimit,
    NetIncomeExceedsLimit,
    ResourcesExceedLimit,
}

impl VerdictReason {
    pub const fn summary(self) -> &'static str {
        match self {
            Self::AllTestsPassed => "household meets all eligibility tests",
            Self::GrossIncomeExceedsLimit => "gross income exceeds limit",
            Self::NetIncomeExceedsLimit => "net income exceeds limit",
            Self::ResourcesExceedLimit => "countable resources exceed limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub status: DeterminationStatus,
    pub reason: VerdictReason,
    pub gross_test: IncomeTest,
    pub net_test: IncomeTest,
    pub resource_test: ResourceTest,
    pub categorical_override_applied: bool,
    pub household_size: u8,
    pub rule_table: RuleTableKey,
}

impl EligibilityVerdict {
    pub fn summary(&self) -> String {
        format!("{}: {}", self.status.label(), self.reason.summary())
    }
}

/// Run the gross, net, and resource gates in order. The first failure is terminal.
///
/// `resources_within_limit` is the opaque answer of the asset-verification
/// collaborator.
pub fn evaluate(
    household: &Household,
    deductions: &DeductionResult,
    table: &RuleTable,
    resources_within_limit: bool,
) -> Result<EligibilityVerdict, EngineError> {
    household.validate()?;
    if deductions.gross_income != household.gross_income() {
        return Err(EngineError::validation(
            "deduction result was computed for a different household",
        ));
    }

    let limit = table.income_limit(household.size)?;
    let categorical = table.categorical_eligibility || household.categorical_program_participant;

    let gross_test = if categorical {
        IncomeTest::Skipped {
            basis: SkipBasis::CategoricalEligibility,
        }
    } else if household.has_elderly_or_disabled_member() {
        IncomeTest::Skipped {
            basis: SkipBasis::ElderlyOrDisabledHousehold,
        }
    } else {
        IncomeTest::against(household.gross_income(), limit.gross_limit)
    };

    let verdict = |reason: VerdictReason, net_test: IncomeTest, resource_test: ResourceTest| {
        let eligible = reason == VerdictReason::AllTestsPassed;
        EligibilityVerdict {
            eligible,
            status: if eligible {
                DeterminationStatus::Eligible
            } else {
                DeterminationStatus::Ineligible
            },
            reason,
            gross_test,
            net_test,
            resource_test,
            categorical_override_applied: categorical,
            household_size: household.size,
            rule_table: table.key.clone(),
        }
    };

    let result = if gross_test.failed() {
        verdict(
            VerdictReason::GrossIncomeExceedsLimit,
            IncomeTest::NotEvaluated,
            ResourceTest::NotEvaluated,
        )
    } else {
        let net_test = IncomeTest::against(deductions.net_income, limit.net_limit);
        if net_test.failed() {
            verdict(
                VerdictReason::NetIncomeExceedsLimit,
                net_test,
                ResourceTest::NotEvaluated,
            )
        } else if !resources_within_limit {
            verdict(
                VerdictReason::ResourcesExceedLimit,
                net_test,
                ResourceTest::Failed,
            )
        } else {
            verdict(VerdictReason::AllTestsPassed, net_test, ResourceTest::Passed)
        }
    };

    info!(
        table = %table.key,
        household_size = household.size,
        eligible = result.eligible,
        categorical = result.categorical_override_applied,
        reason = result.reason.summary(),
        "eligibility evaluated"
    );

    Ok(result)
}
