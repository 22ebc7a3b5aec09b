use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::Household;
use crate::error::EngineError;
use crate::money::{Money, Rate, RoundingMode, RoundingUnit};
use crate::rules::RuleTable;

/// Flat share of gross earned income disregarded before any other deduction.
pub const EARNED_INCOME_DEDUCTION_RATE: Rate = Rate::from_percent(20);

/// Share of post-deduction income a household is expected to put toward shelter.
const SHELTER_INCOME_SHARE: Rate = Rate::from_percent(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionKind {
    EarnedIncome,
    Standard,
    DependentCare,
    ChildSupport,
    Medical,
    ExcessShelter,
}

impl DeductionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::EarnedIncome => "earned income deduction",
            Self::Standard => "standard deduction",
            Self::DependentCare => "dependent care deduction",
            Self::ChildSupport => "child support deduction",
            Self::Medical => "excess medical deduction",
            Self::ExcessShelter => "excess shelter deduction",
        }
    }
}

/// One applied deduction, recorded in the mandated order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionStep {
    pub kind: DeductionKind,
    pub amount: Money,
    pub income_after: Money,
}

/// Ordered deduction breakdown and the countable (net) income it yields.
///
/// Amounts are what was actually applied, so gross income minus every step
/// equals `net_income`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionResult {
    pub gross_income: Money,
    pub earned_income_deduction: Money,
    pub standard_deduction: Money,
    pub dependent_care_deduction: Money,
    pub child_support_deduction: Money,
    pub medical_deduction: Money,
    pub excess_shelter_deduction: Money,
    pub shelter_cap_applied: bool,
    pub net_income: Money,
    pub steps: Vec<DeductionStep>,
}

impl DeductionResult {
    pub fn total_deductions(&self) -> Money {
        self.steps.iter().map(|step| step.amount).sum()
    }
}

struct Ledger {
    income: Money,
    steps: Vec<DeductionStep>,
}

impl Ledger {
    /// Subtract up to `requested`, never taking income below zero.
    fn apply(&mut self, kind: DeductionKind, requested: Money) -> Money {
        let applied = requested.floor_at_zero().min(self.income);
        self.income -= applied;
        self.steps.push(DeductionStep {
            kind,
            amount: applied,
            income_after: self.income,
        });
        applied
    }
}

/// Apply the deduction stack to produce countable income.
///
/// The order is fixed: earned income, standard, dependent care, child support,
/// excess medical, excess shelter. Reordering changes the legal result.
pub fn compute(household: &Household, table: &RuleTable) -> Result<DeductionResult, EngineError> {
    household.validate()?;
    let limit = table.income_limit(household.size)?;
    let elderly_or_disabled = household.has_elderly_or_disabled_member();

    let gross_income = household.gross_income();
    let mut ledger = Ledger {
        income: gross_income,
        steps: Vec::with_capacity(6),
    };

    let earned_requested = household.gross_earned_income.apply_rate(
        EARNED_INCOME_DEDUCTION_RATE,
        RoundingUnit::Cent,
        RoundingMode::HalfUp,
    )?;
    let earned_income_deduction = ledger.apply(DeductionKind::EarnedIncome, earned_requested);
    let standard_deduction = ledger.apply(DeductionKind::Standard, limit.standard_deduction);
    let dependent_care_deduction =
        ledger.apply(DeductionKind::DependentCare, household.dependent_care_cost);
    let child_support_deduction =
        ledger.apply(DeductionKind::ChildSupport, household.child_support_paid);

    let medical_deduction = if elderly_or_disabled
        && household.medical_expenses > table.medical_expense_floor
    {
        ledger.apply(
            DeductionKind::Medical,
            household.medical_expenses - table.medical_expense_floor,
        )
    } else {
        Money::ZERO
    };

    let shelter_floor =
        ledger
            .income
            .apply_rate(SHELTER_INCOME_SHARE, RoundingUnit::Cent, RoundingMode::HalfUp)?;
    let shelter_total = household
        .shelter_cost
        .checked_add(household.utilities.amount())?;
    let uncapped_excess = (shelter_total - shelter_floor).floor_at_zero();
    let shelter_cap_applied =
        !elderly_or_disabled && uncapped_excess > table.shelter_deduction_cap;
    let excess_requested = if shelter_cap_applied {
        table.shelter_deduction_cap
    } else {
        uncapped_excess
    };
    let excess_shelter_deduction = ledger.apply(DeductionKind::ExcessShelter, excess_requested);

    debug!(
        table = %table.key,
        gross = %gross_income,
        shelter_total = %shelter_total,
        shelter_floor = %shelter_floor,
        net = %ledger.income,
        shelter_cap_applied,
        "deductions computed"
    );

    Ok(DeductionResult {
        gross_income,
        earned_income_deduction,
        standard_deduction,
        dependent_care_deduction,
        child_support_deduction,
        medical_deduction,
        excess_shelter_deduction,
        shelter_cap_applied,
        net_income: ledger.income,
        steps: ledger.steps,
    })
}
