use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::money::{Money, Rate, RoundingUnit};
use crate::rules::RuleTable;

/// Share of net income a household is expected to contribute toward food.
pub const EXPECTED_CONTRIBUTION_RATE: Rate = Rate::from_percent(30);

/// Fraction of the benefit period a mid-period application covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proration {
    pub days_remaining: u32,
    pub total_days: u32,
}

impl Proration {
    pub fn new(days_remaining: u32, total_days: u32) -> Result<Self, EngineError> {
        if total_days == 0 || days_remaining > total_days {
            return Err(EngineError::validation(format!(
                "proration {days_remaining}/{total_days} is outside the benefit period"
            )));
        }
        Ok(Self {
            days_remaining,
            total_days,
        })
    }

    /// Coverage from the application date through the end of its calendar month.
    pub fn from_application_date(applied_on: NaiveDate) -> Result<Self, EngineError> {
        let month_start = applied_on
            .with_day(1)
            .ok_or_else(|| EngineError::validation("application date has no first day"))?;
        let next_month = month_start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| EngineError::validation("application date is out of range"))?;

        let total_days = u32::try_from((next_month - month_start).num_days())
            .map_err(|_| EngineError::validation("benefit period length is out of range"))?;
        let days_remaining = total_days + 1 - applied_on.day();
        Self::new(days_remaining, total_days)
    }

    pub const fn is_full_period(&self) -> bool {
        self.days_remaining == self.total_days
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllotmentResult {
    pub household_size: u8,
    pub net_income: Money,
    pub max_allotment: Money,
    pub expected_contribution: Money,
    pub monthly_benefit: Money,
    pub minimum_benefit_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proration: Option<Proration>,
    pub calculation_trace: Vec<String>,
}

/// Full-month benefit: the size's maximum allotment less 30% of net income.
pub fn compute(
    household_size: u8,
    net_income: Money,
    table: &RuleTable,
) -> Result<AllotmentResult, EngineError> {
    if net_income.is_negative() {
        return Err(EngineError::validation(format!(
            "net income cannot be negative (got {net_income})"
        )));
    }

    let max_allotment = table.max_allotment(household_size)?;
    let mode = table.rounding_mode;
    let expected_contribution =
        net_income.apply_rate(EXPECTED_CONTRIBUTION_RATE, RoundingUnit::Dollar, mode)?;
    let computed = (max_allotment - expected_contribution).floor_at_zero();

    let mut trace = vec![
        format!("maximum allotment for household of {household_size}: {max_allotment}"),
        format!(
            "expected contribution {} of {net_income} rounded {}: {expected_contribution}",
            EXPECTED_CONTRIBUTION_RATE,
            mode.label()
        ),
        format!("computed benefit floored at zero: {computed}"),
    ];

    let qualifies_for_minimum = household_size <= table.minimum_benefit_max_household_size;
    let minimum_benefit_applied = qualifies_for_minimum
        && computed > Money::ZERO
        && computed < table.minimum_benefit;
    let floored = if minimum_benefit_applied {
        trace.push(format!("raised to minimum benefit {}", table.minimum_benefit));
        table.minimum_benefit
    } else {
        computed
    };
    let monthly_benefit = floored.min(max_allotment);

    debug!(
        table = %table.key,
        household_size,
        net = %net_income,
        benefit = %monthly_benefit,
        minimum_benefit_applied,
        "allotment computed"
    );

    Ok(AllotmentResult {
        household_size,
        net_income,
        max_allotment,
        expected_contribution,
        monthly_benefit,
        minimum_benefit_applied,
        proration: None,
        calculation_trace: trace,
    })
}

/// Benefit for a partial first period, scaled by days covered.
pub fn compute_prorated(
    household_size: u8,
    net_income: Money,
    table: &RuleTable,
    proration: Proration,
) -> Result<AllotmentResult, EngineError> {
    let mut result = compute(household_size, net_income, table)?;
    if proration.is_full_period() {
        return Ok(result);
    }

    let full_month = result.monthly_benefit;
    result.monthly_benefit = full_month.scale(
        i64::from(proration.days_remaining),
        i64::from(proration.total_days),
        RoundingUnit::Dollar,
        table.rounding_mode,
    )?;
    result.calculation_trace.push(format!(
        "prorated {full_month} by {}/{} days rounded {}: {}",
        proration.days_remaining,
        proration.total_days,
        table.rounding_mode.label(),
        result.monthly_benefit
    ));
    result.proration = Some(proration);
    Ok(result)
}
