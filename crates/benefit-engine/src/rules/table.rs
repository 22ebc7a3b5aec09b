use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::money::{Money, RoundingMode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Jurisdiction(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramCode(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiscalYear(pub u16);

/// Lookup key for a published table. Matching is exact; there is no fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleTableKey {
    pub jurisdiction: Jurisdiction,
    pub program: ProgramCode,
    pub fiscal_year: FiscalYear,
}

impl RuleTableKey {
    pub fn new(jurisdiction: &str, program: &str, fiscal_year: u16) -> Self {
        Self {
            jurisdiction: Jurisdiction(jurisdiction.to_string()),
            program: ProgramCode(program.to_string()),
            fiscal_year: FiscalYear(fiscal_year),
        }
    }
}

impl fmt::Display for RuleTableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/FY{}",
            self.jurisdiction.0, self.program.0, self.fiscal_year.0
        )
    }
}

/// Monthly income thresholds for one household size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeLimit {
    pub gross_limit: Money,
    pub net_limit: Money,
    pub standard_deduction: Money,
}

/// Amounts added per member beyond the largest tabulated household size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalMemberIncrement {
    pub gross_limit: Money,
    pub net_limit: Money,
    pub max_allotment: Money,
}

/// Time limit for able-bodied adults without an exemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequirementPolicy {
    pub countable_month_limit: u8,
    pub window_months: u8,
}

impl Default for WorkRequirementPolicy {
    fn default() -> Self {
        Self {
            countable_month_limit: 3,
            window_months: 36,
        }
    }
}

/// Published, immutable policy parameters for one jurisdiction, program, and fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub key: RuleTableKey,
    pub income_limits: BTreeMap<u8, IncomeLimit>,
    pub allotment_caps: BTreeMap<u8, Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_member: Option<AdditionalMemberIncrement>,
    pub categorical_eligibility: bool,
    pub shelter_deduction_cap: Money,
    pub medical_expense_floor: Money,
    pub minimum_benefit: Money,
    pub minimum_benefit_max_household_size: u8,
    #[serde(default)]
    pub rounding_mode: RoundingMode,
    #[serde(default)]
    pub work_requirement: WorkRequirementPolicy,
}

impl RuleTable {
    /// Structural checks run before a table can be published.
    pub fn validate(&self) -> Result<(), EngineError> {
        let key = &self.key;
        if self.income_limits.is_empty() || self.allotment_caps.is_empty() {
            return Err(EngineError::validation(format!(
                "rule table {key} must tabulate at least one household size"
            )));
        }

        for (index, size) in self.income_limits.keys().enumerate() {
            if usize::from(*size) != index + 1 {
                return Err(EngineError::validation(format!(
                    "rule table {key} income limits must cover sizes 1..=n without gaps"
                )));
            }
        }

        if self.income_limits.keys().ne(self.allotment_caps.keys()) {
            return Err(EngineError::validation(format!(
                "rule table {key} allotment caps must cover the same sizes as income limits"
            )));
        }

        for (size, limit) in &self.income_limits {
            let amounts = [limit.gross_limit, limit.net_limit, limit.standard_deduction];
            if amounts.iter().any(|amount| amount.is_negative()) {
                return Err(EngineError::validation(format!(
                    "rule table {key} has a negative income limit for size {size}"
                )));
            }
            if limit.net_limit > limit.gross_limit {
                return Err(EngineError::validation(format!(
                    "rule table {key} net limit exceeds gross limit for size {size}"
                )));
            }
        }

        let scalars = [
            self.shelter_deduction_cap,
            self.medical_expense_floor,
            self.minimum_benefit,
        ];
        let caps_negative = self.allotment_caps.values().any(|cap| cap.is_negative());
        let increment_negative = self.additional_member.map_or(false, |increment| {
            [
                increment.gross_limit,
                increment.net_limit,
                increment.max_allotment,
            ]
            .iter()
            .any(|amount| amount.is_negative())
        });
        if caps_negative || increment_negative || scalars.iter().any(|amount| amount.is_negative())
        {
            return Err(EngineError::validation(format!(
                "rule table {key} contains negative amounts"
            )));
        }

        let policy = self.work_requirement;
        if policy.window_months == 0 || policy.countable_month_limit > policy.window_months {
            return Err(EngineError::validation(format!(
                "rule table {key} work requirement window must be non-empty and hold the limit"
            )));
        }

        Ok(())
    }

    pub fn largest_tabulated_size(&self) -> u8 {
        self.income_limits.keys().next_back().copied().unwrap_or(0)
    }

    /// Limits for `household_size`, extrapolating past the table with the
    /// per-member increment when one is published.
    pub fn income_limit(&self, household_size: u8) -> Result<IncomeLimit, EngineError> {
        self.ensure_size(household_size)?;
        if let Some(limit) = self.income_limits.get(&household_size) {
            return Ok(*limit);
        }

        let (extra, increment) = self.extrapolation(household_size)?;
        let base = self
            .income_limits
            .get(&self.largest_tabulated_size())
            .copied()
            .ok_or_else(|| EngineError::not_found("income limit", &self.key))?;

        Ok(IncomeLimit {
            gross_limit: base
                .gross_limit
                .checked_add(increment.gross_limit.checked_mul(extra)?)?,
            net_limit: base
                .net_limit
                .checked_add(increment.net_limit.checked_mul(extra)?)?,
            standard_deduction: base.standard_deduction,
        })
    }

    pub fn max_allotment(&self, household_size: u8) -> Result<Money, EngineError> {
        self.ensure_size(household_size)?;
        if let Some(cap) = self.allotment_caps.get(&household_size) {
            return Ok(*cap);
        }

        let (extra, increment) = self.extrapolation(household_size)?;
        let base = self
            .allotment_caps
            .get(&self.largest_tabulated_size())
            .copied()
            .ok_or_else(|| EngineError::not_found("allotment cap", &self.key))?;

        base.checked_add(increment.max_allotment.checked_mul(extra)?)
    }

    fn ensure_size(&self, household_size: u8) -> Result<(), EngineError> {
        if household_size == 0 {
            return Err(EngineError::validation("household size must be at least 1"));
        }
        Ok(())
    }

    fn extrapolation(
        &self,
        household_size: u8,
    ) -> Result<(i64, AdditionalMemberIncrement), EngineError> {
        let increment = self.additional_member.ok_or_else(|| {
            EngineError::validation(format!(
                "household size {household_size} exceeds rule table {} and no per-member increment is published",
                self.key
            ))
        })?;
        let extra = i64::from(household_size - self.largest_tabulated_size());
        Ok((extra, increment))
    }
}

#[cfg(test)]
pub(crate) fn sample_table(key: RuleTableKey) -> RuleTable {
    let limits = [
        (1, 1_632, 1_255, 198, 291),
        (2, 2_215, 1_704, 198, 535),
        (3, 2_798, 2_152, 198, 766),
        (4, 3_380, 2_600, 208, 973),
    ];

    let mut income_limits = BTreeMap::new();
    let mut allotment_caps = BTreeMap::new();
    for (size, gross, net, standard, cap) in limits {
        income_limits.insert(
            size,
            IncomeLimit {
                gross_limit: Money::from_dollars(gross),
                net_limit: Money::from_dollars(net),
                standard_deduction: Money::from_dollars(standard),
            },
        );
        allotment_caps.insert(size, Money::from_dollars(cap));
    }

    RuleTable {
        key,
        income_limits,
        allotment_caps,
        additional_member: Some(AdditionalMemberIncrement {
            gross_limit: Money::from_dollars(583),
            net_limit: Money::from_dollars(449),
            max_allotment: Money::from_dollars(219),
        }),
        categorical_eligibility: false,
        shelter_deduction_cap: Money::from_dollars(672),
        medical_expense_floor: Money::from_dollars(35),
        minimum_benefit: Money::from_dollars(23),
        minimum_benefit_max_household_size: 2,
        rounding_mode: RoundingMode::HalfUp,
        work_requirement: WorkRequirementPolicy::default(),
    }
}
