use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::money::Money;

/// Age at which a member counts as elderly for deduction and test purposes.
pub const ELDERLY_AGE: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub age: u8,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub student: bool,
}

impl HouseholdMember {
    pub const fn is_elderly(&self) -> bool {
        self.age >= ELDERLY_AGE
    }

    pub const fn is_elderly_or_disabled(&self) -> bool {
        self.is_elderly() || self.disabled
    }
}

/// How the household claims utility costs toward shelter.
///
/// Electing the standard allowance replaces itemized bills entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UtilityExpense {
    #[default]
    None,
    StandardAllowance {
        amount: Money,
    },
    Itemized {
        amount: Money,
    },
}

impl UtilityExpense {
    pub const fn amount(&self) -> Money {
        match self {
            UtilityExpense::None => Money::ZERO,
            UtilityExpense::StandardAllowance { amount } | UtilityExpense::Itemized { amount } => {
                *amount
            }
        }
    }
}

/// Monthly financial snapshot for one calculation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub size: u8,
    #[serde(default)]
    pub members: Vec<HouseholdMember>,
    #[serde(default)]
    pub gross_earned_income: Money,
    #[serde(default)]
    pub gross_unearned_income: Money,
    #[serde(default)]
    pub shelter_cost: Money,
    #[serde(default)]
    pub utilities: UtilityExpense,
    #[serde(default)]
    pub dependent_care_cost: Money,
    #[serde(default)]
    pub child_support_paid: Money,
    /// Out-of-pocket medical costs of elderly or disabled members only.
    #[serde(default)]
    pub medical_expenses: Money,
    /// Receives a benefit that confers categorical eligibility.
    #[serde(default)]
    pub categorical_program_participant: bool,
}

impl Household {
    /// Earned plus unearned income. Only meaningful once [`Household::validate`]
    /// has confirmed the sum is representable.
    pub fn gross_income(&self) -> Money {
        self.gross_earned_income + self.gross_unearned_income
    }

    pub fn has_elderly_or_disabled_member(&self) -> bool {
        self.members
            .iter()
            .any(HouseholdMember::is_elderly_or_disabled)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.size == 0 {
            return Err(EngineError::validation("household size must be at least 1"));
        }

        if !self.members.is_empty() && self.members.len() != usize::from(self.size) {
            return Err(EngineError::validation(format!(
                "household size {} does not match {} listed members",
                self.size,
                self.members.len()
            )));
        }

        let amounts = [
            ("gross earned income", self.gross_earned_income),
            ("gross unearned income", self.gross_unearned_income),
            ("shelter cost", self.shelter_cost),
            ("utility expense", self.utilities.amount()),
            ("dependent care cost", self.dependent_care_cost),
            ("child support paid", self.child_support_paid),
            ("medical expenses", self.medical_expenses),
        ];
        if let Some((label, amount)) = amounts.iter().find(|(_, amount)| amount.is_negative()) {
            return Err(EngineError::validation(format!(
                "{label} cannot be negative (got {amount})"
            )));
        }

        self.gross_earned_income.checked_add(self.gross_unearned_income)?;
        self.shelter_cost.checked_add(self.utilities.amount())?;

        Ok(())
    }
}
