use std::sync::Arc;

use crate::eligibility::domain::{Household, HouseholdMember, UtilityExpense};
use crate::eligibility::service::{AttestedResources, DeterminationService};
use crate::events::InMemoryEventLog;
use crate::money::Money;
use crate::rules::{sample_table, InMemoryRuleTableStore, RuleTable, RuleTableKey};

pub(super) fn table_key() -> RuleTableKey {
    RuleTableKey::new("US-48", "SNAP", 2024)
}

pub(super) fn table() -> RuleTable {
    sample_table(table_key())
}

pub(super) fn categorical_table() -> RuleTable {
    let mut table = table();
    table.categorical_eligibility = true;
    table
}

pub(super) fn adult(age: u8) -> HouseholdMember {
    HouseholdMember {
        age,
        disabled: false,
        student: false,
    }
}

pub(super) fn earner_household(size: u8, earned_dollars: i64) -> Household {
    Household {
        size,
        members: Vec::new(),
        gross_earned_income: Money::from_dollars(earned_dollars),
        gross_unearned_income: Money::ZERO,
        shelter_cost: Money::ZERO,
        utilities: UtilityExpense::None,
        dependent_care_cost: Money::ZERO,
        child_support_paid: Money::ZERO,
        medical_expenses: Money::ZERO,
        categorical_program_participant: false,
    }
}

/// Size 3, $2,500 earned, $900 rent, $200 standard utility allowance.
pub(super) fn reference_household() -> Household {
    Household {
        shelter_cost: Money::from_dollars(900),
        utilities: UtilityExpense::StandardAllowance {
            amount: Money::from_dollars(200),
        },
        ..earner_household(3, 2_500)
    }
}

pub(super) fn build_service(
    resources_within_limit: bool,
) -> (
    DeterminationService<InMemoryRuleTableStore, AttestedResources, InMemoryEventLog>,
    Arc<InMemoryEventLog>,
) {
    let store = Arc::new(InMemoryRuleTableStore::new());
    store.publish(table()).expect("sample table publishes");
    let events = Arc::new(InMemoryEventLog::default());
    let service = DeterminationService::new(
        store,
        Arc::new(AttestedResources {
            within_limit: resources_within_limit,
        }),
        events.clone(),
    );
    (service, events)
}
