use super::common::*;
use crate::eligibility::deductions::compute;
use crate::eligibility::evaluator::{
    evaluate, DeterminationStatus, EligibilityVerdict, IncomeTest, ResourceTest, SkipBasis,
    VerdictReason,
};
use crate::error::EngineError;
use crate::money::Money;
use crate::rules::RuleTable;

fn verdict_for(
    household: &crate::eligibility::domain::Household,
    table: &RuleTable,
) -> EligibilityVerdict {
    let deductions = compute(household, table).expect("deductions compute");
    evaluate(household, &deductions, table, true).expect("verdict")
}

#[test]
fn reference_household_passes_gross_and_net_tests() {
    let verdict = verdict_for(&reference_household(), &table());

    assert!(verdict.eligible);
    assert_eq!(verdict.status, DeterminationStatus::Eligible);
    assert_eq!(verdict.reason, VerdictReason::AllTestsPassed);
    assert_eq!(
        verdict.gross_test,
        IncomeTest::Passed {
            income: Money::from_dollars(2_500),
            limit: Money::from_dollars(2_798),
        }
    );
    assert_eq!(
        verdict.net_test,
        IncomeTest::Passed {
            income: Money::from_dollars(1_603),
            limit: Money::from_dollars(2_152),
        }
    );
    assert_eq!(verdict.resource_test, ResourceTest::Passed);
    assert!(!verdict.categorical_override_applied);
}

#[test]
fn gross_test_failure_is_terminal() {
    let verdict = verdict_for(&earner_household(1, 2_000), &table());

    assert!(!verdict.eligible);
    assert_eq!(verdict.status, DeterminationStatus::Ineligible);
    assert_eq!(verdict.reason, VerdictReason::GrossIncomeExceedsLimit);
    assert_eq!(verdict.net_test, IncomeTest::NotEvaluated);
    assert_eq!(verdict.resource_test, ResourceTest::NotEvaluated);
    assert!(verdict.summary().contains("gross income exceeds limit"));
}

#[test]
fn categorical_eligibility_skips_gross_test_but_not_net_test() {
    let mut household = earner_household(1, 1_900);
    household.shelter_cost = Money::from_dollars(800);

    let standard = verdict_for(&household, &table());
    assert_eq!(standard.reason, VerdictReason::GrossIncomeExceedsLimit);

    let categorical = verdict_for(&household, &categorical_table());
    assert!(categorical.eligible);
    assert!(categorical.categorical_override_applied);
    assert_eq!(
        categorical.gross_test,
        IncomeTest::Skipped {
            basis: SkipBasis::CategoricalEligibility
        }
    );

    let high_net = verdict_for(&earner_household(1, 2_400), &categorical_table());
    assert!(!high_net.eligible);
    assert_eq!(high_net.reason, VerdictReason::NetIncomeExceedsLimit);
    assert!(high_net.categorical_override_applied);
}

#[test]
fn household_participation_also_confers_categorical_eligibility() {
    let mut household = earner_household(1, 1_900);
    household.shelter_cost = Money::from_dollars(800);
    household.categorical_program_participant = true;

    let verdict = verdict_for(&household, &table());
    assert!(verdict.eligible);
    assert!(verdict.categorical_override_applied);
}

#[test]
fn elderly_households_skip_gross_test_only() {
    let mut household = earner_household(1, 0);
    household.gross_unearned_income = Money::from_dollars(1_700);
    household.shelter_cost = Money::from_dollars(1_100);
    household.members = vec![adult(72)];

    let verdict = verdict_for(&household, &table());
    assert_eq!(
        verdict.gross_test,
        IncomeTest::Skipped {
            basis: SkipBasis::ElderlyOrDisabledHousehold
        }
    );
    assert!(!verdict.categorical_override_applied);
    assert!(verdict.eligible, "net income within limit: {verdict:?}");

    household.shelter_cost = Money::ZERO;
    let over_net = verdict_for(&household, &table());
    assert_eq!(over_net.reason, VerdictReason::NetIncomeExceedsLimit);
}

#[test]
fn resource_gate_is_applied_after_income_tests() {
    let household = reference_household();
    let table = table();
    let deductions = compute(&household, &table).expect("deductions compute");

    let verdict = evaluate(&household, &deductions, &table, false).expect("verdict");
    assert!(!verdict.eligible);
    assert_eq!(verdict.reason, VerdictReason::ResourcesExceedLimit);
    assert_eq!(verdict.resource_test, ResourceTest::Failed);
    assert!(matches!(verdict.net_test, IncomeTest::Passed { .. }));
}

#[test]
fn zero_gross_income_never_fails_gross_test() {
    for table in [table(), categorical_table()] {
        for size in 1..=8u8 {
            let verdict = verdict_for(&earner_household(size, 0), &table);
            assert!(!verdict.gross_test.failed(), "size {size}: {verdict:?}");
            assert!(verdict.eligible);
        }
    }
}

#[test]
fn categorical_eligibility_never_tightens() {
    let standard_table = table();
    let categorical = categorical_table();
    for size in 1..=5u8 {
        for earned in (0..=4_000).step_by(250) {
            for shelter in [0, 600, 1_400] {
                let mut household = earner_household(size, earned);
                household.shelter_cost = Money::from_dollars(shelter);

                let standard = verdict_for(&household, &standard_table);
                if standard.eligible {
                    let relaxed = verdict_for(&household, &categorical);
                    assert!(
                        relaxed.eligible,
                        "categorical tightened size {size} earned {earned} shelter {shelter}"
                    );
                }
            }
        }
    }
}

#[test]
fn rejects_deductions_from_another_household() {
    let table = table();
    let other = compute(&earner_household(3, 900), &table).expect("deductions compute");
    match evaluate(&reference_household(), &other, &table, true) {
        Err(EngineError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn verdict_json_round_trip_is_lossless() {
    let verdict = verdict_for(&reference_household(), &categorical_table());
    let json = serde_json::to_string(&verdict).expect("serializes");
    let back: EligibilityVerdict = serde_json::from_str(&json).expect("deserializes");
    assert_eq!(back, verdict);
}
