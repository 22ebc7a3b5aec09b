use std::sync::Arc;
use std::thread;

use benefit_engine::eligibility::{
    AttestedResources, DeterminationRequest, DeterminationService, IncomeTest, SkipBasis,
    VerdictReason,
};
use benefit_engine::events::{EngineEvent, InMemoryEventLog};
use benefit_engine::rules::{InMemoryRuleTableStore, RuleTable, RuleTableKey, RuleTableStore};
use benefit_engine::{EngineError, Money};
use serde_json::json;

fn store() -> Arc<InMemoryRuleTableStore> {
    let csv = include_bytes!("../fixtures/rule_tables.csv");
    Arc::new(InMemoryRuleTableStore::from_csv_reader(&csv[..]).expect("fixture tables publish"))
}

fn service(
    store: Arc<InMemoryRuleTableStore>,
) -> (
    DeterminationService<InMemoryRuleTableStore, AttestedResources, InMemoryEventLog>,
    Arc<InMemoryEventLog>,
) {
    let events = Arc::new(InMemoryEventLog::default());
    let service = DeterminationService::new(
        store,
        Arc::new(AttestedResources { within_limit: true }),
        events.clone(),
    );
    (service, events)
}

fn reference_request(fiscal_year: u16) -> DeterminationRequest {
    serde_json::from_value(json!({
        "rule_table": { "jurisdiction": "US-48", "program": "SNAP", "fiscal_year": fiscal_year },
        "household": {
            "size": 3,
            "gross_earned_income": "2500.00",
            "shelter_cost": 900,
            "utilities": { "kind": "standard_allowance", "amount": "200" }
        }
    }))
    .expect("request deserializes")
}

#[test]
fn reference_household_end_to_end() {
    let (service, events) = service(store());

    let determination = service
        .determine(&reference_request(2024))
        .expect("determination succeeds");

    assert_eq!(determination.deductions.net_income, Money::from_dollars(1_603));
    assert!(determination.verdict.eligible);
    assert_eq!(determination.verdict.reason, VerdictReason::AllTestsPassed);
    assert!(!determination.verdict.categorical_override_applied);
    let allotment = determination.allotment.as_ref().expect("allotment present");
    assert_eq!(allotment.monthly_benefit, Money::from_dollars(285));

    let events = events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "EligibilityDetermined");
}

#[test]
fn categorical_year_skips_gross_test() {
    let (service, _events) = service(store());

    let determination = service
        .determine(&reference_request(2025))
        .expect("determination succeeds");

    assert!(determination.verdict.categorical_override_applied);
    assert_eq!(
        determination.verdict.gross_test,
        IncomeTest::Skipped {
            basis: SkipBasis::CategoricalEligibility
        }
    );
}

#[test]
fn unpublished_year_never_falls_back() {
    let (service, events) = service(store());

    match service.determine(&reference_request(2026)) {
        Err(EngineError::NotFound { kind, key }) => {
            assert_eq!(kind, "rule table");
            assert!(key.contains("2026"));
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(events.events().is_empty());
}

#[test]
fn ineligible_is_a_verdict_not_an_error() {
    let (service, events) = service(store());
    let mut request = reference_request(2024);
    request.household.gross_earned_income = Money::from_dollars(3_000);

    let determination = service.determine(&request).expect("verdict, not error");
    assert!(!determination.verdict.eligible);
    assert_eq!(
        determination.verdict.reason,
        VerdictReason::GrossIncomeExceedsLimit
    );
    match &events.events()[0] {
        EngineEvent::EligibilityDetermined { determination, .. } => {
            assert!(!determination.verdict.eligible)
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn rule_table_round_trips_through_json() {
    let store = store();
    let table = store
        .rule_table(&RuleTableKey::new("US-48", "SNAP", 2024))
        .expect("table published");

    let json = serde_json::to_string(table.as_ref()).expect("serializes");
    let back: RuleTable = serde_json::from_str(&json).expect("deserializes");
    assert_eq!(&back, table.as_ref());
}

#[test]
fn parallel_determinations_agree() {
    let (service, events) = service(store());
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service
                    .determine(&reference_request(2024))
                    .expect("determination succeeds")
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker completes"))
        .collect();
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(events.events().len(), 8);
}
