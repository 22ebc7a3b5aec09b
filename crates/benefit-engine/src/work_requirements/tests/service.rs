use super::common::*;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::rules::WorkRequirementPolicy;
use crate::work_requirements::exemption::{ExemptionId, ExemptionStatus, StaffDecision};
use crate::work_requirements::tracker::MonthState;

#[test]
fn pending_to_verified_then_expired_on_read() {
    let (service, events) = build_service();
    let record = service
        .submit(draft(month(2024, 1), month(2024, 6)), at(2024, 1, 2))
        .expect("submits");
    assert_eq!(record.id, ExemptionId("exm-000001".to_string()));
    assert_eq!(
        service.status(&record.id, at(2024, 1, 2)).expect("reads"),
        ExemptionStatus::Pending
    );

    let verified = service
        .decide(
            &record.id,
            ExemptionStatus::Pending,
            verify(Some(at(2024, 6, 30))),
            at(2024, 1, 10),
        )
        .expect("verifies");
    assert_eq!(verified.stored_status(), ExemptionStatus::Verified);
    assert_eq!(verified.verified_at, Some(at(2024, 1, 10)));

    let published = events.events();
    assert_eq!(published.len(), 1);
    match &published[0] {
        EngineEvent::ExemptionStatusChanged {
            previous_status,
            record: announced,
            occurred_at,
        } => {
            assert_eq!(*previous_status, ExemptionStatus::Pending);
            assert_eq!(announced, &verified);
            assert_eq!(*occurred_at, at(2024, 1, 10));
        }
        other => panic!("expected exemption event, got {other:?}"),
    }

    assert_eq!(
        service.status(&record.id, at(2024, 7, 1)).expect("reads"),
        ExemptionStatus::Expired
    );
    assert_eq!(events.events().len(), 1, "reading must not write");
}

#[test]
fn stale_staff_action_is_a_conflict() {
    let (service, events) = build_service();
    let record = service
        .submit(draft(month(2024, 1), month(2024, 3)), at(2024, 1, 2))
        .expect("submits");

    service
        .decide(&record.id, ExemptionStatus::Pending, verify(None), at(2024, 1, 3))
        .expect("first staff action wins");

    let second = service.decide(
        &record.id,
        ExemptionStatus::Pending,
        StaffDecision::Deny {
            reason: "missing paperwork".to_string(),
        },
        at(2024, 1, 3),
    );
    assert!(matches!(second, Err(EngineError::Conflict(_))));
    assert_eq!(events.events().len(), 1);
    assert_eq!(
        service.status(&record.id, at(2024, 1, 4)).expect("reads"),
        ExemptionStatus::Verified
    );
}

#[test]
fn overlapping_active_claims_are_rejected_until_denied() {
    let (service, _events) = build_service();
    let first = service
        .submit(draft(month(2024, 1), month(2024, 3)), at(2024, 1, 2))
        .expect("submits");

    let clash = service.submit(draft(month(2024, 3), month(2024, 4)), at(2024, 1, 2));
    assert!(matches!(clash, Err(EngineError::Conflict(_))));

    service
        .decide(
            &first.id,
            ExemptionStatus::Pending,
            StaffDecision::Deny {
                reason: "not a caregiver".to_string(),
            },
            at(2024, 1, 5),
        )
        .expect("denies");

    let retry = service
        .submit(draft(month(2024, 3), month(2024, 4)), at(2024, 1, 6))
        .expect("denied claims no longer block");
    assert_eq!(retry.stored_status(), ExemptionStatus::Pending);
}

#[test]
fn unknown_exemption_is_not_found() {
    let (service, _events) = build_service();
    let missing = ExemptionId("exm-999999".to_string());

    assert!(matches!(
        service.status(&missing, at(2024, 1, 1)),
        Err(EngineError::NotFound { kind: "exemption", .. })
    ));
}

#[test]
fn compliance_reads_stored_exemptions() {
    let (service, _events) = build_service();
    let record = service
        .submit(draft(month(2024, 2), month(2024, 3)), at(2024, 1, 2))
        .expect("submits");
    service
        .decide(&record.id, ExemptionStatus::Pending, verify(None), at(2024, 1, 3))
        .expect("verifies");

    let status = service
        .compliance(
            &household(),
            &member(),
            &months_of(2024, 1..=6),
            &WorkRequirementPolicy::default(),
        )
        .expect("evaluates");

    let states: Vec<_> = status.months.iter().map(|a| a.state).collect();
    assert_eq!(
        states,
        vec![
            MonthState::Countable,
            MonthState::Exempt,
            MonthState::Exempt,
            MonthState::Countable,
            MonthState::Countable,
            MonthState::Sanctioned,
        ]
    );
}

#[test]
fn renewal_after_expiry_hands_over_coverage() {
    let (service, _events) = build_service();
    let original = service
        .submit(draft(month(2024, 1), month(2024, 6)), at(2024, 1, 2))
        .expect("submits");
    service
        .decide(
            &original.id,
            ExemptionStatus::Pending,
            verify(Some(at(2024, 3, 15))),
            at(2024, 1, 3),
        )
        .expect("verifies");

    let renewal = service
        .submit(draft(month(2024, 4), month(2024, 6)), at(2024, 4, 2))
        .expect("expired coverage does not block a renewal");
    service
        .decide(&renewal.id, ExemptionStatus::Pending, verify(None), at(2024, 4, 3))
        .expect("verifies");

    let status = service
        .compliance(
            &household(),
            &member(),
            &months_of(2024, 1..=6),
            &WorkRequirementPolicy::default(),
        )
        .expect("periods overlap only while one of them has lapsed");

    let covering: Vec<Option<ExemptionId>> = status
        .months
        .iter()
        .map(|assessment| assessment.exemption.clone())
        .collect();
    assert_eq!(
        covering,
        vec![
            Some(original.id.clone()),
            Some(original.id.clone()),
            Some(original.id.clone()),
            Some(renewal.id.clone()),
            Some(renewal.id.clone()),
            Some(renewal.id),
        ]
    );
    assert!(status.months.iter().all(|a| a.state == MonthState::Exempt));
}
