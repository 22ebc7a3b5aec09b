use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::events::InMemoryEventLog;
use crate::work_requirements::exemption::{
    ExemptionDraft, ExemptionId, ExemptionRecord, ExemptionType, HouseholdId, MemberId, Month,
    MonthPeriod, StaffDecision,
};
use crate::work_requirements::service::ExemptionService;
use crate::work_requirements::store::InMemoryExemptionStore;

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn month(year: i32, month: u32) -> Month {
    Month::new(year, month).expect("valid month")
}

pub(super) fn months_of(year: i32, range: std::ops::RangeInclusive<u32>) -> Vec<Month> {
    range.map(|m| month(year, m)).collect()
}

pub(super) fn household() -> HouseholdId {
    HouseholdId("hh-100".to_string())
}

pub(super) fn member() -> MemberId {
    MemberId("member-1".to_string())
}

pub(super) fn draft(first: Month, last: Month) -> ExemptionDraft {
    ExemptionDraft {
        household: household(),
        member: member(),
        period: MonthPeriod::new(first, last).expect("valid period"),
        exemption_type: ExemptionType::Caregiver,
    }
}

pub(super) fn verify(expires_at: Option<DateTime<Utc>>) -> StaffDecision {
    StaffDecision::Verify {
        method: "caseworker interview".to_string(),
        expires_at,
    }
}

/// A record verified on creation, expiring at `expires_at`.
pub(super) fn verified_record(
    id: &str,
    first: Month,
    last: Month,
    expires_at: Option<DateTime<Utc>>,
) -> ExemptionRecord {
    let created = at(2020, 1, 1);
    ExemptionRecord::pending(ExemptionId(id.to_string()), draft(first, last), created)
        .decide(verify(expires_at), created)
        .expect("pending record verifies")
}

pub(super) fn build_service() -> (
    ExemptionService<InMemoryExemptionStore, InMemoryEventLog>,
    Arc<InMemoryEventLog>,
) {
    let events = Arc::new(InMemoryEventLog::default());
    let service = ExemptionService::new(Arc::new(InMemoryExemptionStore::new()), events.clone());
    (service, events)
}
