//! Time-limited work requirement tracking and the exemptions that pause it.

pub mod exemption;
pub mod service;
pub mod store;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use exemption::{
    ExemptionDraft, ExemptionId, ExemptionRecord, ExemptionStatus, ExemptionType, HouseholdId,
    MemberId, Month, MonthPeriod, StaffDecision,
};
pub use service::ExemptionService;
pub use store::{ExemptionStore, InMemoryExemptionStore};
pub use tracker::{evaluate, ComplianceStatus, MonthAssessment, MonthState};
