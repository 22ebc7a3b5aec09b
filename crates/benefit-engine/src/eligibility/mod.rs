//! Benefit eligibility path: deductions, income tests, and the monthly allotment.
//!
//! Each stage is a pure function of its inputs and an injected [`RuleTable`].
//! [`DeterminationService`] wires them to the rule table store, the asset
//! verification collaborator, and the event publisher.
//!
//! [`RuleTable`]: crate::rules::RuleTable

pub mod allotment;
pub mod deductions;
pub mod domain;
pub mod evaluator;
pub mod service;

#[cfg(test)]
mod tests;

pub use allotment::{compute as compute_allotment, compute_prorated, AllotmentResult, Proration};
pub use deductions::{compute as compute_deductions, DeductionKind, DeductionResult, DeductionStep};
pub use domain::{Household, HouseholdMember, UtilityExpense, ELDERLY_AGE};
pub use evaluator::{
    evaluate, DeterminationStatus, EligibilityVerdict, IncomeTest, ResourceTest, SkipBasis,
    VerdictReason,
};
pub use service::{
    AssetVerifier, AttestedResources, Determination, DeterminationRequest, DeterminationService,
};
