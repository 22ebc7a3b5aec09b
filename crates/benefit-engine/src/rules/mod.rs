//! Versioned, jurisdiction-scoped policy tables.
//!
//! Tables are pure data. They are injected into every calculation rather than
//! looked up from ambient state, and a published table is never mutated.

mod import;
mod store;
mod table;

pub use import::parse_rule_tables;
pub use store::{InMemoryRuleTableStore, RuleTableStore};
pub use table::{
    AdditionalMemberIncrement, FiscalYear, IncomeLimit, Jurisdiction, ProgramCode, RuleTable,
    RuleTableKey, WorkRequirementPolicy,
};

#[cfg(test)]
pub(crate) use table::sample_table;
