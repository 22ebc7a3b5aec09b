//! Field-by-field comparison of a computed return against an external one.

pub mod figures;
pub mod report;
pub mod service;
pub mod variance;


pub use figures::{FigureSet, TaxField};
pub use report::{SeverityCounts, VarianceReport};
pub use service::ReconciliationService;
pub use variance::{classify, reconcile, Severity, VarianceRow};
