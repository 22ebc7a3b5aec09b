//! Federal return computation from extracted tax documents.

pub mod documents;
pub mod engine;
pub mod tables;

pub use documents::{DocumentType, ExtractedDocument, RawExtraction, TaxDocument};
pub use engine::{
    Dependent, LowConfidenceDocument, TaxCalculator, TaxComputation, TaxReturnFigures,
};
pub use tables::{
    ByFilingStatus, FilingStatus, InMemoryTaxTableStore, TaxBracket, TaxTableStore, TaxYearTable,
};
