use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::figures::TaxField;
use super::variance::{Severity, VarianceRow};
use crate::error::EngineError;
use crate::money::Money;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub matched: usize,
    pub minor: usize,
    pub major: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Match => self.matched += 1,
            Severity::Minor => self.minor += 1,
            Severity::Major => self.major += 1,
            Severity::Unknown => self.unknown += 1,
        }
    }
}

/// Line-by-line comparison of a computed return against a reference return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub materiality_threshold: Money,
    pub rows: Vec<VarianceRow>,
    pub counts: SeverityCounts,
}

impl VarianceReport {
    pub fn new(rows: Vec<VarianceRow>, materiality_threshold: Money) -> Self {
        let mut counts = SeverityCounts::default();
        for row in &rows {
            counts.record(row.severity);
        }
        Self {
            materiality_threshold,
            rows,
            counts,
        }
    }

    pub fn row(&self, field: TaxField) -> Option<&VarianceRow> {
        self.rows.iter().find(|row| row.field == field)
    }

    /// True when every field matched exactly.
    pub fn is_clean(&self) -> bool {
        self.counts.matched == self.rows.len()
    }

    pub fn needs_review(&self) -> bool {
        self.counts.major > 0 || self.counts.unknown > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} match, {} minor, {} major, {} unknown",
            self.counts.matched, self.counts.minor, self.counts.major, self.counts.unknown
        )
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Variance report (materiality threshold {})",
            self.materiality_threshold
        );
        let _ = writeln!(
            out,
            "{:<24} {:>14} {:>14} {:>12} {:>9}  {}",
            "field", "reference", "computed", "delta", "delta %", "severity"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<24} {:>14} {:>14} {:>12} {:>9}  {}",
                row.field.label(),
                display_amount(row.reference_value),
                display_amount(row.computed_value),
                display_amount(row.delta),
                row.delta_percent
                    .map(|percent| format!("{percent:.2}%"))
                    .unwrap_or_else(|| "-".to_string()),
                row.severity.label()
            );
        }
        let _ = write!(out, "summary: {}", self.summary());
        out
    }

    pub fn to_csv(&self) -> Result<String, EngineError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "field",
            "reference_value",
            "computed_value",
            "delta",
            "delta_percent",
            "severity",
        ])?;
        for row in &self.rows {
            writer.write_record([
                row.field.key().to_string(),
                csv_amount(row.reference_value),
                csv_amount(row.computed_value),
                csv_amount(row.delta),
                row.delta_percent
                    .map(|percent| format!("{percent:.2}"))
                    .unwrap_or_default(),
                row.severity.label().to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| EngineError::Csv(err.into_error().into()))?;
        String::from_utf8(bytes)
            .map_err(|_| EngineError::validation("variance report is not valid UTF-8"))
    }
}

fn display_amount(value: Option<Money>) -> String {
    value
        .map(|amount| amount.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn csv_amount(value: Option<Money>) -> String {
    value.map(|amount| amount.to_string()).unwrap_or_default()
}
