use serde::{Deserialize, Serialize};
use tracing::debug;

use super::figures::{FigureSet, TaxField};
use crate::error::EngineError;
use crate::money::{divide_rounded, Money, RoundingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Match,
    Minor,
    Major,
    /// One side has no value for the field.
    Unknown,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Match => "match",
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Unknown => "unknown",
        }
    }
}

/// Severity depends only on `|delta|` against the threshold.
pub fn classify(delta: Option<Money>, materiality_threshold: Money) -> Severity {
    match delta {
        None => Severity::Unknown,
        Some(delta) if delta.is_zero() => Severity::Match,
        Some(delta) if delta.abs() <= materiality_threshold => Severity::Minor,
        Some(_) => Severity::Major,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceRow {
    pub field: TaxField,
    pub reference_value: Option<Money>,
    pub computed_value: Option<Money>,
    /// `computed - reference`; absent when either side is.
    pub delta: Option<Money>,
    /// Percent of the reference value to two decimals.
    pub delta_percent: Option<f64>,
    pub severity: Severity,
}

fn delta_percent(delta: Money, reference: Money) -> Result<Option<f64>, EngineError> {
    if reference.is_zero() {
        return Ok(None);
    }
    let basis_points = divide_rounded(
        i128::from(delta.cents()) * 10_000,
        i128::from(reference.abs().cents()),
        RoundingMode::HalfUp,
    )?;
    // Basis points are hundredths of a percent.
    Ok(Some(basis_points as f64 / 100.0))
}

/// Compare every tracked field, in the fixed field order.
pub fn reconcile(
    reference: &FigureSet,
    computed: &FigureSet,
    materiality_threshold: Money,
) -> Result<Vec<VarianceRow>, EngineError> {
    if materiality_threshold.is_negative() {
        return Err(EngineError::validation(format!(
            "materiality threshold cannot be negative (got {materiality_threshold})"
        )));
    }

    TaxField::ordered()
        .into_iter()
        .map(|field| {
            let reference_value = reference.get(field);
            let computed_value = computed.get(field);
            let delta = match (reference_value, computed_value) {
                (Some(reference), Some(computed)) => Some(computed.checked_sub(reference)?),
                _ => None,
            };
            let delta_percent = match (delta, reference_value) {
                (Some(delta), Some(reference)) => delta_percent(delta, reference)?,
                _ => None,
            };
            let severity = classify(delta, materiality_threshold);

            debug!(
                field = field.key(),
                severity = severity.label(),
                "variance classified"
            );
            Ok(VarianceRow {
                field,
                reference_value,
                computed_value,
                delta,
                delta_percent,
                severity,
            })
        })
        .collect()
}
