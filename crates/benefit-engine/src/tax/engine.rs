use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::documents::{DocumentType, ExtractedDocument};
use super::tables::{FilingStatus, TaxTableStore, TaxYearTable};
use crate::error::EngineError;
use crate::money::{divide_rounded, Money, RoundingMode, RoundingUnit};

const BASIS_POINTS: i128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub age: u8,
    #[serde(default)]
    pub full_time_student: bool,
}

impl Dependent {
    /// Qualifying child for the earned income credit: under 19, or under 24 while a student.
    pub const fn qualifies_for_eitc(&self) -> bool {
        self.age < 19 || (self.full_time_student && self.age < 24)
    }
}

/// The eight figures compared against an external preparer's return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxReturnFigures {
    pub adjusted_gross_income: Money,
    pub taxable_income: Money,
    pub federal_tax: Money,
    pub withholding: Money,
    /// Negative when the filer owes a balance.
    pub refund: Money,
    pub earned_income_credit: Money,
    pub child_tax_credit: Money,
    pub education_credit: Money,
}

impl TaxReturnFigures {
    pub fn total_credits(&self) -> Result<Money, EngineError> {
        Money::checked_sum([
            self.earned_income_credit,
            self.child_tax_credit,
            self.education_credit,
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowConfidenceDocument {
    pub index: usize,
    pub document_type: DocumentType,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputation {
    pub tax_year: u16,
    pub filing_status: FilingStatus,
    pub figures: TaxReturnFigures,
    /// Documents used despite falling below the confidence threshold.
    pub low_confidence_documents: Vec<LowConfidenceDocument>,
    pub trace: Vec<String>,
}

/// Computes a federal return from extracted documents and injected year tables.
pub struct TaxCalculator<S> {
    tables: Arc<S>,
    confidence_threshold: f32,
}

impl<S: TaxTableStore> TaxCalculator<S> {
    pub fn new(tables: Arc<S>, confidence_threshold: f32) -> Self {
        Self {
            tables,
            confidence_threshold,
        }
    }

    pub fn calculate(
        &self,
        documents: &[ExtractedDocument],
        filing_status: FilingStatus,
        dependents: &[Dependent],
        tax_year: u16,
    ) -> Result<TaxComputation, EngineError> {
        let table = self.tables.tax_year(tax_year)?;
        let mut trace = Vec::new();

        let low_confidence_documents: Vec<LowConfidenceDocument> = documents
            .iter()
            .enumerate()
            .filter(|(_, document)| document.is_low_confidence(self.confidence_threshold))
            .map(|(index, document)| LowConfidenceDocument {
                index,
                document_type: document.document.document_type(),
                confidence: document.confidence,
            })
            .collect();
        for flagged in &low_confidence_documents {
            warn!(
                index = flagged.index,
                document_type = flagged.document_type.label(),
                confidence = flagged.confidence,
                threshold = self.confidence_threshold,
                "low-confidence document used in tax calculation"
            );
        }

        let adjusted_gross_income = documents
            .iter()
            .try_fold(Money::ZERO, |total, document| {
                total.checked_add(document.document.gross_income()?)
            })?;
        let earned_income = Money::checked_sum(
            documents
                .iter()
                .map(|document| document.document.earned_income()),
        )?;
        let investment_income = documents
            .iter()
            .try_fold(Money::ZERO, |total, document| {
                total.checked_add(document.document.investment_income()?)
            })?;
        let withholding = Money::checked_sum(
            documents
                .iter()
                .map(|document| document.document.federal_withholding()),
        )?;
        trace.push(format!(
            "adjusted gross income from {} documents: {adjusted_gross_income}",
            documents.len()
        ));

        let standard_deduction = *table.standard_deduction.get(filing_status);
        let taxable_income = adjusted_gross_income
            .checked_sub(standard_deduction)?
            .floor_at_zero();
        trace.push(format!(
            "taxable income after {} standard deduction {standard_deduction}: {taxable_income}",
            filing_status.label()
        ));

        let federal_tax = bracket_tax(&table, filing_status, taxable_income)?;
        trace.push(format!("tax from {tax_year} brackets: {federal_tax}"));

        let eitc_children = dependents
            .iter()
            .filter(|dependent| dependent.qualifies_for_eitc())
            .count();
        let earned_income_credit = earned_income_credit(
            &table,
            filing_status,
            adjusted_gross_income,
            earned_income,
            investment_income,
            eitc_children,
            &mut trace,
        )?;

        let ctc_children = dependents
            .iter()
            .filter(|dependent| dependent.age < table.child_credit.qualifying_age_limit)
            .count();
        let child_tax_credit =
            child_tax_credit(&table, filing_status, adjusted_gross_income, ctc_children)?;
        trace.push(format!(
            "child tax credit for {ctc_children} qualifying children: {child_tax_credit}"
        ));

        let education_credit =
            education_credit(&table, filing_status, adjusted_gross_income, documents)?;
        trace.push(format!("education credit: {education_credit}"));

        let mut figures = TaxReturnFigures {
            adjusted_gross_income,
            taxable_income,
            federal_tax,
            withholding,
            refund: Money::ZERO,
            earned_income_credit,
            child_tax_credit,
            education_credit,
        };
        let credits = figures.total_credits()?;
        let refund = withholding.checked_sub(federal_tax.checked_sub(credits)?)?;
        figures.refund = refund;
        trace.push(format!(
            "refund = withholding {withholding} - (tax {federal_tax} - credits {credits}) = {refund}"
        ));

        info!(
            tax_year,
            filing_status = filing_status.label(),
            agi = %adjusted_gross_income,
            refund = %refund,
            low_confidence = low_confidence_documents.len(),
            "tax return computed"
        );

        Ok(TaxComputation {
            tax_year,
            filing_status,
            figures,
            low_confidence_documents,
            trace,
        })
    }
}

/// Sum every bracket slice at full precision, then round once to the cent.
fn bracket_tax(
    table: &TaxYearTable,
    filing_status: FilingStatus,
    taxable_income: Money,
) -> Result<Money, EngineError> {
    let brackets = table.brackets.get(filing_status);
    let income = i128::from(taxable_income.cents());
    let mut weighted: i128 = 0;

    for (index, bracket) in brackets.iter().enumerate() {
        let floor = i128::from(bracket.floor.cents());
        if income <= floor {
            break;
        }
        let ceiling = brackets
            .get(index + 1)
            .map(|next| i128::from(next.floor.cents()))
            .unwrap_or(income)
            .min(income);
        weighted += (ceiling - floor) * i128::from(bracket.rate.basis_points());
    }

    cents(divide_rounded(weighted, BASIS_POINTS, RoundingMode::HalfUp)?)
}

fn earned_income_credit(
    table: &TaxYearTable,
    filing_status: FilingStatus,
    adjusted_gross_income: Money,
    earned_income: Money,
    investment_income: Money,
    qualifying_children: usize,
    trace: &mut Vec<String>,
) -> Result<Money, EngineError> {
    if filing_status == FilingStatus::MarriedFilingSeparately {
        trace.push("earned income credit: not available when filing separately".to_string());
        return Ok(Money::ZERO);
    }
    if investment_income > table.eitc.investment_income_limit {
        trace.push(format!(
            "earned income credit: investment income {investment_income} exceeds {}",
            table.eitc.investment_income_limit
        ));
        return Ok(Money::ZERO);
    }

    let schedule = table.eitc.schedule(qualifying_children);
    // The published maximum is reached at the earned income amount.
    let phase_in = if earned_income >= schedule.earned_income_amount {
        schedule.maximum_credit
    } else {
        earned_income
            .apply_rate(schedule.phase_in_rate, RoundingUnit::Cent, RoundingMode::HalfUp)?
            .min(schedule.maximum_credit)
    };

    let threshold = if filing_status.is_joint() {
        schedule.phase_out_start_joint
    } else {
        schedule.phase_out_start
    };
    let phase_out_base = adjusted_gross_income.max(earned_income);
    let reduction = (phase_out_base - threshold).floor_at_zero().apply_rate(
        schedule.phase_out_rate,
        RoundingUnit::Cent,
        RoundingMode::HalfUp,
    )?;
    let credit = (phase_in - reduction).floor_at_zero();

    debug!(
        qualifying_children,
        phase_in = %phase_in,
        reduction = %reduction,
        credit = %credit,
        "earned income credit computed"
    );
    trace.push(format!(
        "earned income credit ({} qualifying children): {phase_in} less phase-out {reduction} = {credit}",
        qualifying_children.min(3)
    ));
    Ok(credit)
}

fn child_tax_credit(
    table: &TaxYearTable,
    filing_status: FilingStatus,
    adjusted_gross_income: Money,
    qualifying_children: usize,
) -> Result<Money, EngineError> {
    let params = &table.child_credit;
    let children = i64::try_from(qualifying_children)
        .map_err(|_| EngineError::validation("dependent count is out of range"))?;
    let base = params.per_child.checked_mul(children)?;

    let threshold = if filing_status.is_joint() {
        params.phase_out_threshold_joint
    } else {
        params.phase_out_threshold
    };
    let excess = (adjusted_gross_income - threshold).floor_at_zero();
    let steps = divide_rounded(
        i128::from(excess.cents()),
        i128::from(params.phase_out_step.cents()),
        RoundingMode::Up,
    )?;
    let reduction = cents(steps * i128::from(params.phase_out_reduction.cents()))?;

    Ok((base - reduction).floor_at_zero())
}

fn education_credit(
    table: &TaxYearTable,
    filing_status: FilingStatus,
    adjusted_gross_income: Money,
    documents: &[ExtractedDocument],
) -> Result<Money, EngineError> {
    if filing_status == FilingStatus::MarriedFilingSeparately {
        return Ok(Money::ZERO);
    }

    let params = &table.education_credit;
    let mut tentative = Money::ZERO;
    for expenses in documents
        .iter()
        .filter_map(|document| document.document.qualified_education_expenses())
    {
        let full = expenses.min(params.full_rate_expenses);
        let partial = (expenses - full).min(params.partial_rate_expenses).apply_rate(
            params.partial_rate,
            RoundingUnit::Cent,
            RoundingMode::HalfUp,
        )?;
        tentative = tentative.checked_add(full.checked_add(partial)?)?;
    }

    let (start, end) = if filing_status.is_joint() {
        (params.phase_out_start_joint, params.phase_out_end_joint)
    } else {
        (params.phase_out_start, params.phase_out_end)
    };
    if adjusted_gross_income >= end {
        return Ok(Money::ZERO);
    }
    if adjusted_gross_income <= start {
        return Ok(tentative);
    }

    tentative.scale(
        (end - adjusted_gross_income).cents(),
        (end - start).cents(),
        RoundingUnit::Cent,
        RoundingMode::HalfUp,
    )
}

fn cents(value: i128) -> Result<Money, EngineError> {
    i64::try_from(value)
        .map(Money::from_cents)
        .map_err(|_| EngineError::precision("tax amount exceeds representable range"))
}
