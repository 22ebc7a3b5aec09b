use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;
use crate::money::{Money, Rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
    QualifyingSurvivingSpouse,
}

impl FilingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MarriedFilingJointly => "married filing jointly",
            Self::MarriedFilingSeparately => "married filing separately",
            Self::HeadOfHousehold => "head of household",
            Self::QualifyingSurvivingSpouse => "qualifying surviving spouse",
        }
    }

    pub const fn is_joint(self) -> bool {
        matches!(self, Self::MarriedFilingJointly)
    }
}

/// One value per filing status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByFilingStatus<T> {
    pub single: T,
    pub married_filing_jointly: T,
    pub married_filing_separately: T,
    pub head_of_household: T,
    pub qualifying_surviving_spouse: T,
}

impl<T> ByFilingStatus<T> {
    pub fn get(&self, status: FilingStatus) -> &T {
        match status {
            FilingStatus::Single => &self.single,
            FilingStatus::MarriedFilingJointly => &self.married_filing_jointly,
            FilingStatus::MarriedFilingSeparately => &self.married_filing_separately,
            FilingStatus::HeadOfHousehold => &self.head_of_household,
            FilingStatus::QualifyingSurvivingSpouse => &self.qualifying_surviving_spouse,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        [
            &self.single,
            &self.married_filing_jointly,
            &self.married_filing_separately,
            &self.head_of_household,
            &self.qualifying_surviving_spouse,
        ]
        .into_iter()
    }
}

/// Marginal rate applied to taxable income above `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub floor: Money,
    pub rate: Rate,
}

/// Earned income credit shape for one qualifying-child count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EitcSchedule {
    pub phase_in_rate: Rate,
    pub earned_income_amount: Money,
    pub maximum_credit: Money,
    pub phase_out_rate: Rate,
    pub phase_out_start: Money,
    pub phase_out_start_joint: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EitcParameters {
    /// Indexed by qualifying children, 0 through 3 or more.
    pub schedules: [EitcSchedule; 4],
    pub investment_income_limit: Money,
}

impl EitcParameters {
    pub fn schedule(&self, qualifying_children: usize) -> &EitcSchedule {
        &self.schedules[qualifying_children.min(3)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCreditParameters {
    pub per_child: Money,
    pub qualifying_age_limit: u8,
    pub phase_out_threshold: Money,
    pub phase_out_threshold_joint: Money,
    /// Reduction per started `phase_out_step` of AGI above the threshold.
    pub phase_out_reduction: Money,
    pub phase_out_step: Money,
}

/// American Opportunity style credit computed per student (one 1098-T each).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationCreditParameters {
    pub full_rate_expenses: Money,
    pub partial_rate_expenses: Money,
    pub partial_rate: Rate,
    pub phase_out_start: Money,
    pub phase_out_end: Money,
    pub phase_out_start_joint: Money,
    pub phase_out_end_joint: Money,
}

/// Federal parameters for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxYearTable {
    pub tax_year: u16,
    pub standard_deduction: ByFilingStatus<Money>,
    pub brackets: ByFilingStatus<Vec<TaxBracket>>,
    pub eitc: EitcParameters,
    pub child_credit: ChildCreditParameters,
    pub education_credit: EducationCreditParameters,
}

impl TaxYearTable {
    pub fn validate(&self) -> Result<(), EngineError> {
        let year = self.tax_year;
        for schedule in self.brackets.iter() {
            match schedule.first() {
                Some(first) if first.floor == Money::ZERO => {}
                _ => {
                    return Err(EngineError::validation(format!(
                        "tax year {year}: every bracket schedule must start at zero"
                    )))
                }
            }
            if schedule.windows(2).any(|pair| pair[1].floor <= pair[0].floor) {
                return Err(EngineError::validation(format!(
                    "tax year {year}: bracket floors must be strictly ascending"
                )));
            }
        }

        if self.standard_deduction.iter().any(|amount| amount.is_negative()) {
            return Err(EngineError::validation(format!(
                "tax year {year}: standard deduction cannot be negative"
            )));
        }

        let credit = &self.education_credit;
        if credit.phase_out_end <= credit.phase_out_start
            || credit.phase_out_end_joint <= credit.phase_out_start_joint
        {
            return Err(EngineError::validation(format!(
                "tax year {year}: education credit phase-out range is empty"
            )));
        }

        if self.child_credit.phase_out_step <= Money::ZERO {
            return Err(EngineError::validation(format!(
                "tax year {year}: child credit phase-out step must be positive"
            )));
        }

        Ok(())
    }

    pub fn federal_2023() -> Self {
        Self {
            tax_year: 2023,
            standard_deduction: ByFilingStatus {
                single: dollars(13_850),
                married_filing_jointly: dollars(27_700),
                married_filing_separately: dollars(13_850),
                head_of_household: dollars(20_800),
                qualifying_surviving_spouse: dollars(27_700),
            },
            brackets: ByFilingStatus {
                single: schedule([11_000, 44_725, 95_375, 182_100, 231_250, 578_125]),
                married_filing_jointly: schedule([
                    22_000, 89_450, 190_750, 364_200, 462_500, 693_750,
                ]),
                married_filing_separately: schedule([
                    11_000, 44_725, 95_375, 182_100, 231_250, 346_875,
                ]),
                head_of_household: schedule([15_700, 59_850, 95_350, 182_100, 231_250, 578_100]),
                qualifying_surviving_spouse: schedule([
                    22_000, 89_450, 190_750, 364_200, 462_500, 693_750,
                ]),
            },
            eitc: EitcParameters {
                schedules: [
                    eitc(765, 7_840, 600, 765, 9_800, 16_370),
                    eitc(3_400, 11_750, 3_995, 1_598, 21_560, 28_120),
                    eitc(4_000, 16_510, 6_604, 2_106, 21_560, 28_120),
                    eitc(4_500, 16_510, 7_430, 2_106, 21_560, 28_120),
                ],
                investment_income_limit: dollars(11_000),
            },
            child_credit: child_credit(),
            education_credit: education_credit(),
        }
    }

    pub fn federal_2024() -> Self {
        Self {
            tax_year: 2024,
            standard_deduction: ByFilingStatus {
                single: dollars(14_600),
                married_filing_jointly: dollars(29_200),
                married_filing_separately: dollars(14_600),
                head_of_household: dollars(21_900),
                qualifying_surviving_spouse: dollars(29_200),
            },
            brackets: ByFilingStatus {
                single: schedule([11_600, 47_150, 100_525, 191_950, 243_725, 609_350]),
                married_filing_jointly: schedule([
                    23_200, 94_300, 201_050, 383_900, 487_450, 731_200,
                ]),
                married_filing_separately: schedule([
                    11_600, 47_150, 100_525, 191_950, 243_725, 365_600,
                ]),
                head_of_household: schedule([16_550, 63_100, 100_500, 191_950, 243_700, 609_350]),
                qualifying_surviving_spouse: schedule([
                    23_200, 94_300, 201_050, 383_900, 487_450, 731_200,
                ]),
            },
            eitc: EitcParameters {
                schedules: [
                    eitc(765, 8_260, 632, 765, 10_330, 17_250),
                    eitc(3_400, 12_390, 4_213, 1_598, 22_720, 29_640),
                    eitc(4_000, 17_400, 6_960, 2_106, 22_720, 29_640),
                    eitc(4_500, 17_400, 7_830, 2_106, 22_720, 29_640),
                ],
                investment_income_limit: dollars(11_600),
            },
            child_credit: child_credit(),
            education_credit: education_credit(),
        }
    }
}

const fn dollars(amount: i64) -> Money {
    Money::from_dollars(amount)
}

/// Seven-rate federal schedule; `floors` are where the 12% through 37% rates begin.
fn schedule(floors: [i64; 6]) -> Vec<TaxBracket> {
    const RATES: [u32; 7] = [10, 12, 22, 24, 32, 35, 37];
    std::iter::once(0)
        .chain(floors)
        .zip(RATES)
        .map(|(floor, rate)| TaxBracket {
            floor: dollars(floor),
            rate: Rate::from_percent(rate),
        })
        .collect()
}

fn eitc(
    phase_in_bp: u32,
    earned_income_amount: i64,
    maximum_credit: i64,
    phase_out_bp: u32,
    phase_out_start: i64,
    phase_out_start_joint: i64,
) -> EitcSchedule {
    EitcSchedule {
        phase_in_rate: Rate::from_basis_points(phase_in_bp),
        earned_income_amount: dollars(earned_income_amount),
        maximum_credit: dollars(maximum_credit),
        phase_out_rate: Rate::from_basis_points(phase_out_bp),
        phase_out_start: dollars(phase_out_start),
        phase_out_start_joint: dollars(phase_out_start_joint),
    }
}

fn child_credit() -> ChildCreditParameters {
    ChildCreditParameters {
        per_child: dollars(2_000),
        qualifying_age_limit: 17,
        phase_out_threshold: dollars(200_000),
        phase_out_threshold_joint: dollars(400_000),
        phase_out_reduction: dollars(50),
        phase_out_step: dollars(1_000),
    }
}

fn education_credit() -> EducationCreditParameters {
    EducationCreditParameters {
        full_rate_expenses: dollars(2_000),
        partial_rate_expenses: dollars(2_000),
        partial_rate: Rate::from_percent(25),
        phase_out_start: dollars(80_000),
        phase_out_end: dollars(90_000),
        phase_out_start_joint: dollars(160_000),
        phase_out_end_joint: dollars(180_000),
    }
}

/// Read side of the tax-year parameter collaborator.
pub trait TaxTableStore: Send + Sync {
    fn tax_year(&self, tax_year: u16) -> Result<Arc<TaxYearTable>, EngineError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaxTableStore {
    tables: RwLock<BTreeMap<u16, Arc<TaxYearTable>>>,
}

impl InMemoryTaxTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the built-in federal years.
    pub fn with_federal_presets() -> Result<Self, EngineError> {
        let store = Self::new();
        store.publish(TaxYearTable::federal_2023())?;
        store.publish(TaxYearTable::federal_2024())?;
        Ok(store)
    }

    pub fn publish(&self, table: TaxYearTable) -> Result<Arc<TaxYearTable>, EngineError> {
        table.validate()?;

        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&table.tax_year) {
            return Err(EngineError::conflict(format!(
                "tax year {} is already published",
                table.tax_year
            )));
        }

        let table = Arc::new(table);
        guard.insert(table.tax_year, Arc::clone(&table));
        info!(tax_year = table.tax_year, "tax year table published");
        Ok(table)
    }
}

impl TaxTableStore for InMemoryTaxTableStore {
    fn tax_year(&self, tax_year: u16) -> Result<Arc<TaxYearTable>, EngineError> {
        let guard = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(&tax_year)
            .cloned()
            .ok_or_else(|| EngineError::not_found("tax year table", tax_year))
    }
}
