use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;
use crate::money::Money;
use crate::tax::TaxReturnFigures;

/// Tracked return lines. Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxField {
    AdjustedGrossIncome,
    TaxableIncome,
    FederalTax,
    Withholding,
    Refund,
    EarnedIncomeCredit,
    ChildTaxCredit,
    EducationCredit,
}

impl TaxField {
    pub const fn ordered() -> [TaxField; 8] {
        [
            TaxField::AdjustedGrossIncome,
            TaxField::TaxableIncome,
            TaxField::FederalTax,
            TaxField::Withholding,
            TaxField::Refund,
            TaxField::EarnedIncomeCredit,
            TaxField::ChildTaxCredit,
            TaxField::EducationCredit,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            TaxField::AdjustedGrossIncome => "adjusted gross income",
            TaxField::TaxableIncome => "taxable income",
            TaxField::FederalTax => "federal tax",
            TaxField::Withholding => "withholding",
            TaxField::Refund => "refund",
            TaxField::EarnedIncomeCredit => "earned income credit",
            TaxField::ChildTaxCredit => "child tax credit",
            TaxField::EducationCredit => "education credit",
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            TaxField::AdjustedGrossIncome => "adjusted_gross_income",
            TaxField::TaxableIncome => "taxable_income",
            TaxField::FederalTax => "federal_tax",
            TaxField::Withholding => "withholding",
            TaxField::Refund => "refund",
            TaxField::EarnedIncomeCredit => "earned_income_credit",
            TaxField::ChildTaxCredit => "child_tax_credit",
            TaxField::EducationCredit => "education_credit",
        }
    }
}

impl fmt::Display for TaxField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaxField {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let alias = match normalized.as_str() {
            "agi" => Some(TaxField::AdjustedGrossIncome),
            "tax" => Some(TaxField::FederalTax),
            "eitc" => Some(TaxField::EarnedIncomeCredit),
            "ctc" => Some(TaxField::ChildTaxCredit),
            _ => None,
        };
        alias
            .or_else(|| {
                TaxField::ordered()
                    .into_iter()
                    .find(|field| field.key() == normalized)
            })
            .ok_or_else(|| EngineError::validation(format!("unknown tax field '{raw}'")))
    }
}

/// One side of a reconciliation. Absent fields stay absent; nothing is imputed.
///
/// JSON input is an object keyed by field name or alias, read through
/// [`FigureSet::from_entries`] so repeated keys are checked too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FigureSet {
    values: BTreeMap<TaxField, Money>,
}

impl FigureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(field, value)` pairs; a field repeated with a different value is rejected.
    pub fn from_entries<I>(entries: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (TaxField, Money)>,
    {
        let mut set = Self::new();
        for (field, value) in entries {
            match set.values.get(&field) {
                Some(existing) if *existing != value => {
                    return Err(EngineError::validation(format!(
                        "{field} supplied twice with different values ({existing} and {value})"
                    )));
                }
                _ => {
                    set.values.insert(field, value);
                }
            }
        }
        Ok(set)
    }

    pub fn get(&self, field: TaxField) -> Option<Money> {
        self.values.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<&TaxReturnFigures> for FigureSet {
    fn from(figures: &TaxReturnFigures) -> Self {
        let values = [
            (TaxField::AdjustedGrossIncome, figures.adjusted_gross_income),
            (TaxField::TaxableIncome, figures.taxable_income),
            (TaxField::FederalTax, figures.federal_tax),
            (TaxField::Withholding, figures.withholding),
            (TaxField::Refund, figures.refund),
            (TaxField::EarnedIncomeCredit, figures.earned_income_credit),
            (TaxField::ChildTaxCredit, figures.child_tax_credit),
            (TaxField::EducationCredit, figures.education_credit),
        ]
        .into_iter()
        .collect();
        Self { values }
    }
}

impl<'de> Deserialize<'de> for FigureSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FigureSetVisitor)
    }
}

struct FigureSetVisitor;

impl<'de> Visitor<'de> for FigureSetVisitor {
    type Value = FigureSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping tax fields to amounts")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FigureSet, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Money>()? {
            let field = key.parse::<TaxField>().map_err(de::Error::custom)?;
            entries.push((field, value));
        }
        FigureSet::from_entries(entries).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_duplicates_are_rejected() {
        let result = FigureSet::from_entries([
            (TaxField::Refund, Money::from_dollars(100)),
            (TaxField::Refund, Money::from_dollars(120)),
        ]);
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let repeated = FigureSet::from_entries([
            (TaxField::Refund, Money::from_dollars(100)),
            (TaxField::Refund, Money::from_dollars(100)),
        ])
        .expect("identical repeats are harmless");
        assert_eq!(repeated.len(), 1);
    }

    #[test]
    fn parses_field_names_and_aliases() {
        assert_eq!(
            "AGI".parse::<TaxField>().ok(),
            Some(TaxField::AdjustedGrossIncome)
        );
        assert_eq!(
            "child tax credit".parse::<TaxField>().ok(),
            Some(TaxField::ChildTaxCredit)
        );
        assert!("state_tax".parse::<TaxField>().is_err());
    }

    #[test]
    fn json_uses_field_keys() {
        let json = r#"{"refund": "250.10", "adjusted_gross_income": 30000}"#;
        let set: FigureSet = serde_json::from_str(json).expect("parses");
        assert_eq!(set.get(TaxField::Refund), Some(Money::from_cents(25_010)));
        assert_eq!(
            set.get(TaxField::AdjustedGrossIncome),
            Some(Money::from_dollars(30_000))
        );
        assert_eq!(set.get(TaxField::FederalTax), None);
    }

    #[test]
    fn json_keys_accept_aliases() {
        let set: FigureSet =
            serde_json::from_str(r#"{"AGI": "30000.00", "eitc": 0}"#).expect("parses");
        assert_eq!(
            set.get(TaxField::AdjustedGrossIncome),
            Some(Money::from_dollars(30_000))
        );
        assert_eq!(set.get(TaxField::EarnedIncomeCredit), Some(Money::ZERO));
        assert!(serde_json::from_str::<FigureSet>(r#"{"state_tax": 10}"#).is_err());
    }

    #[test]
    fn json_with_conflicting_repeated_key_is_rejected() {
        let duplicated = r#"{"refund":"100.00","refund":"120.00"}"#;
        let err = serde_json::from_str::<FigureSet>(duplicated).expect_err("conflicting repeat");
        assert!(err.to_string().contains("supplied twice"), "{err}");

        let aliased = r#"{"agi": 30000, "adjusted_gross_income": 30050}"#;
        let err = serde_json::from_str::<FigureSet>(aliased).expect_err("alias and key disagree");
        assert!(err.to_string().contains("supplied twice"), "{err}");

        let same: FigureSet =
            serde_json::from_str(r#"{"refund": "100.00", "refund": 100}"#).expect("same value");
        assert_eq!(same.len(), 1);
    }
}
