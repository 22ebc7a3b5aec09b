use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;

use super::table::{
    AdditionalMemberIncrement, IncomeLimit, RuleTable, RuleTableKey, WorkRequirementPolicy,
};
use crate::error::EngineError;
use crate::money::{Money, RoundingMode};

const ADDITIONAL_MEMBER_MARKERS: [&str; 2] = ["additional", "each_additional"];

/// One CSV row: a household size for one key, with the scalar policy columns
/// repeated on every row of that key.
#[derive(Debug, Deserialize)]
struct RuleTableRow {
    jurisdiction: String,
    program: String,
    fiscal_year: u16,
    household_size: String,
    gross_limit: Money,
    net_limit: Money,
    standard_deduction: Option<Money>,
    max_allotment: Money,
    categorical_eligibility: bool,
    shelter_deduction_cap: Money,
    medical_expense_floor: Money,
    minimum_benefit: Money,
    minimum_benefit_max_household_size: u8,
    rounding_mode: Option<RoundingMode>,
    countable_month_limit: Option<u8>,
    window_months: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalarColumns {
    categorical_eligibility: bool,
    shelter_deduction_cap: Money,
    medical_expense_floor: Money,
    minimum_benefit: Money,
    minimum_benefit_max_household_size: u8,
    rounding_mode: RoundingMode,
    work_requirement: WorkRequirementPolicy,
}

impl RuleTableRow {
    fn key(&self) -> RuleTableKey {
        RuleTableKey::new(self.jurisdiction.trim(), self.program.trim(), self.fiscal_year)
    }

    fn scalars(&self) -> ScalarColumns {
        let defaults = WorkRequirementPolicy::default();
        ScalarColumns {
            categorical_eligibility: self.categorical_eligibility,
            shelter_deduction_cap: self.shelter_deduction_cap,
            medical_expense_floor: self.medical_expense_floor,
            minimum_benefit: self.minimum_benefit,
            minimum_benefit_max_household_size: self.minimum_benefit_max_household_size,
            rounding_mode: self.rounding_mode.unwrap_or_default(),
            work_requirement: WorkRequirementPolicy {
                countable_month_limit: self
                    .countable_month_limit
                    .unwrap_or(defaults.countable_month_limit),
                window_months: self.window_months.unwrap_or(defaults.window_months),
            },
        }
    }
}

struct TableBuilder {
    scalars: ScalarColumns,
    income_limits: BTreeMap<u8, IncomeLimit>,
    allotment_caps: BTreeMap<u8, Money>,
    additional_member: Option<AdditionalMemberIncrement>,
}

/// Parse a rule table CSV export into validated tables, ordered by key.
pub fn parse_rule_tables<R: Read>(reader: R) -> Result<Vec<RuleTable>, EngineError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut builders: BTreeMap<RuleTableKey, TableBuilder> = BTreeMap::new();

    for record in csv_reader.deserialize::<RuleTableRow>() {
        let row = record?;
        let key = row.key();
        let scalars = row.scalars();

        let builder = builders.entry(key.clone()).or_insert_with(|| TableBuilder {
            scalars,
            income_limits: BTreeMap::new(),
            allotment_caps: BTreeMap::new(),
            additional_member: None,
        });

        if builder.scalars != scalars {
            return Err(EngineError::validation(format!(
                "rule table {key} rows disagree on table-wide policy columns"
            )));
        }

        let marker = row.household_size.to_ascii_lowercase();
        if ADDITIONAL_MEMBER_MARKERS.contains(&marker.as_str()) {
            if builder.additional_member.is_some() {
                return Err(EngineError::validation(format!(
                    "rule table {key} declares the per-member increment twice"
                )));
            }
            builder.additional_member = Some(AdditionalMemberIncrement {
                gross_limit: row.gross_limit,
                net_limit: row.net_limit,
                max_allotment: row.max_allotment,
            });
            continue;
        }

        let size: u8 = marker.parse().map_err(|_| {
            EngineError::validation(format!(
                "rule table {key} has unrecognized household size '{}'",
                row.household_size
            ))
        })?;
        let standard_deduction = row.standard_deduction.ok_or_else(|| {
            EngineError::validation(format!(
                "rule table {key} is missing the standard deduction for size {size}"
            ))
        })?;

        let limit = IncomeLimit {
            gross_limit: row.gross_limit,
            net_limit: row.net_limit,
            standard_deduction,
        };
        if builder.income_limits.insert(size, limit).is_some() {
            return Err(EngineError::validation(format!(
                "rule table {key} lists household size {size} twice"
            )));
        }
        builder.allotment_caps.insert(size, row.max_allotment);
    }

    builders
        .into_iter()
        .map(|(key, builder)| {
            let table = RuleTable {
                key,
                income_limits: builder.income_limits,
                allotment_caps: builder.allotment_caps,
                additional_member: builder.additional_member,
                categorical_eligibility: builder.scalars.categorical_eligibility,
                shelter_deduction_cap: builder.scalars.shelter_deduction_cap,
                medical_expense_floor: builder.scalars.medical_expense_floor,
                minimum_benefit: builder.scalars.minimum_benefit,
                minimum_benefit_max_household_size: builder
                    .scalars
                    .minimum_benefit_max_household_size,
                rounding_mode: builder.scalars.rounding_mode,
                work_requirement: builder.scalars.work_requirement,
            };
            table.validate()?;
            Ok(table)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "jurisdiction,program,fiscal_year,household_size,gross_limit,net_limit,standard_deduction,max_allotment,categorical_eligibility,shelter_deduction_cap,medical_expense_floor,minimum_benefit,minimum_benefit_max_household_size,rounding_mode,countable_month_limit,window_months\n";

    #[test]
    fn groups_rows_into_tables() {
        let csv = format!(
            "{HEADER}\
US-48,SNAP,2024,1,1632,1255,198,291,false,672,35,23,2,half_up,3,36\n\
US-48,SNAP,2024,2,2215,1704,198,535,false,672,35,23,2,half_up,3,36\n\
US-48,SNAP,2024,additional,583,449,,219,false,672,35,23,2,half_up,3,36\n\
US-48,SNAP,2025,1,1696,1305,204,292,true,712,35,23,2,,,\n"
        );

        let tables = parse_rule_tables(csv.as_bytes()).expect("csv parses");
        assert_eq!(tables.len(), 2);

        let fy2024 = &tables[0];
        assert_eq!(fy2024.key, RuleTableKey::new("US-48", "SNAP", 2024));
        assert_eq!(fy2024.income_limits.len(), 2);
        assert_eq!(
            fy2024.additional_member.map(|increment| increment.max_allotment),
            Some(Money::from_dollars(219))
        );

        let fy2025 = &tables[1];
        assert!(fy2025.categorical_eligibility);
        assert_eq!(fy2025.rounding_mode, RoundingMode::HalfUp);
        assert_eq!(fy2025.work_requirement, WorkRequirementPolicy::default());
    }

    #[test]
    fn rejects_rows_that_disagree_on_scalars() {
        let csv = format!(
            "{HEADER}\
US-48,SNAP,2024,1,1632,1255,198,291,false,672,35,23,2,half_up,3,36\n\
US-48,SNAP,2024,2,2215,1704,198,535,true,672,35,23,2,half_up,3,36\n"
        );

        assert!(matches!(
            parse_rule_tables(csv.as_bytes()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn surfaces_malformed_amounts_as_import_errors() {
        let csv = format!(
            "{HEADER}US-48,SNAP,2024,1,12.345,1255,198,291,false,672,35,23,2,half_up,3,36\n"
        );

        assert!(matches!(
            parse_rule_tables(csv.as_bytes()),
            Err(EngineError::Csv(_))
        ));
    }
}
