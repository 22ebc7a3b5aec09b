use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use benefit_engine::error::AppError;
use benefit_engine::events::{EngineEvent, EventPublisher, PublishError};
use benefit_engine::money::Money;
use benefit_engine::reconciliation::TaxField;
use benefit_engine::tax::FilingStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Publisher that records each event in the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingEventPublisher;

impl EventPublisher for LoggingEventPublisher {
    fn publish(&self, event: EngineEvent) -> Result<(), PublishError> {
        info!(
            event = event.name(),
            occurred_at = %event.occurred_at(),
            "engine event"
        );
        Ok(())
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub(crate) fn write_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

pub(crate) fn parse_money(raw: &str) -> Result<Money, String> {
    Money::parse(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_tax_field(raw: &str) -> Result<TaxField, String> {
    raw.parse::<TaxField>().map_err(|err| err.to_string())
}

pub(crate) fn parse_filing_status(raw: &str) -> Result<FilingStatus, String> {
    match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "single" => Ok(FilingStatus::Single),
        "married_filing_jointly" | "mfj" => Ok(FilingStatus::MarriedFilingJointly),
        "married_filing_separately" | "mfs" => Ok(FilingStatus::MarriedFilingSeparately),
        "head_of_household" | "hoh" => Ok(FilingStatus::HeadOfHousehold),
        "qualifying_surviving_spouse" | "qss" => Ok(FilingStatus::QualifyingSurvivingSpouse),
        _ => Err(format!("unknown filing status '{raw}'")),
    }
}
