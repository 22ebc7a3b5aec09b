use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use benefit_engine::config::EngineConfig;
use benefit_engine::eligibility::{AttestedResources, DeterminationRequest, DeterminationService};
use benefit_engine::error::{AppError, EngineError};
use benefit_engine::money::Money;
use benefit_engine::reconciliation::{FigureSet, ReconciliationService, TaxField};
use benefit_engine::rules::{InMemoryRuleTableStore, WorkRequirementPolicy};
use benefit_engine::tax::{
    Dependent, ExtractedDocument, FilingStatus, InMemoryTaxTableStore, RawExtraction,
    TaxCalculator,
};
use benefit_engine::work_requirements::{
    self, ExemptionRecord, ExemptionStatus, HouseholdId, MemberId, Month,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::debug;

use crate::infra::{
    parse_date, parse_filing_status, parse_money, parse_tax_field, parse_timestamp, read_json,
    write_json, LoggingEventPublisher,
};

#[derive(Args, Debug)]
pub(crate) struct DetermineArgs {
    /// Rule table CSV export (one row per jurisdiction, program, year, and household size)
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// Determination request JSON (rule table key, household, optional application date)
    #[arg(long)]
    pub(crate) request: PathBuf,
    /// Record that the asset verifier found resources over the limit
    #[arg(long)]
    pub(crate) resources_over_limit: bool,
    /// Prorate as an initial-month application filed on this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) application_date: Option<NaiveDate>,
}

pub(crate) fn run_determine(args: DetermineArgs) -> Result<(), AppError> {
    let store = InMemoryRuleTableStore::from_csv_reader(File::open(&args.rules)?)?;
    debug!(tables = ?store.keys(), "rule tables loaded");
    let mut request: DeterminationRequest = read_json(&args.request)?;
    if let Some(applied_on) = args.application_date {
        request.application_date = Some(applied_on);
    }

    let service = DeterminationService::new(
        Arc::new(store),
        Arc::new(AttestedResources {
            within_limit: !args.resources_over_limit,
        }),
        Arc::new(LoggingEventPublisher),
    );
    let determination = service.determine(&request)?;
    write_json(&determination)
}

#[derive(Args, Debug)]
pub(crate) struct TaxArgs {
    /// JSON array of document extraction results
    #[arg(long)]
    pub(crate) documents: PathBuf,
    #[arg(long, value_parser = parse_filing_status)]
    pub(crate) filing_status: FilingStatus,
    /// Age of each dependent; repeat per dependent
    #[arg(long = "dependent-age")]
    pub(crate) dependent_ages: Vec<u8>,
    /// Ages of dependents who are full-time students; repeat per student
    #[arg(long = "student-age")]
    pub(crate) student_ages: Vec<u8>,
    #[arg(long)]
    pub(crate) tax_year: u16,
}

pub(crate) fn run_tax(args: TaxArgs, config: &EngineConfig) -> Result<(), AppError> {
    let raw: Vec<RawExtraction> = read_json(&args.documents)?;
    let documents = raw
        .into_iter()
        .map(ExtractedDocument::try_from)
        .collect::<Result<Vec<_>, EngineError>>()?;

    let dependents: Vec<Dependent> = args
        .dependent_ages
        .iter()
        .map(|age| Dependent {
            age: *age,
            full_time_student: false,
        })
        .chain(args.student_ages.iter().map(|age| Dependent {
            age: *age,
            full_time_student: true,
        }))
        .collect();

    let tables = InMemoryTaxTableStore::with_federal_presets()?;
    let calculator = TaxCalculator::new(Arc::new(tables), config.confidence_threshold);
    let computation =
        calculator.calculate(&documents, args.filing_status, &dependents, args.tax_year)?;
    write_json(&computation)
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum ReportFormat {
    #[default]
    Json,
    Text,
    Csv,
}

#[derive(Args, Debug)]
pub(crate) struct ReconcileArgs {
    /// Figures from the external preparer, as a field-to-amount JSON object
    #[arg(long)]
    pub(crate) reference: PathBuf,
    /// Figures computed by this engine, in the same shape
    #[arg(long)]
    pub(crate) computed: PathBuf,
    /// Override ENGINE_MATERIALITY_THRESHOLD
    #[arg(long, value_parser = parse_money)]
    pub(crate) threshold: Option<Money>,
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub(crate) format: ReportFormat,
    /// Print only this field's row (e.g. `refund`, `agi`, `eitc`) as JSON
    #[arg(long, value_parser = parse_tax_field)]
    pub(crate) field: Option<TaxField>,
}

pub(crate) fn run_reconcile(args: ReconcileArgs, config: &EngineConfig) -> Result<(), AppError> {
    let reference: FigureSet = read_json(&args.reference)?;
    let computed: FigureSet = read_json(&args.computed)?;
    let threshold = args.threshold.unwrap_or(config.materiality_threshold);

    let service = ReconciliationService::new(Arc::new(LoggingEventPublisher), threshold)?;
    let report = service.reconcile(&reference, &computed)?;

    if let Some(field) = args.field {
        return write_json(&report.row(field));
    }
    match args.format {
        ReportFormat::Json => write_json(&report),
        ReportFormat::Text => {
            println!("{}", report.render_text());
            Ok(())
        }
        ReportFormat::Csv => {
            print!("{}", report.to_csv()?);
            Ok(())
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ExemptionStatusArgs {
    /// JSON array of exemption records
    #[arg(long)]
    pub(crate) records: PathBuf,
    #[arg(long)]
    pub(crate) household: String,
    #[arg(long)]
    pub(crate) member: String,
    /// Participation month (YYYY-MM); repeat per month
    #[arg(long = "month", required = true)]
    pub(crate) months: Vec<Month>,
    /// Evaluation time for record statuses (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
    #[arg(long, default_value_t = 3)]
    pub(crate) countable_month_limit: u8,
    #[arg(long, default_value_t = 36)]
    pub(crate) window_months: u8,
}

#[derive(Debug, Serialize)]
struct RecordStatusView<'a> {
    record: &'a ExemptionRecord,
    status: ExemptionStatus,
}

#[derive(Debug, Serialize)]
struct ExemptionStatusView<'a> {
    as_of: DateTime<Utc>,
    records: Vec<RecordStatusView<'a>>,
    compliance: work_requirements::ComplianceStatus,
}

pub(crate) fn run_exemption_status(args: ExemptionStatusArgs) -> Result<(), AppError> {
    let records: Vec<ExemptionRecord> = read_json(&args.records)?;
    let household = HouseholdId(args.household);
    let member = MemberId(args.member);
    let as_of = args.now.unwrap_or_else(Utc::now);
    let policy = WorkRequirementPolicy {
        countable_month_limit: args.countable_month_limit,
        window_months: args.window_months,
    };

    let compliance =
        work_requirements::evaluate(&household, &member, &args.months, &records, &policy)?;
    let view = ExemptionStatusView {
        as_of,
        records: records
            .iter()
            .filter(|record| record.same_subject(&household, &member))
            .map(|record| RecordStatusView {
                record,
                status: record.status_at(as_of),
            })
            .collect(),
        compliance,
    };
    write_json(&view)
}
