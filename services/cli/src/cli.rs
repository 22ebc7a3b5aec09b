use crate::commands::{
    run_determine, run_exemption_status, run_reconcile, run_tax, DetermineArgs,
    ExemptionStatusArgs, ReconcileArgs, TaxArgs,
};
use benefit_engine::config::AppConfig;
use benefit_engine::error::AppError;
use benefit_engine::telemetry;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "benefit-engine",
    about = "Benefit eligibility determinations and tax-variance reconciliation",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Determine eligibility and the monthly allotment for one household
    Determine(DetermineArgs),
    /// Compute a federal return from extracted tax documents
    Tax(TaxArgs),
    /// Compare a computed return against an external reference return
    Reconcile(ReconcileArgs),
    /// Evaluate work-requirement months against exemption records
    ExemptionStatus(ExemptionStatusArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Determine(args) => run_determine(args),
        Command::Tax(args) => run_tax(args, &config.engine),
        Command::Reconcile(args) => run_reconcile(args, &config.engine),
        Command::ExemptionStatus(args) => run_exemption_status(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benefit_engine::reconciliation::TaxField;
    use chrono::NaiveDate;

    #[test]
    fn determine_accepts_an_application_date_override() {
        let cli = Cli::try_parse_from([
            "benefit-engine",
            "determine",
            "--rules",
            "rules.csv",
            "--request",
            "request.json",
            "--application-date",
            "2024-03-16",
        ])
        .expect("parses");
        let Command::Determine(args) = cli.command else {
            panic!("expected determine");
        };
        assert_eq!(args.application_date, NaiveDate::from_ymd_opt(2024, 3, 16));

        assert!(Cli::try_parse_from([
            "benefit-engine",
            "determine",
            "--rules",
            "rules.csv",
            "--request",
            "request.json",
            "--application-date",
            "March 16",
        ])
        .is_err());
    }

    #[test]
    fn reconcile_field_accepts_aliases() {
        let cli = Cli::try_parse_from([
            "benefit-engine",
            "reconcile",
            "--reference",
            "reference.json",
            "--computed",
            "computed.json",
            "--field",
            "AGI",
        ])
        .expect("parses");
        let Command::Reconcile(args) = cli.command else {
            panic!("expected reconcile");
        };
        assert_eq!(args.field, Some(TaxField::AdjustedGrossIncome));
    }
}
