mod cli;
mod commands;
mod infra;

use benefit_engine::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
