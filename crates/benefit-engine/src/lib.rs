pub mod config;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod money;
pub mod reconciliation;
pub mod rules;
pub mod tax;
pub mod telemetry;
pub mod work_requirements;

pub use error::{EngineError, EngineResult};
pub use money::{Money, Rate, RoundingMode, RoundingUnit};
