use crate::money::Money;
use std::env;
use std::fmt;

const DEFAULT_MATERIALITY_THRESHOLD: &str = "50.00";
const DEFAULT_CONFIDENCE_THRESHOLD: &str = "0.80";

/// Distinguishes runtime behavior for different stages of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for processes embedding the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let raw_threshold = env::var("ENGINE_MATERIALITY_THRESHOLD")
            .unwrap_or_else(|_| DEFAULT_MATERIALITY_THRESHOLD.to_string());
        let materiality_threshold = Money::parse(&raw_threshold)
            .ok()
            .filter(|amount| !amount.is_negative())
            .ok_or(ConfigError::InvalidMaterialityThreshold {
                value: raw_threshold,
            })?;

        let raw_confidence = env::var("ENGINE_CONFIDENCE_THRESHOLD")
            .unwrap_or_else(|_| DEFAULT_CONFIDENCE_THRESHOLD.to_string());
        let confidence_threshold = raw_confidence
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|value| (0.0..=1.0).contains(value))
            .ok_or(ConfigError::InvalidConfidenceThreshold {
                value: raw_confidence,
            })?;

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig {
                materiality_threshold,
                confidence_threshold,
            },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Policy dials that are deployment choices rather than published rule tables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Largest absolute variance still reported as `minor`.
    pub materiality_threshold: Money,
    /// Extraction confidence below which a document is flagged as low-confidence.
    pub confidence_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: Money::from_dollars(50),
            confidence_threshold: 0.8,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidMaterialityThreshold { value: String },
    InvalidConfidenceThreshold { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidMaterialityThreshold { value } => write!(
                f,
                "ENGINE_MATERIALITY_THRESHOLD must be a non-negative amount with at most two decimal places, got '{}'",
                value
            ),
            ConfigError::InvalidConfidenceThreshold { value } => write!(
                f,
                "ENGINE_CONFIDENCE_THRESHOLD must be between 0 and 1, got '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
