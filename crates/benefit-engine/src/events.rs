//! Outbound notifications for audit and notification collaborators.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility::Determination;
use crate::reconciliation::VarianceReport;
use crate::work_requirements::{ExemptionRecord, ExemptionStatus};

/// Every event carries the full result object it announces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    EligibilityDetermined {
        occurred_at: DateTime<Utc>,
        determination: Box<Determination>,
    },
    ExemptionStatusChanged {
        occurred_at: DateTime<Utc>,
        previous_status: ExemptionStatus,
        record: ExemptionRecord,
    },
    VarianceReportGenerated {
        occurred_at: DateTime<Utc>,
        report: VarianceReport,
    },
}

impl EngineEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            EngineEvent::EligibilityDetermined { .. } => "EligibilityDetermined",
            EngineEvent::ExemptionStatusChanged { .. } => "ExemptionStatusChanged",
            EngineEvent::VarianceReportGenerated { .. } => "VarianceReportGenerated",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EngineEvent::EligibilityDetermined { occurred_at, .. }
            | EngineEvent::ExemptionStatusChanged { occurred_at, .. }
            | EngineEvent::VarianceReportGenerated { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Sink for engine events (audit log, notification fan-out, ...).
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: EngineEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Keeps published events in memory; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<EngineEvent>>,
}

impl InMemoryEventLog {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for InMemoryEventLog {
    fn publish(&self, event: EngineEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
